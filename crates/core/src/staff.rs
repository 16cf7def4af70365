//! Staff roles and references.
//!
//! Actor roles are threaded as explicit parameters into every guarded operation.
//! The core never reads ambient session or authentication context; the surrounding
//! application resolves the caller's role and passes it in.

use crate::error::ClinicError;
use cpm_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// A staff member's role, as resolved at call time.
///
/// This is a closed set: unrecognised role strings are rejected at the API/CLI
/// boundary rather than propagated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Frontdesk,
    Clinician,
    Supervisor,
    Admin,
}

impl StaffRole {
    /// Returns true for roles that provide direct clinical care.
    ///
    /// Clinical staff may move patients between `active` and `inactive`.
    pub fn is_clinical(&self) -> bool {
        !matches!(self, StaffRole::Frontdesk)
    }

    /// Returns true for roles permitted to review (approve or deny) discharge requests.
    pub fn may_review_discharge(&self) -> bool {
        matches!(self, StaffRole::Supervisor | StaffRole::Admin)
    }

    /// Returns true for roles permitted to discharge a patient by manual override,
    /// bypassing both the evaluator and the request workflow.
    pub fn may_override_discharge(&self) -> bool {
        matches!(self, StaffRole::Supervisor | StaffRole::Admin)
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StaffRole::Frontdesk => "frontdesk",
            StaffRole::Clinician => "clinician",
            StaffRole::Supervisor => "supervisor",
            StaffRole::Admin => "admin",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for StaffRole {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontdesk" => Ok(StaffRole::Frontdesk),
            "clinician" => Ok(StaffRole::Clinician),
            "supervisor" => Ok(StaffRole::Supervisor),
            "admin" => Ok(StaffRole::Admin),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown staff role '{}' (expected frontdesk, clinician, supervisor, or admin)",
                other
            ))),
        }
    }
}

/// A reference to a staff member together with their role at the time of the action.
///
/// The role is captured alongside the identifier because role assignments change
/// over time; an audit trail must record the role the actor actually held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRef {
    /// Identifier of the staff record.
    pub id: RecordId,
    /// The role held at the time of the action.
    pub role: StaffRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_frontdesk_is_not_clinical() {
        assert!(!StaffRole::Frontdesk.is_clinical());
        assert!(StaffRole::Clinician.is_clinical());
        assert!(StaffRole::Supervisor.is_clinical());
        assert!(StaffRole::Admin.is_clinical());
    }

    #[test]
    fn test_only_elevated_roles_review_discharge() {
        assert!(!StaffRole::Frontdesk.may_review_discharge());
        assert!(!StaffRole::Clinician.may_review_discharge());
        assert!(StaffRole::Supervisor.may_review_discharge());
        assert!(StaffRole::Admin.may_review_discharge());
    }

    #[test]
    fn test_from_str_round_trips_all_roles() {
        for role in [
            StaffRole::Frontdesk,
            StaffRole::Clinician,
            StaffRole::Supervisor,
            StaffRole::Admin,
        ] {
            let parsed = StaffRole::from_str(&role.to_string()).expect("round trip should parse");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_role() {
        let err = StaffRole::from_str("receptionist").expect_err("unknown role should fail");
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }
}
