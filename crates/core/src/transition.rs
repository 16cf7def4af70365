//! Patient status transition guard.
//!
//! Every code path that writes a patient's `status` must pass through
//! [`check_transition`]. The guard decides from explicit inputs only: the
//! current status, the requested status, and the origin of the change. It never
//! consults ambient session state.
//!
//! Permitted transitions:
//!
//! ```text
//! active  <-> inactive     (staff-initiated, clinical roles, no approval)
//! active   -> discharged   (auto-discharge OR approved request OR supervisor/admin override)
//! inactive -> discharged   (same three paths)
//! discharged -> (terminal, no defined transition out)
//! ```
//!
//! Clearing a patient's level-of-care field removes program membership without
//! touching lifecycle status; it does not pass through this guard.

use crate::error::{ClinicError, ClinicResult};
use crate::patient::PatientStatus;
use crate::staff::StaffRole;

/// How a status change was initiated.
///
/// The origin is modelled as a closed set so the guard can distinguish a bare
/// status-field edit from the two system-driven discharge paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOrigin {
    /// A staff member directly edits the status field. Carries the actor's role.
    ManualEdit(StaffRole),
    /// The discharge criteria evaluator discharged the patient.
    AutoDischarge,
    /// An approved discharge request discharged the patient.
    ApprovedRequest,
}

/// Checks whether a status transition is permitted.
///
/// # Errors
///
/// - `ClinicError::InvalidState` if the patient is discharged (terminal), if the
///   requested status equals the current one, or if a system origin requests a
///   transition it does not own.
/// - `ClinicError::Forbidden` if the actor's role is insufficient for a manual
///   edit.
pub fn check_transition(
    current: PatientStatus,
    requested: PatientStatus,
    origin: &TransitionOrigin,
) -> ClinicResult<()> {
    if current == PatientStatus::Discharged {
        return Err(ClinicError::InvalidState(
            "patient is discharged; no further status transitions are defined (re-admission requires a new intake)"
                .into(),
        ));
    }

    if requested == current {
        return Err(ClinicError::InvalidState(format!(
            "patient is already {}",
            current
        )));
    }

    match requested {
        PatientStatus::Active | PatientStatus::Inactive => match origin {
            TransitionOrigin::ManualEdit(role) if role.is_clinical() => Ok(()),
            TransitionOrigin::ManualEdit(role) => Err(ClinicError::Forbidden(format!(
                "role {} may not move a patient between active and inactive; clinical staff required",
                role
            ))),
            _ => Err(ClinicError::InvalidState(
                "active/inactive changes are staff-initiated only".into(),
            )),
        },
        PatientStatus::Discharged => match origin {
            TransitionOrigin::AutoDischarge | TransitionOrigin::ApprovedRequest => Ok(()),
            TransitionOrigin::ManualEdit(role) if role.may_override_discharge() => Ok(()),
            TransitionOrigin::ManualEdit(role) => Err(ClinicError::Forbidden(format!(
                "role {} may not discharge a patient directly; use the eligibility evaluator, a discharge request, or ask a supervisor/admin",
                role
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinical_staff_may_toggle_active_inactive() {
        for role in [StaffRole::Clinician, StaffRole::Supervisor, StaffRole::Admin] {
            check_transition(
                PatientStatus::Active,
                PatientStatus::Inactive,
                &TransitionOrigin::ManualEdit(role),
            )
            .expect("clinical staff should deactivate");

            check_transition(
                PatientStatus::Inactive,
                PatientStatus::Active,
                &TransitionOrigin::ManualEdit(role),
            )
            .expect("clinical staff should reactivate");
        }
    }

    #[test]
    fn test_frontdesk_may_not_toggle_active_inactive() {
        let err = check_transition(
            PatientStatus::Active,
            PatientStatus::Inactive,
            &TransitionOrigin::ManualEdit(StaffRole::Frontdesk),
        )
        .expect_err("frontdesk should be refused");
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn test_frontdesk_manual_discharge_is_forbidden() {
        let err = check_transition(
            PatientStatus::Active,
            PatientStatus::Discharged,
            &TransitionOrigin::ManualEdit(StaffRole::Frontdesk),
        )
        .expect_err("frontdesk discharge should be refused");
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn test_clinician_manual_discharge_is_forbidden() {
        let err = check_transition(
            PatientStatus::Inactive,
            PatientStatus::Discharged,
            &TransitionOrigin::ManualEdit(StaffRole::Clinician),
        )
        .expect_err("clinician direct discharge should be refused");
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn test_admin_manual_discharge_is_permitted() {
        check_transition(
            PatientStatus::Active,
            PatientStatus::Discharged,
            &TransitionOrigin::ManualEdit(StaffRole::Admin),
        )
        .expect("admin override should be permitted");

        check_transition(
            PatientStatus::Inactive,
            PatientStatus::Discharged,
            &TransitionOrigin::ManualEdit(StaffRole::Supervisor),
        )
        .expect("supervisor override should be permitted");
    }

    #[test]
    fn test_system_paths_may_discharge_from_either_status() {
        for current in [PatientStatus::Active, PatientStatus::Inactive] {
            check_transition(
                current,
                PatientStatus::Discharged,
                &TransitionOrigin::AutoDischarge,
            )
            .expect("auto-discharge should be permitted");

            check_transition(
                current,
                PatientStatus::Discharged,
                &TransitionOrigin::ApprovedRequest,
            )
            .expect("approved request should be permitted");
        }
    }

    #[test]
    fn test_discharged_is_terminal_for_every_origin() {
        for requested in [
            PatientStatus::Active,
            PatientStatus::Inactive,
            PatientStatus::Discharged,
        ] {
            for origin in [
                TransitionOrigin::ManualEdit(StaffRole::Admin),
                TransitionOrigin::AutoDischarge,
                TransitionOrigin::ApprovedRequest,
            ] {
                let err = check_transition(PatientStatus::Discharged, requested, &origin)
                    .expect_err("discharged should be terminal");
                assert!(matches!(err, ClinicError::InvalidState(_)));
            }
        }
    }

    #[test]
    fn test_same_status_request_is_invalid() {
        let err = check_transition(
            PatientStatus::Active,
            PatientStatus::Active,
            &TransitionOrigin::ManualEdit(StaffRole::Clinician),
        )
        .expect_err("no-op transition should be refused");
        assert!(matches!(err, ClinicError::InvalidState(_)));
    }

    #[test]
    fn test_system_origins_may_not_toggle_active_inactive() {
        let err = check_transition(
            PatientStatus::Inactive,
            PatientStatus::Active,
            &TransitionOrigin::AutoDischarge,
        )
        .expect_err("system origin should not toggle active/inactive");
        assert!(matches!(err, ClinicError::InvalidState(_)));
    }
}
