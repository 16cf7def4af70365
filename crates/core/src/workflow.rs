//! The discharge request workflow.
//!
//! A discharge request is a human-initiated proposal to discharge a patient,
//! requiring a separate reviewer's approval or denial. The state machine is
//! deliberately small:
//!
//! ```text
//! pending -> approved   (terminal; also discharges the patient)
//! pending -> denied     (terminal; patient untouched)
//! ```
//!
//! The review record is carried *inside* the approved/denied variants, so
//! "reviewer details exist if and only if the request has been reviewed" holds
//! by construction rather than by runtime checks.

use crate::error::{ClinicError, ClinicResult};
use crate::staff::StaffRef;
use chrono::{DateTime, Utc};
use cpm_types::NonEmptyText;
use cpm_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Maximum length of a discharge request reason, in characters.
pub const MAX_REASON_LEN: usize = 2000;

/// Maximum length of review notes, in characters.
pub const MAX_NOTES_LEN: usize = 2000;

/// A reviewer's decision on a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Denied,
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Denied => "denied",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ReviewDecision::Approved),
            "denied" => Ok(ReviewDecision::Denied),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown review decision '{}' (expected approved or denied)",
                other
            ))),
        }
    }
}

/// Who reviewed a request, when, and any notes they left.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewed_by: StaffRef,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<NonEmptyText>,
}

/// The request's position in the workflow.
///
/// `approved` and `denied` are terminal; a reviewed request never returns to
/// `pending`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Approved { review: ReviewRecord },
    Denied { review: ReviewRecord },
}

/// A discharge request document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeRequest {
    pub id: RecordId,
    /// The patient this request proposes to discharge. A patient may accumulate
    /// several historical requests, but at most one may be pending at a time.
    pub patient_id: RecordId,
    pub requested_by: StaffRef,
    pub requested_at: DateTime<Utc>,
    pub reason: NonEmptyText,
    pub state: RequestState,
    /// Compare-and-set counter; bumped on every successful write.
    pub version: u64,
}

impl DischargeRequest {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, RequestState::Pending)
    }

    /// The request's workflow state as a lowercase label.
    pub fn status_label(&self) -> &'static str {
        match self.state {
            RequestState::Pending => "pending",
            RequestState::Approved { .. } => "approved",
            RequestState::Denied { .. } => "denied",
        }
    }

    /// The review record, present if and only if the request is not pending.
    pub fn review(&self) -> Option<&ReviewRecord> {
        match &self.state {
            RequestState::Pending => None,
            RequestState::Approved { review } | RequestState::Denied { review } => Some(review),
        }
    }

    /// Applies a review decision, moving the request out of `pending`.
    ///
    /// Idempotency is explicit, not accidental: reviewing an already-reviewed
    /// request fails rather than silently succeeding or flipping state.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidState` if the request is not pending. The
    /// message names the current state so the caller can explain the refusal
    /// (for example "cannot approve: request already denied").
    pub fn apply_review(
        &mut self,
        decision: ReviewDecision,
        review: ReviewRecord,
    ) -> ClinicResult<()> {
        if !self.is_pending() {
            let verb = match decision {
                ReviewDecision::Approved => "approve",
                ReviewDecision::Denied => "deny",
            };
            return Err(ClinicError::InvalidState(format!(
                "cannot {}: request already {}",
                verb,
                self.status_label()
            )));
        }

        self.state = match decision {
            ReviewDecision::Approved => RequestState::Approved { review },
            ReviewDecision::Denied => RequestState::Denied { review },
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staff::StaffRole;

    fn pending_request() -> DischargeRequest {
        DischargeRequest {
            id: RecordId::new(),
            patient_id: RecordId::new(),
            requested_by: StaffRef {
                id: RecordId::new(),
                role: StaffRole::Clinician,
            },
            requested_at: Utc::now(),
            reason: NonEmptyText::new("Patient relocating").unwrap(),
            state: RequestState::Pending,
            version: 1,
        }
    }

    fn review_by_supervisor() -> ReviewRecord {
        ReviewRecord {
            reviewed_by: StaffRef {
                id: RecordId::new(),
                role: StaffRole::Supervisor,
            },
            reviewed_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn test_pending_request_has_no_review_record() {
        let request = pending_request();
        assert!(request.is_pending());
        assert!(request.review().is_none());
    }

    #[test]
    fn test_approval_attaches_review_record() {
        let mut request = pending_request();
        request
            .apply_review(ReviewDecision::Approved, review_by_supervisor())
            .expect("first review should succeed");

        assert_eq!(request.status_label(), "approved");
        let review = request.review().expect("review record should exist");
        assert_eq!(review.reviewed_by.role, StaffRole::Supervisor);
    }

    #[test]
    fn test_second_review_is_refused_and_state_is_kept() {
        let mut request = pending_request();
        request
            .apply_review(ReviewDecision::Denied, review_by_supervisor())
            .expect("first review should succeed");

        let err = request
            .apply_review(ReviewDecision::Approved, review_by_supervisor())
            .expect_err("second review should fail");

        match err {
            ClinicError::InvalidState(msg) => {
                assert_eq!(msg, "cannot approve: request already denied");
            }
            other => panic!("expected InvalidState, got {:?}", other),
        }

        // State must not flip back to pending or change decision.
        assert_eq!(request.status_label(), "denied");
    }

    #[test]
    fn test_repeating_the_same_decision_is_also_refused() {
        let mut request = pending_request();
        request
            .apply_review(ReviewDecision::Approved, review_by_supervisor())
            .expect("first review should succeed");

        let err = request
            .apply_review(ReviewDecision::Approved, review_by_supervisor())
            .expect_err("repeat approval should fail");
        assert!(matches!(err, ClinicError::InvalidState(_)));
        assert_eq!(request.status_label(), "approved");
    }

    #[test]
    fn test_state_serialises_with_status_tag() {
        let mut request = pending_request();
        let json = serde_json::to_value(&request).expect("should serialise");
        assert_eq!(json["state"]["status"], "pending");

        request
            .apply_review(ReviewDecision::Approved, review_by_supervisor())
            .expect("review should succeed");
        let json = serde_json::to_value(&request).expect("should serialise");
        assert_eq!(json["state"]["status"], "approved");
        assert!(json["state"]["review"]["reviewed_at"].is_string());
    }
}
