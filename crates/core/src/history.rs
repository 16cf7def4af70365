//! Appointment and treatment history for a patient.
//!
//! History documents are the evaluator's evidence base: the discharge criteria
//! in [`crate::criteria`] are decided entirely from what is recorded here.

use chrono::{DateTime, Utc};
use cpm_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Outcome of a scheduled appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Attended,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Attended => "attended",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = crate::ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "attended" => Ok(AppointmentStatus::Attended),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(crate::ClinicError::InvalidInput(format!(
                "unknown appointment status '{}' (expected scheduled, attended, cancelled, or no_show)",
                other
            ))),
        }
    }
}

/// A single appointment in a patient's log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RecordId,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
}

/// A single goal on a treatment plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentGoal {
    pub description: String,
    pub complete: bool,
}

/// A patient's treatment plan: goals plus the clinician's discharge sign-off.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub goals: Vec<TreatmentGoal>,
    /// Set when the responsible clinician records that the patient is
    /// clinically ready for discharge.
    pub clinician_signoff: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Everything the discharge criteria evaluator inspects for one patient.
#[derive(Clone, Debug, Default)]
pub struct PatientHistory {
    pub appointments: Vec<Appointment>,
    pub plan: TreatmentPlan,
}

impl PatientHistory {
    /// Number of sessions the patient actually attended.
    pub fn attended_session_count(&self) -> usize {
        self.appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Attended)
            .count()
    }

    /// The most recent non-cancelled appointment time, if any.
    ///
    /// Cancelled appointments do not count as contact. Upcoming scheduled
    /// appointments do: a patient with a future booking is still in contact
    /// with the clinic.
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.appointments
            .iter()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .map(|a| a.scheduled_at)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn appointment(offset_days: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: RecordId::new(),
            scheduled_at: Utc::now() - Duration::days(offset_days),
            status,
        }
    }

    #[test]
    fn test_attended_session_count_ignores_other_statuses() {
        let history = PatientHistory {
            appointments: vec![
                appointment(50, AppointmentStatus::Attended),
                appointment(40, AppointmentStatus::NoShow),
                appointment(35, AppointmentStatus::Cancelled),
                appointment(30, AppointmentStatus::Attended),
            ],
            plan: TreatmentPlan::default(),
        };

        assert_eq!(history.attended_session_count(), 2);
    }

    #[test]
    fn test_latest_activity_skips_cancelled_appointments() {
        let history = PatientHistory {
            appointments: vec![
                appointment(40, AppointmentStatus::Attended),
                appointment(5, AppointmentStatus::Cancelled),
            ],
            plan: TreatmentPlan::default(),
        };

        let latest = history.latest_activity().expect("should have activity");
        let days_ago = (Utc::now() - latest).num_days();
        assert_eq!(days_ago, 40);
    }

    #[test]
    fn test_latest_activity_empty_history_is_none() {
        let history = PatientHistory::default();
        assert!(history.latest_activity().is_none());
    }
}
