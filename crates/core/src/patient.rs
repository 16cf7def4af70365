//! Patient entities and the patient service.
//!
//! This module defines the patient document, its lifecycle status, and the
//! service for patient operations: intake, listing, role-guarded status
//! changes, level-of-care assignment and history recording.

use crate::error::{ClinicError, ClinicResult};
use crate::events::LifecycleEvent;
use crate::history::{Appointment, AppointmentStatus, PatientHistory, TreatmentGoal, TreatmentPlan};
use crate::repositories::history::HistoryRepository;
use crate::repositories::patients::PatientRepository;
use crate::staff::StaffRole;
use crate::transition::{check_transition, TransitionOrigin};
use chrono::{DateTime, Utc};
use cpm_types::NonEmptyText;
use cpm_uuid::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A patient's lifecycle status.
///
/// `discharged` is terminal: no transition out of it is defined, and
/// re-admission requires a new intake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Inactive,
    Discharged,
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Discharged => "discharged",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for PatientStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PatientStatus::Active),
            "inactive" => Ok(PatientStatus::Inactive),
            "discharged" => Ok(PatientStatus::Discharged),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown patient status '{}' (expected active, inactive, or discharged)",
                other
            ))),
        }
    }
}

/// A patient document.
///
/// Patients are created at intake and never hard-deleted; archival happens via
/// `status`. `level_of_care` is a program-assignment field distinct from
/// lifecycle status: clearing it removes program membership without affecting
/// discharge state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub given_names: Vec<String>,
    pub last_name: String,
    pub status: PatientStatus,
    pub assigned_therapist_id: Option<RecordId>,
    pub assigned_clinical_id: Option<RecordId>,
    pub level_of_care: Option<String>,
    pub intake_date: DateTime<Utc>,
    pub discharge_date: Option<DateTime<Utc>>,
    /// Compare-and-set counter; bumped on every successful write.
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

/// Input for creating a patient at intake.
///
/// The repository stamps identity, status (`active`), intake date and version.
#[derive(Clone, Debug)]
pub struct PatientDraft {
    pub given_names: Vec<String>,
    pub last_name: NonEmptyText,
    pub assigned_therapist_id: Option<RecordId>,
    pub assigned_clinical_id: Option<RecordId>,
    pub level_of_care: Option<NonEmptyText>,
}

/// Service for patient operations.
///
/// All status writes go through the transition guard; there is no code path
/// that edits the status field bare.
#[derive(Clone)]
pub struct PatientService {
    patients: PatientRepository,
    history: HistoryRepository,
}

impl PatientService {
    pub fn new(patients: PatientRepository, history: HistoryRepository) -> Self {
        Self { patients, history }
    }

    /// Creates a patient record from an intake form submission.
    ///
    /// The patient starts `active` with an empty appointment log and an empty
    /// treatment plan.
    ///
    /// # Errors
    ///
    /// Returns a `ClinicError` if the record directory cannot be allocated or
    /// the documents cannot be written.
    pub fn intake(&self, draft: PatientDraft) -> ClinicResult<Patient> {
        let patient = self.patients.insert(draft)?;

        LifecycleEvent::new("patient.intake", patient.id.to_string()).emit();
        Ok(patient)
    }

    /// Loads a patient by identifier.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::PatientNotFound` if no such record exists.
    pub fn get(&self, id: &RecordId) -> ClinicResult<Patient> {
        self.patients.load(id)
    }

    /// Lists all patient records.
    ///
    /// Individual documents that cannot be parsed are logged as warnings and
    /// skipped.
    pub fn list(&self) -> Vec<Patient> {
        self.patients.list()
    }

    /// Loads a patient's appointment and treatment history.
    pub fn history(&self, id: &RecordId) -> ClinicResult<PatientHistory> {
        self.history.load(id)
    }

    /// Changes a patient's lifecycle status as a manual staff edit.
    ///
    /// The transition guard decides legality from the actor's role. Discharging
    /// through this path is the supervisor/admin manual override; the stamped
    /// `discharge_date` makes it indistinguishable from the system paths in the
    /// record itself.
    ///
    /// # Errors
    ///
    /// - `ClinicError::PatientNotFound` if the patient does not exist.
    /// - `ClinicError::Forbidden` if the role may not make this transition.
    /// - `ClinicError::InvalidState` if the transition is not defined.
    /// - `ClinicError::Conflict` if the record was modified concurrently.
    pub fn set_status(
        &self,
        id: &RecordId,
        new_status: PatientStatus,
        actor_role: StaffRole,
    ) -> ClinicResult<Patient> {
        let patient = self.patients.load(id)?;
        check_transition(
            patient.status,
            new_status,
            &TransitionOrigin::ManualEdit(actor_role),
        )?;

        let mut updated = patient.clone();
        updated.status = new_status;
        if new_status == PatientStatus::Discharged {
            updated.discharge_date = Some(Utc::now());
        }
        let stored = self.patients.store(&updated, patient.version)?;

        LifecycleEvent::new("patient.status_changed", stored.id.to_string())
            .with_actor(actor_role.to_string())
            .with_details(json!({
                "from": patient.status.to_string(),
                "to": new_status.to_string(),
            }))
            .emit();
        Ok(stored)
    }

    /// Sets or clears a patient's level-of-care (program assignment).
    ///
    /// Passing `None` removes the patient from their program. This is a plain
    /// field update: lifecycle status is deliberately untouched.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::PatientNotFound`, `ClinicError::Text` for an empty
    /// non-null value, or `ClinicError::Conflict` on a concurrent modification.
    pub fn set_level_of_care(
        &self,
        id: &RecordId,
        level_of_care: Option<&str>,
    ) -> ClinicResult<Patient> {
        let validated = level_of_care
            .map(NonEmptyText::new)
            .transpose()?
            .map(|loc| loc.as_str().to_string());

        let patient = self.patients.load(id)?;
        let mut updated = patient.clone();
        updated.level_of_care = validated;
        let stored = self.patients.store(&updated, patient.version)?;

        let action = if stored.level_of_care.is_some() {
            "patient.loc_assigned"
        } else {
            "patient.loc_cleared"
        };
        LifecycleEvent::new(action, stored.id.to_string()).emit();
        Ok(stored)
    }

    /// Appends an appointment to the patient's log.
    pub fn record_appointment(
        &self,
        id: &RecordId,
        scheduled_at: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> ClinicResult<Appointment> {
        self.history.record_appointment(id, scheduled_at, status)
    }

    /// Adds an (incomplete) goal to the patient's treatment plan.
    pub fn add_goal(&self, id: &RecordId, description: &str) -> ClinicResult<TreatmentPlan> {
        let description = NonEmptyText::new(description)?;
        let mut plan = self.history.load(id)?.plan;
        plan.goals.push(TreatmentGoal {
            description: description.as_str().to_string(),
            complete: false,
        });
        self.history.store_plan(id, plan)
    }

    /// Marks a treatment goal complete by position.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if `goal_index` is out of range.
    pub fn complete_goal(&self, id: &RecordId, goal_index: usize) -> ClinicResult<TreatmentPlan> {
        let mut plan = self.history.load(id)?.plan;
        let goals_len = plan.goals.len();
        let goal = plan.goals.get_mut(goal_index).ok_or_else(|| {
            ClinicError::InvalidInput(format!(
                "no treatment goal at index {} (plan has {} goals)",
                goal_index, goals_len
            ))
        })?;
        goal.complete = true;
        self.history.store_plan(id, plan)
    }

    /// Records the responsible clinician's discharge sign-off on the plan.
    pub fn record_sign_off(&self, id: &RecordId) -> ClinicResult<TreatmentPlan> {
        let mut plan = self.history.load(id)?.plan;
        plan.clinician_signoff = true;
        let stored = self.history.store_plan(id, plan)?;

        LifecycleEvent::new("treatment_plan.signed_off", id.to_string()).emit();
        Ok(stored)
    }

    /// Replaces the patient's treatment plan wholesale.
    pub fn store_treatment_plan(
        &self,
        id: &RecordId,
        plan: TreatmentPlan,
    ) -> ClinicResult<TreatmentPlan> {
        self.history.store_plan(id, plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoreConfig, DischargePolicy};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_cfg(clinic_data_dir: &std::path::Path) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(clinic_data_dir.to_path_buf(), DischargePolicy::default())
                .expect("CoreConfig::new should succeed"),
        )
    }

    fn test_service(cfg: Arc<CoreConfig>) -> PatientService {
        PatientService::new(
            PatientRepository::new(cfg.clone()),
            HistoryRepository::new(cfg),
        )
    }

    fn test_draft() -> PatientDraft {
        PatientDraft {
            given_names: vec!["Ada".into()],
            last_name: NonEmptyText::new("Lovelace").unwrap(),
            assigned_therapist_id: None,
            assigned_clinical_id: None,
            level_of_care: None,
        }
    }

    #[test]
    fn test_intake_creates_active_patient_with_empty_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));

        let patient = service.intake(test_draft()).expect("intake should succeed");

        assert_eq!(patient.status, PatientStatus::Active);
        assert_eq!(patient.version, 1);
        assert!(patient.discharge_date.is_none());

        let history = service.history(&patient.id).expect("history should load");
        assert!(history.appointments.is_empty());
        assert!(history.plan.goals.is_empty());
        assert!(!history.plan.clinician_signoff);
    }

    #[test]
    fn test_get_unknown_patient_is_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));

        let err = service
            .get(&RecordId::new())
            .expect_err("unknown patient should fail");
        assert!(matches!(err, ClinicError::PatientNotFound(_)));
    }

    #[test]
    fn test_clinician_deactivates_and_reactivates() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));
        let patient = service.intake(test_draft()).expect("intake should succeed");

        let inactive = service
            .set_status(&patient.id, PatientStatus::Inactive, StaffRole::Clinician)
            .expect("deactivation should succeed");
        assert_eq!(inactive.status, PatientStatus::Inactive);
        assert_eq!(inactive.version, 2);

        let active = service
            .set_status(&patient.id, PatientStatus::Active, StaffRole::Clinician)
            .expect("reactivation should succeed");
        assert_eq!(active.status, PatientStatus::Active);
    }

    #[test]
    fn test_frontdesk_discharge_is_forbidden_admin_succeeds() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));
        let patient = service.intake(test_draft()).expect("intake should succeed");

        let err = service
            .set_status(&patient.id, PatientStatus::Discharged, StaffRole::Frontdesk)
            .expect_err("frontdesk discharge should be refused");
        assert!(matches!(err, ClinicError::Forbidden(_)));

        let discharged = service
            .set_status(&patient.id, PatientStatus::Discharged, StaffRole::Admin)
            .expect("admin override should succeed");
        assert_eq!(discharged.status, PatientStatus::Discharged);
        assert!(discharged.discharge_date.is_some());
    }

    #[test]
    fn test_loc_clear_leaves_status_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));

        let mut draft = test_draft();
        draft.level_of_care = Some(NonEmptyText::new("IOP").unwrap());
        let patient = service.intake(draft).expect("intake should succeed");
        assert_eq!(patient.level_of_care.as_deref(), Some("IOP"));

        let cleared = service
            .set_level_of_care(&patient.id, None)
            .expect("clear should succeed");
        assert!(cleared.level_of_care.is_none());
        assert_eq!(cleared.status, PatientStatus::Active, "status must be untouched");
    }

    #[test]
    fn test_goal_and_sign_off_updates_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));
        let patient = service.intake(test_draft()).expect("intake should succeed");

        service
            .add_goal(&patient.id, "Reduce anxiety symptoms")
            .expect("add_goal should succeed");
        let plan = service
            .complete_goal(&patient.id, 0)
            .expect("complete_goal should succeed");
        assert!(plan.goals[0].complete);

        let plan = service
            .record_sign_off(&patient.id)
            .expect("sign-off should succeed");
        assert!(plan.clinician_signoff);
        assert!(plan.last_updated.is_some());
    }

    #[test]
    fn test_complete_goal_out_of_range_is_invalid_input() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = test_service(test_cfg(temp_dir.path()));
        let patient = service.intake(test_draft()).expect("intake should succeed");

        let err = service
            .complete_goal(&patient.id, 3)
            .expect_err("out-of-range index should fail");
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }
}
