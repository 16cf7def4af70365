//! Appointment and treatment history storage.
//!
//! History documents live inside the patient's sharded directory, next to
//! `patient.json`: `appointments.json` holds the append-only appointment log,
//! `treatment_plan.json` the current plan. Both are whole-document writes;
//! history volumes per patient are small and the simplicity keeps each update
//! atomic at the file level.

use crate::config::CoreConfig;
use crate::constants::{APPOINTMENTS_FILENAME, TREATMENT_PLAN_FILENAME};
use crate::error::{ClinicError, ClinicResult};
use crate::history::{Appointment, AppointmentStatus, PatientHistory, TreatmentPlan};
use crate::repositories::helpers;
use chrono::{DateTime, Utc};
use cpm_uuid::RecordId;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Document store for patient history.
#[derive(Clone)]
pub struct HistoryRepository {
    cfg: Arc<CoreConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl HistoryRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Loads a patient's full history.
    ///
    /// Missing history files are tolerated (they read as empty); a missing
    /// patient directory is not.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::PatientNotFound` if the patient directory does not
    /// exist.
    pub fn load(&self, patient_id: &RecordId) -> ClinicResult<PatientHistory> {
        let dir = self.patient_dir(patient_id);
        if !dir.is_dir() {
            return Err(ClinicError::PatientNotFound(patient_id.to_string()));
        }

        let appointments_path = dir.join(APPOINTMENTS_FILENAME);
        let appointments: Vec<Appointment> = if appointments_path.is_file() {
            helpers::read_json(&appointments_path)?
        } else {
            Vec::new()
        };

        let plan_path = dir.join(TREATMENT_PLAN_FILENAME);
        let plan: TreatmentPlan = if plan_path.is_file() {
            helpers::read_json(&plan_path)?
        } else {
            TreatmentPlan::default()
        };

        Ok(PatientHistory {
            appointments,
            plan,
        })
    }

    /// Appends an appointment to the patient's log and returns it.
    pub fn record_appointment(
        &self,
        patient_id: &RecordId,
        scheduled_at: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> ClinicResult<Appointment> {
        let _guard = lock(&self.write_lock);

        let mut history = self.load(patient_id)?;
        let appointment = Appointment {
            id: RecordId::new(),
            scheduled_at,
            status,
        };
        history.appointments.push(appointment.clone());

        helpers::write_json(
            &self.patient_dir(patient_id).join(APPOINTMENTS_FILENAME),
            &history.appointments,
        )?;
        Ok(appointment)
    }

    /// Replaces the patient's treatment plan, stamping `last_updated`.
    pub fn store_plan(
        &self,
        patient_id: &RecordId,
        mut plan: TreatmentPlan,
    ) -> ClinicResult<TreatmentPlan> {
        let _guard = lock(&self.write_lock);

        let dir = self.patient_dir(patient_id);
        if !dir.is_dir() {
            return Err(ClinicError::PatientNotFound(patient_id.to_string()));
        }

        plan.last_updated = Some(Utc::now());
        helpers::write_json(&dir.join(TREATMENT_PLAN_FILENAME), &plan)?;
        Ok(plan)
    }

    fn patient_dir(&self, patient_id: &RecordId) -> PathBuf {
        patient_id.sharded_dir(&self.cfg.patients_dir())
    }
}

fn lock(mutex: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DischargePolicy;
    use crate::history::TreatmentGoal;
    use crate::patient::PatientDraft;
    use crate::repositories::patients::PatientRepository;
    use cpm_types::NonEmptyText;
    use tempfile::TempDir;

    fn test_cfg(dir: &std::path::Path) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(dir.to_path_buf(), DischargePolicy::default())
                .expect("CoreConfig::new should succeed"),
        )
    }

    fn insert_patient(cfg: Arc<CoreConfig>) -> RecordId {
        let repo = PatientRepository::new(cfg);
        repo.insert(PatientDraft {
            given_names: vec!["Bob".into()],
            last_name: NonEmptyText::new("Jones").unwrap(),
            assigned_therapist_id: None,
            assigned_clinical_id: None,
            level_of_care: None,
        })
        .expect("insert should succeed")
        .id
    }

    #[test]
    fn test_load_for_unknown_patient_is_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = HistoryRepository::new(test_cfg(temp_dir.path()));

        let err = repo
            .load(&RecordId::new())
            .expect_err("unknown patient should fail");
        assert!(matches!(err, ClinicError::PatientNotFound(_)));
    }

    #[test]
    fn test_record_appointment_appends_to_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let patient_id = insert_patient(cfg.clone());
        let repo = HistoryRepository::new(cfg);

        repo.record_appointment(&patient_id, Utc::now(), AppointmentStatus::Attended)
            .expect("first appointment should record");
        repo.record_appointment(&patient_id, Utc::now(), AppointmentStatus::NoShow)
            .expect("second appointment should record");

        let history = repo.load(&patient_id).expect("load should succeed");
        assert_eq!(history.appointments.len(), 2);
        assert_eq!(history.attended_session_count(), 1);
    }

    #[test]
    fn test_store_plan_round_trips_and_stamps_timestamp() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let patient_id = insert_patient(cfg.clone());
        let repo = HistoryRepository::new(cfg);

        let plan = TreatmentPlan {
            goals: vec![TreatmentGoal {
                description: "Attend group sessions".into(),
                complete: false,
            }],
            clinician_signoff: false,
            last_updated: None,
        };
        let stored = repo
            .store_plan(&patient_id, plan)
            .expect("store_plan should succeed");
        assert!(stored.last_updated.is_some());

        let history = repo.load(&patient_id).expect("load should succeed");
        assert_eq!(history.plan.goals.len(), 1);
        assert_eq!(history.plan.goals[0].description, "Attend group sessions");
    }
}
