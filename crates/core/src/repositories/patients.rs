//! Patient record storage.
//!
//! Patients are stored as JSON documents in a sharded structure:
//!
//! ```text
//! patients/
//!   <s1>/
//!     <s2>/
//!       <id>/
//!         patient.json          # the patient document
//!         appointments.json     # appointment log (managed by HistoryRepository)
//!         treatment_plan.json   # treatment plan (managed by HistoryRepository)
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the identifier,
//! providing scalable directory sharding.
//!
//! ## Concurrency
//!
//! Every patient document carries a `version`. [`PatientRepository::store`] is a
//! compare-and-set: the caller names the version it read, and the write fails
//! with `Conflict` if the stored document has moved on. Writes through a
//! repository and its clones are serialised by a shared lock, which makes the
//! read-compare-write sequence atomic within the process. Cross-process
//! deployments must front this store with a single writer.

use crate::config::CoreConfig;
use crate::constants::{APPOINTMENTS_FILENAME, PATIENT_RECORD_FILENAME, TREATMENT_PLAN_FILENAME};
use crate::error::{ClinicError, ClinicResult};
use crate::history::{Appointment, TreatmentPlan};
use crate::patient::{Patient, PatientDraft, PatientStatus};
use crate::repositories::helpers;
use chrono::Utc;
use cpm_uuid::RecordId;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Document store for patient records.
#[derive(Clone)]
pub struct PatientRepository {
    cfg: Arc<CoreConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl PatientRepository {
    /// Creates a new patient repository.
    ///
    /// Clones share the write lock; construct the repository once per store and
    /// clone it into services.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a new patient record from an intake draft.
    ///
    /// Allocates a fresh identifier and sharded directory, then writes the
    /// patient document alongside an empty appointment log and an empty
    /// treatment plan.
    ///
    /// # Errors
    ///
    /// Returns a `ClinicError` if the directory cannot be allocated or any of
    /// the three documents cannot be written.
    pub fn insert(&self, draft: PatientDraft) -> ClinicResult<Patient> {
        let _guard = lock(&self.write_lock);

        let (id, dir) = helpers::create_unique_record_dir(&self.cfg.patients_dir(), RecordId::new)?;
        let now = Utc::now();

        let patient = Patient {
            id,
            given_names: draft.given_names,
            last_name: draft.last_name.as_str().to_string(),
            status: PatientStatus::Active,
            assigned_therapist_id: draft.assigned_therapist_id,
            assigned_clinical_id: draft.assigned_clinical_id,
            level_of_care: draft.level_of_care.map(|loc| loc.as_str().to_string()),
            intake_date: now,
            discharge_date: None,
            version: 1,
            last_updated: now,
        };

        helpers::write_json(&dir.join(PATIENT_RECORD_FILENAME), &patient)?;
        helpers::write_json(&dir.join(APPOINTMENTS_FILENAME), &Vec::<Appointment>::new())?;
        helpers::write_json(&dir.join(TREATMENT_PLAN_FILENAME), &TreatmentPlan::default())?;

        Ok(patient)
    }

    /// Loads a patient document.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::PatientNotFound` if the record does not exist.
    pub fn load(&self, id: &RecordId) -> ClinicResult<Patient> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Err(ClinicError::PatientNotFound(id.to_string()));
        }
        helpers::read_json(&path)
    }

    /// Writes a patient document, compare-and-set on `expected_version`.
    ///
    /// On success the stored document carries `expected_version + 1` and a
    /// fresh `last_updated`; the returned value is what was persisted.
    ///
    /// # Errors
    ///
    /// - `ClinicError::PatientNotFound` if the record does not exist.
    /// - `ClinicError::Conflict` if the stored version differs from
    ///   `expected_version` (the caller lost a race and must re-fetch).
    pub fn store(&self, updated: &Patient, expected_version: u64) -> ClinicResult<Patient> {
        let _guard = lock(&self.write_lock);

        let current = self.load(&updated.id)?;
        if current.version != expected_version {
            return Err(ClinicError::Conflict(format!(
                "patient {} was modified concurrently (expected version {}, found {})",
                updated.id, expected_version, current.version
            )));
        }

        let mut persisted = updated.clone();
        persisted.version = expected_version + 1;
        persisted.last_updated = Utc::now();

        helpers::write_json(&self.record_path(&updated.id), &persisted)?;
        Ok(persisted)
    }

    /// Lists all patient records.
    ///
    /// Traverses the sharded directory structure and reads every
    /// `patient.json`. Individual documents that cannot be parsed are logged as
    /// warnings and skipped so one corrupt record cannot hide the rest.
    pub fn list(&self) -> Vec<Patient> {
        let mut patients = Vec::new();

        for dir in helpers::leaf_record_dirs(&self.cfg.patients_dir()) {
            let record_path = dir.join(PATIENT_RECORD_FILENAME);
            if !record_path.is_file() {
                continue;
            }

            match helpers::read_json::<Patient>(&record_path) {
                Ok(patient) => patients.push(patient),
                Err(e) => {
                    tracing::warn!(
                        "failed to parse patient document: {} - {}",
                        record_path.display(),
                        e
                    );
                }
            }
        }

        patients
    }

    pub(crate) fn record_dir(&self, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.cfg.patients_dir())
    }

    fn record_path(&self, id: &RecordId) -> PathBuf {
        self.record_dir(id).join(PATIENT_RECORD_FILENAME)
    }
}

fn lock(mutex: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    // A poisoned lock only means another writer panicked; the guarded section
    // leaves documents whole-file consistent, so continue.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DischargePolicy;
    use cpm_types::NonEmptyText;
    use std::fs;
    use tempfile::TempDir;

    fn test_cfg(dir: &std::path::Path) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(dir.to_path_buf(), DischargePolicy::default())
                .expect("CoreConfig::new should succeed"),
        )
    }

    fn test_draft() -> PatientDraft {
        PatientDraft {
            given_names: vec!["Alice".into()],
            last_name: NonEmptyText::new("Smith").unwrap(),
            assigned_therapist_id: None,
            assigned_clinical_id: None,
            level_of_care: None,
        }
    }

    #[test]
    fn test_insert_creates_sharded_documents() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = PatientRepository::new(test_cfg(temp_dir.path()));

        let patient = repo.insert(test_draft()).expect("insert should succeed");
        let dir = repo.record_dir(&patient.id);

        assert!(dir.join(PATIENT_RECORD_FILENAME).is_file());
        assert!(dir.join(APPOINTMENTS_FILENAME).is_file());
        assert!(dir.join(TREATMENT_PLAN_FILENAME).is_file());

        let loaded = repo.load(&patient.id).expect("load should succeed");
        assert_eq!(loaded, patient);
    }

    #[test]
    fn test_store_with_stale_version_conflicts_and_keeps_document() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = PatientRepository::new(test_cfg(temp_dir.path()));
        let patient = repo.insert(test_draft()).expect("insert should succeed");

        let mut first = patient.clone();
        first.level_of_care = Some("PHP".into());
        repo.store(&first, patient.version)
            .expect("first store should succeed");

        let mut second = patient.clone();
        second.level_of_care = Some("IOP".into());
        let err = repo
            .store(&second, patient.version)
            .expect_err("stale store should conflict");
        assert!(matches!(err, ClinicError::Conflict(_)));

        let current = repo.load(&patient.id).expect("load should succeed");
        assert_eq!(current.level_of_care.as_deref(), Some("PHP"));
        assert_eq!(current.version, 2);
    }

    #[test]
    fn test_list_returns_empty_for_missing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = PatientRepository::new(test_cfg(temp_dir.path()));

        assert!(repo.list().is_empty());
    }

    #[test]
    fn test_list_skips_invalid_documents() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = PatientRepository::new(test_cfg(temp_dir.path()));

        repo.insert(test_draft()).expect("insert should succeed");

        // Plant a corrupt document alongside the valid one.
        let bogus_id = RecordId::new();
        let bogus_dir = bogus_id.sharded_dir(&repo.cfg.patients_dir());
        fs::create_dir_all(&bogus_dir).expect("should create directory");
        fs::write(bogus_dir.join(PATIENT_RECORD_FILENAME), "not json {{{")
            .expect("should write invalid document");

        let patients = repo.list();
        assert_eq!(patients.len(), 1, "corrupt document should be skipped");
        assert_eq!(patients[0].given_names, vec!["Alice".to_string()]);
    }
}
