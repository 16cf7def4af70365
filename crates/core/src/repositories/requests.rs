//! Discharge request storage.
//!
//! Requests live in their own sharded tree under `discharge_requests/`, one
//! JSON document per request. The same compare-and-set rule applies as for
//! patients: a write must name the version it read.

use crate::config::CoreConfig;
use crate::constants::REQUEST_RECORD_FILENAME;
use crate::error::{ClinicError, ClinicResult};
use crate::repositories::helpers;
use crate::staff::StaffRef;
use crate::workflow::{DischargeRequest, RequestState};
use chrono::{DateTime, Utc};
use cpm_types::NonEmptyText;
use cpm_uuid::RecordId;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Document store for discharge requests.
#[derive(Clone)]
pub struct RequestRepository {
    cfg: Arc<CoreConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl RequestRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a pending discharge request document.
    ///
    /// Workflow rules (patient exists, not discharged, no other pending
    /// request) are the discharge service's responsibility; this method only
    /// persists.
    pub fn create(
        &self,
        patient_id: RecordId,
        requested_by: StaffRef,
        reason: NonEmptyText,
        requested_at: DateTime<Utc>,
    ) -> ClinicResult<DischargeRequest> {
        let _guard = lock(&self.write_lock);

        let (id, dir) = helpers::create_unique_record_dir(&self.cfg.requests_dir(), RecordId::new)?;

        let request = DischargeRequest {
            id,
            patient_id,
            requested_by,
            requested_at,
            reason,
            state: RequestState::Pending,
            version: 1,
        };

        helpers::write_json(&dir.join(REQUEST_RECORD_FILENAME), &request)?;
        Ok(request)
    }

    /// Loads a discharge request document.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::RequestNotFound` if the record does not exist.
    pub fn load(&self, id: &RecordId) -> ClinicResult<DischargeRequest> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Err(ClinicError::RequestNotFound(id.to_string()));
        }
        helpers::read_json(&path)
    }

    /// Writes a request document, compare-and-set on `expected_version`.
    ///
    /// # Errors
    ///
    /// - `ClinicError::RequestNotFound` if the record does not exist.
    /// - `ClinicError::Conflict` if the stored version differs from
    ///   `expected_version`; in particular when two reviewers race, exactly
    ///   one write wins.
    pub fn store(
        &self,
        updated: &DischargeRequest,
        expected_version: u64,
    ) -> ClinicResult<DischargeRequest> {
        let _guard = lock(&self.write_lock);

        let current = self.load(&updated.id)?;
        if current.version != expected_version {
            return Err(ClinicError::Conflict(format!(
                "discharge request {} was modified concurrently (expected version {}, found {})",
                updated.id, expected_version, current.version
            )));
        }

        let mut persisted = updated.clone();
        persisted.version = expected_version + 1;

        helpers::write_json(&self.record_path(&updated.id), &persisted)?;
        Ok(persisted)
    }

    /// Lists discharge requests, newest first.
    ///
    /// Pass a patient identifier to restrict the listing to that patient's
    /// requests. Unparseable documents are logged as warnings and skipped.
    pub fn list(&self, patient_id: Option<&RecordId>) -> Vec<DischargeRequest> {
        let mut requests = Vec::new();

        for dir in helpers::leaf_record_dirs(&self.cfg.requests_dir()) {
            let record_path = dir.join(REQUEST_RECORD_FILENAME);
            if !record_path.is_file() {
                continue;
            }

            match helpers::read_json::<DischargeRequest>(&record_path) {
                Ok(request) => {
                    if patient_id.is_none() || patient_id == Some(&request.patient_id) {
                        requests.push(request);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to parse discharge request document: {} - {}",
                        record_path.display(),
                        e
                    );
                }
            }
        }

        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests
    }

    /// The patient's pending request, if one exists.
    pub fn pending_for_patient(&self, patient_id: &RecordId) -> Option<DischargeRequest> {
        self.list(Some(patient_id))
            .into_iter()
            .find(|r| r.is_pending())
    }

    fn record_path(&self, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.cfg.requests_dir())
            .join(REQUEST_RECORD_FILENAME)
    }
}

fn lock(mutex: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DischargePolicy;
    use crate::staff::StaffRole;
    use crate::workflow::{ReviewDecision, ReviewRecord};
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_cfg(dir: &std::path::Path) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(dir.to_path_buf(), DischargePolicy::default())
                .expect("CoreConfig::new should succeed"),
        )
    }

    fn requester() -> StaffRef {
        StaffRef {
            id: RecordId::new(),
            role: StaffRole::Clinician,
        }
    }

    #[test]
    fn test_create_and_load_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = RequestRepository::new(test_cfg(temp_dir.path()));

        let request = repo
            .create(
                RecordId::new(),
                requester(),
                NonEmptyText::new("Patient relocating").unwrap(),
                Utc::now(),
            )
            .expect("create should succeed");

        assert!(request.is_pending());
        assert_eq!(request.version, 1);

        let loaded = repo.load(&request.id).expect("load should succeed");
        assert_eq!(loaded, request);
    }

    #[test]
    fn test_load_unknown_request_is_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = RequestRepository::new(test_cfg(temp_dir.path()));

        let err = repo
            .load(&RecordId::new())
            .expect_err("unknown request should fail");
        assert!(matches!(err, ClinicError::RequestNotFound(_)));
    }

    #[test]
    fn test_concurrent_review_writes_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = RequestRepository::new(test_cfg(temp_dir.path()));
        let request = repo
            .create(
                RecordId::new(),
                requester(),
                NonEmptyText::new("Treatment complete").unwrap(),
                Utc::now(),
            )
            .expect("create should succeed");

        // Two reviewers read the same pending version and both try to write.
        let review = |decision| {
            let mut r = request.clone();
            r.apply_review(
                decision,
                ReviewRecord {
                    reviewed_by: StaffRef {
                        id: RecordId::new(),
                        role: StaffRole::Supervisor,
                    },
                    reviewed_at: Utc::now(),
                    notes: None,
                },
            )
            .expect("review of pending snapshot should apply");
            r
        };

        repo.store(&review(ReviewDecision::Approved), request.version)
            .expect("first write should win");
        let err = repo
            .store(&review(ReviewDecision::Denied), request.version)
            .expect_err("second write should lose the race");
        assert!(matches!(err, ClinicError::Conflict(_)));

        let current = repo.load(&request.id).expect("load should succeed");
        assert_eq!(current.status_label(), "approved");
    }

    #[test]
    fn test_list_is_newest_first_and_filters_by_patient() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = RequestRepository::new(test_cfg(temp_dir.path()));
        let patient_a = RecordId::new();
        let patient_b = RecordId::new();
        let base = Utc::now();

        let older = repo
            .create(
                patient_a.clone(),
                requester(),
                NonEmptyText::new("First request").unwrap(),
                base - Duration::days(2),
            )
            .expect("create should succeed");
        let newer = repo
            .create(
                patient_a.clone(),
                requester(),
                NonEmptyText::new("Second request").unwrap(),
                base,
            )
            .expect("create should succeed");
        repo.create(
            patient_b,
            requester(),
            NonEmptyText::new("Unrelated request").unwrap(),
            base - Duration::days(1),
        )
        .expect("create should succeed");

        let all = repo.list(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, newer.id, "newest request should come first");

        let for_a = repo.list(Some(&patient_a));
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].id, newer.id);
        assert_eq!(for_a[1].id, older.id);
    }
}
