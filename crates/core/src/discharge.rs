//! Discharge operations: evaluation, auto-discharge and the request workflow.
//!
//! This service is the only writer of `discharged` status. All three discharge
//! paths converge here and every one of them consults the transition guard:
//!
//! - **auto-discharge**: act on a prior eligible evaluation, bound to the exact
//!   patient version it inspected;
//! - **approved request**: a reviewer approves a pending discharge request,
//!   which discharges the patient in the same logical action;
//! - the manual supervisor/admin override lives in
//!   [`crate::patient::PatientService::set_status`].

use crate::config::CoreConfig;
use crate::criteria::{self, DischargeEvaluation, EvaluationToken};
use crate::error::{ClinicError, ClinicResult};
use crate::events::LifecycleEvent;
use crate::patient::{Patient, PatientStatus};
use crate::repositories::history::HistoryRepository;
use crate::repositories::patients::PatientRepository;
use crate::repositories::requests::RequestRepository;
use crate::staff::StaffRef;
use crate::transition::{check_transition, TransitionOrigin};
use crate::workflow::{
    DischargeRequest, ReviewDecision, ReviewRecord, MAX_NOTES_LEN, MAX_REASON_LEN,
};
use chrono::Utc;
use cpm_types::NonEmptyText;
use cpm_uuid::RecordId;
use serde_json::json;
use std::sync::Arc;

/// Service for discharge evaluation and the discharge request workflow.
#[derive(Clone)]
pub struct DischargeService {
    cfg: Arc<CoreConfig>,
    patients: PatientRepository,
    requests: RequestRepository,
    history: HistoryRepository,
}

impl DischargeService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        patients: PatientRepository,
        requests: RequestRepository,
        history: HistoryRepository,
    ) -> Self {
        Self {
            cfg,
            patients,
            requests,
            history,
        }
    }

    /// Evaluates the discharge criteria for a patient without mutating state.
    ///
    /// When the patient is eligible, the returned evaluation carries a token
    /// bound to the patient version that was inspected; [`auto_discharge`]
    /// requires it.
    ///
    /// # Errors
    ///
    /// - `ClinicError::PatientNotFound` if the patient does not exist.
    /// - `ClinicError::InvalidState` if the patient is already discharged.
    ///
    /// [`auto_discharge`]: DischargeService::auto_discharge
    pub fn evaluate(&self, patient_id: &RecordId) -> ClinicResult<DischargeEvaluation> {
        let patient = self.patients.load(patient_id)?;
        let history = self.history.load(patient_id)?;
        let now = Utc::now();

        let result = criteria::evaluate(&patient, &history, self.cfg.policy(), now)?;
        let token = result.should_discharge.then(|| EvaluationToken {
            patient_id: patient.id.clone(),
            evaluated_at: now,
            patient_version: patient.version,
        });

        Ok(DischargeEvaluation { result, token })
    }

    /// Discharges a patient on the strength of a prior eligible evaluation.
    ///
    /// There is no implicit re-evaluation: the token pins the exact patient
    /// version the criteria were computed against, so acting on stale criteria
    /// is impossible.
    ///
    /// # Errors
    ///
    /// - `ClinicError::PatientNotFound` if the patient does not exist.
    /// - `ClinicError::InvalidInput` if the token was issued for a different
    ///   patient.
    /// - `ClinicError::Conflict` if the patient is already discharged or the
    ///   record changed since the evaluation. The action is a no-op; the caller
    ///   is told so it does not report false success.
    pub fn auto_discharge(
        &self,
        patient_id: &RecordId,
        token: &EvaluationToken,
    ) -> ClinicResult<Patient> {
        if token.patient_id != *patient_id {
            return Err(ClinicError::InvalidInput(format!(
                "evaluation token was issued for patient {}, not {}",
                token.patient_id, patient_id
            )));
        }

        let patient = self.patients.load(patient_id)?;
        if patient.status == PatientStatus::Discharged {
            return Err(ClinicError::Conflict(format!(
                "patient {} is already discharged",
                patient_id
            )));
        }
        if patient.version != token.patient_version {
            return Err(ClinicError::Conflict(format!(
                "patient {} changed since the discharge evaluation (evaluated at version {}, now {}); re-evaluate before discharging",
                patient_id, token.patient_version, patient.version
            )));
        }

        check_transition(
            patient.status,
            PatientStatus::Discharged,
            &TransitionOrigin::AutoDischarge,
        )?;

        let mut updated = patient.clone();
        updated.status = PatientStatus::Discharged;
        updated.discharge_date = Some(Utc::now());
        let stored = self.patients.store(&updated, token.patient_version)?;

        LifecycleEvent::new("patient.auto_discharged", stored.id.to_string())
            .with_details(json!({
                "evaluated_at": token.evaluated_at.to_rfc3339(),
            }))
            .emit();
        Ok(stored)
    }

    /// Creates a pending discharge request for a patient.
    ///
    /// Any staff role may propose a discharge; the gate is the review. At most
    /// one pending request may exist per patient.
    ///
    /// # Errors
    ///
    /// - `ClinicError::PatientNotFound` if the patient does not exist.
    /// - `ClinicError::InvalidState` if the patient is already discharged, or a
    ///   pending request already exists.
    /// - `ClinicError::Text` if the reason is empty or too long.
    pub fn create_request(
        &self,
        patient_id: &RecordId,
        requested_by: StaffRef,
        reason: &str,
    ) -> ClinicResult<DischargeRequest> {
        let reason = NonEmptyText::bounded(reason, MAX_REASON_LEN)?;

        let patient = self.patients.load(patient_id)?;
        if patient.status == PatientStatus::Discharged {
            return Err(ClinicError::InvalidState(format!(
                "cannot request discharge: patient {} is already discharged",
                patient_id
            )));
        }

        if let Some(existing) = self.requests.pending_for_patient(patient_id) {
            return Err(ClinicError::InvalidState(format!(
                "a pending discharge request ({}) already exists for patient {}",
                existing.id, patient_id
            )));
        }

        let request =
            self.requests
                .create(patient_id.clone(), requested_by.clone(), reason, Utc::now())?;

        LifecycleEvent::new("discharge_request.created", patient_id.to_string())
            .with_actor(format!("{} ({})", requested_by.id, requested_by.role))
            .with_details(json!({ "request_id": request.id.to_string() }))
            .emit();
        Ok(request)
    }

    /// Reviews a pending discharge request.
    ///
    /// Approval also discharges the patient; the two effects are one logical
    /// action. The patient is written first, and if persisting the reviewed
    /// request then fails, the patient write is compensated so no half-applied
    /// approval can be observed.
    ///
    /// # Errors
    ///
    /// - `ClinicError::RequestNotFound` if the request does not exist.
    /// - `ClinicError::Forbidden` if the reviewer's role is below supervisor,
    ///   or the reviewer is the original requester.
    /// - `ClinicError::InvalidState` if the request was already reviewed, or
    ///   (on approval) the patient can no longer be discharged.
    /// - `ClinicError::Conflict` if a concurrent review won the race.
    pub fn review_request(
        &self,
        request_id: &RecordId,
        reviewer: StaffRef,
        decision: ReviewDecision,
        notes: Option<&str>,
    ) -> ClinicResult<DischargeRequest> {
        let notes = notes
            .map(|n| NonEmptyText::bounded(n, MAX_NOTES_LEN))
            .transpose()?;

        let request = self.requests.load(request_id)?;

        if !reviewer.role.may_review_discharge() {
            return Err(ClinicError::Forbidden(format!(
                "role {} may not review discharge requests; supervisor or admin required",
                reviewer.role
            )));
        }
        if reviewer.id == request.requested_by.id {
            return Err(ClinicError::Forbidden(format!(
                "staff member {} may not review their own discharge request",
                reviewer.id
            )));
        }

        let mut reviewed = request.clone();
        reviewed.apply_review(
            decision,
            ReviewRecord {
                reviewed_by: reviewer.clone(),
                reviewed_at: Utc::now(),
                notes,
            },
        )?;

        match decision {
            ReviewDecision::Denied => {
                let stored = self.requests.store(&reviewed, request.version)?;

                LifecycleEvent::new("discharge_request.denied", stored.patient_id.to_string())
                    .with_actor(format!("{} ({})", reviewer.id, reviewer.role))
                    .with_details(json!({ "request_id": stored.id.to_string() }))
                    .emit();
                Ok(stored)
            }
            ReviewDecision::Approved => {
                let patient = self.patients.load(&request.patient_id)?;
                check_transition(
                    patient.status,
                    PatientStatus::Discharged,
                    &TransitionOrigin::ApprovedRequest,
                )?;

                let mut discharged = patient.clone();
                discharged.status = PatientStatus::Discharged;
                discharged.discharge_date = Some(Utc::now());
                let stored_patient = self.patients.store(&discharged, patient.version)?;

                match self.requests.store(&reviewed, request.version) {
                    Ok(stored) => {
                        LifecycleEvent::new(
                            "discharge_request.approved",
                            stored.patient_id.to_string(),
                        )
                        .with_actor(format!("{} ({})", reviewer.id, reviewer.role))
                        .with_details(json!({ "request_id": stored.id.to_string() }))
                        .emit();
                        LifecycleEvent::new("patient.discharged", stored.patient_id.to_string())
                            .with_actor(format!("{} ({})", reviewer.id, reviewer.role))
                            .emit();
                        Ok(stored)
                    }
                    Err(err) => {
                        // Compensate the patient write so the approval is not
                        // half-applied: the request is still pending, so the
                        // patient must not remain discharged.
                        if let Err(restore_err) =
                            self.patients.store(&patient, stored_patient.version)
                        {
                            tracing::error!(
                                "failed to restore patient {} after request write failure: {} (original error: {})",
                                patient.id,
                                restore_err,
                                err
                            );
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    /// Lists discharge requests, newest first, optionally for one patient.
    pub fn list_requests(&self, patient_id: Option<&RecordId>) -> Vec<DischargeRequest> {
        self.requests.list(patient_id)
    }
}
