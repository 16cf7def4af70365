//! Discharge criteria evaluation.
//!
//! The evaluator is a pure decision function: given a patient, their history and
//! the clinic's policy thresholds, it decides whether discharge criteria are met.
//! It never mutates state.
//!
//! The policy is conjunctive over a fixed, ordered list of independent
//! predicates. A single failing predicate blocks discharge. The returned
//! `criteria` list enumerates only the predicates that passed, in declaration
//! order, so two evaluations of the same history produce identical output.

use crate::config::DischargePolicy;
use crate::error::{ClinicError, ClinicResult};
use crate::history::PatientHistory;
use crate::patient::{Patient, PatientStatus};
use chrono::{DateTime, Duration, Utc};
use cpm_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// The outcome of a discharge criteria evaluation. Transient; never persisted.
#[derive(Clone, Debug)]
pub struct DischargeCriteriaResult {
    /// True only if every predicate passed.
    pub should_discharge: bool,
    /// Human-readable explanation: names the first failing predicate, or states
    /// that all criteria are met.
    pub reason: String,
    /// Descriptions of the predicates that passed, in a stable order.
    pub criteria: Vec<String>,
}

/// Proof that an eligible evaluation happened against a specific patient version.
///
/// Auto-discharge requires a token rather than re-evaluating implicitly: the
/// caller must act on the exact record state it inspected. If the patient record
/// changes between evaluation and action, the version no longer matches and the
/// discharge is refused with `Conflict`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationToken {
    pub patient_id: RecordId,
    pub evaluated_at: DateTime<Utc>,
    pub patient_version: u64,
}

/// An evaluation result, plus a token when the patient is eligible.
#[derive(Clone, Debug)]
pub struct DischargeEvaluation {
    pub result: DischargeCriteriaResult,
    /// Present if and only if `result.should_discharge` is true.
    pub token: Option<EvaluationToken>,
}

/// Evaluates the discharge criteria for a patient.
///
/// # Errors
///
/// Returns `ClinicError::InvalidState` if the patient is already discharged; a
/// terminal patient is not re-evaluated.
pub fn evaluate(
    patient: &Patient,
    history: &PatientHistory,
    policy: &DischargePolicy,
    now: DateTime<Utc>,
) -> ClinicResult<DischargeCriteriaResult> {
    if patient.status == PatientStatus::Discharged {
        return Err(ClinicError::InvalidState(format!(
            "cannot evaluate discharge criteria: patient {} is already discharged",
            patient.id
        )));
    }

    // Predicate order is fixed; audit output depends on it.
    let checks = [
        (
            format!(
                "minimum of {} attended sessions completed",
                policy.minimum_attended_sessions
            ),
            history.attended_session_count() >= policy.minimum_attended_sessions as usize,
        ),
        (
            format!(
                "no appointments in last {} days",
                policy.inactivity_window_days
            ),
            history.latest_activity().map_or(true, |latest| {
                now.signed_duration_since(latest) >= Duration::days(policy.inactivity_window_days)
            }),
        ),
        (
            "all treatment goals marked complete".to_string(),
            !history.plan.goals.is_empty() && history.plan.goals.iter().all(|g| g.complete),
        ),
        (
            "clinician sign-off recorded".to_string(),
            history.plan.clinician_signoff,
        ),
    ];

    let criteria: Vec<String> = checks
        .iter()
        .filter(|(_, passed)| *passed)
        .map(|(label, _)| label.clone())
        .collect();

    match checks.iter().find(|(_, passed)| !*passed) {
        None => Ok(DischargeCriteriaResult {
            should_discharge: true,
            reason: "all discharge criteria met".into(),
            criteria,
        }),
        Some((label, _)) => Ok(DischargeCriteriaResult {
            should_discharge: false,
            reason: format!("discharge blocked: {} not satisfied", label),
            criteria,
        }),
    }
}
