//! Request and response bodies for the CPM REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// JSON error body returned for every failed request.
///
/// `error` is a stable machine-readable kind; `message` explains *why* the
/// action failed, in terms the end user can act on.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    pub message: String,
}

/// A patient record as returned by the API.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub given_names: Vec<String>,
    pub last_name: String,
    pub status: String,
    pub assigned_therapist_id: Option<String>,
    pub assigned_clinical_id: Option<String>,
    pub level_of_care: Option<String>,
    pub intake_date: String,
    pub discharge_date: Option<String>,
    pub version: u64,
    pub last_updated: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

/// Intake form submission.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IntakePatientReq {
    pub given_names: Vec<String>,
    pub last_name: String,
    #[serde(default)]
    pub assigned_therapist_id: Option<String>,
    #[serde(default)]
    pub assigned_clinical_id: Option<String>,
    #[serde(default)]
    pub level_of_care: Option<String>,
}

/// Manual status change. The actor's role is resolved upstream and passed
/// explicitly.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SetStatusReq {
    pub status: String,
    pub actor_role: String,
}

/// Level-of-care assignment; `null` clears the field (removes the patient from
/// their program) without touching lifecycle status.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SetLevelOfCareReq {
    pub level_of_care: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordAppointmentReq {
    /// RFC 3339 timestamp.
    pub scheduled_at: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: String,
    pub scheduled_at: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TreatmentGoalDto {
    pub description: String,
    pub complete: bool,
}

/// Wholesale treatment plan replacement.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TreatmentPlanReq {
    pub goals: Vec<TreatmentGoalDto>,
    pub clinician_signoff: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TreatmentPlanRes {
    pub goals: Vec<TreatmentGoalDto>,
    pub clinician_signoff: bool,
    pub last_updated: Option<String>,
}

/// Proof of an eligible discharge evaluation, returned by the evaluator and
/// required by the auto-discharge endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluationTokenDto {
    pub patient_id: String,
    pub evaluated_at: String,
    pub patient_version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluateDischargeRes {
    pub should_discharge: bool,
    pub reason: String,
    pub criteria: Vec<String>,
    /// Present if and only if `should_discharge` is true.
    pub token: Option<EvaluationTokenDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AutoDischargeReq {
    pub token: EvaluationTokenDto,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDischargeRequestReq {
    pub patient_id: String,
    pub requested_by_id: String,
    pub requested_by_role: String,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewDischargeRequestReq {
    pub reviewer_id: String,
    pub reviewer_role: String,
    /// `approved` or `denied`.
    pub decision: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A discharge request as returned by the API. Review fields are populated if
/// and only if the request has left `pending`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DischargeRequestRes {
    pub id: String,
    pub patient_id: String,
    pub requested_by_id: String,
    pub requested_by_role: String,
    pub requested_at: String,
    pub reason: String,
    pub status: String,
    pub reviewed_by_id: Option<String>,
    pub reviewed_by_role: Option<String>,
    pub reviewed_at: Option<String>,
    pub review_notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListDischargeRequestsRes {
    pub requests: Vec<DischargeRequestRes>,
}
