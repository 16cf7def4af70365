//! # API REST
//!
//! REST API implementation for CPM.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, error → status mapping)
//!
//! Enumerated fields (status, role, decision) arrive as lowercase strings and
//! are parsed into the core's closed types here; unrecognised values are
//! rejected with 400 and a message naming the offending value. Actor roles are
//! resolved upstream and passed explicitly in request bodies — this layer never
//! reads ambient session state.
//!
//! Uses `api-shared` for DTOs and common utilities.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::auth::validate_api_key;
use api_shared::dto::{
    AppointmentRes, AutoDischargeReq, CreateDischargeRequestReq, DischargeRequestRes, ErrorRes,
    EvaluateDischargeRes, EvaluationTokenDto, HealthRes, IntakePatientReq, ListDischargeRequestsRes,
    ListPatientsRes, PatientRes, RecordAppointmentReq, ReviewDischargeRequestReq, SetLevelOfCareReq,
    SetStatusReq, TreatmentGoalDto, TreatmentPlanReq, TreatmentPlanRes,
};
use api_shared::HealthService;
use cpm_core::{
    Appointment, ClinicError, CoreConfig, DischargeRequest, DischargeService, EvaluationToken,
    NonEmptyText, Patient, PatientDraft, PatientService, RecordId, StaffRef, TreatmentGoal,
    TreatmentPlan,
};
use cpm_core::repositories::history::HistoryRepository;
use cpm_core::repositories::patients::PatientRepository;
use cpm_core::repositories::requests::RequestRepository;

/// Application state shared across REST API handlers.
///
/// Repositories are constructed once here so every service shares the same
/// store-level write locks.
#[derive(Clone)]
pub struct AppState {
    pub patients: PatientService,
    pub discharge: DischargeService,
    api_key: Option<String>,
}

impl AppState {
    /// Builds the application state from resolved configuration.
    ///
    /// `api_key` enables `x-api-key` enforcement on mutating routes when set.
    pub fn new(cfg: Arc<CoreConfig>, api_key: Option<String>) -> Self {
        let patient_repo = PatientRepository::new(cfg.clone());
        let history_repo = HistoryRepository::new(cfg.clone());
        let request_repo = RequestRepository::new(cfg.clone());

        Self {
            patients: PatientService::new(patient_repo.clone(), history_repo.clone()),
            discharge: DischargeService::new(cfg, patient_repo, request_repo, history_repo),
            api_key,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        intake_patient,
        get_patient,
        set_patient_status,
        set_level_of_care,
        record_appointment,
        store_treatment_plan,
        evaluate_discharge,
        auto_discharge,
        create_discharge_request,
        list_discharge_requests,
        review_discharge_request,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        PatientRes,
        ListPatientsRes,
        IntakePatientReq,
        SetStatusReq,
        SetLevelOfCareReq,
        RecordAppointmentReq,
        AppointmentRes,
        TreatmentGoalDto,
        TreatmentPlanReq,
        TreatmentPlanRes,
        EvaluationTokenDto,
        EvaluateDischargeRes,
        AutoDischargeReq,
        CreateDischargeRequestReq,
        ReviewDischargeRequestReq,
        DischargeRequestRes,
        ListDischargeRequestsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with all routes, Swagger UI and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients).post(intake_patient))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/status", put(set_patient_status))
        .route("/patients/:id/level-of-care", put(set_level_of_care))
        .route("/patients/:id/appointments", post(record_appointment))
        .route("/patients/:id/treatment-plan", put(store_treatment_plan))
        .route("/patients/:id/discharge/evaluation", post(evaluate_discharge))
        .route("/patients/:id/discharge", post(auto_discharge))
        .route(
            "/discharge-requests",
            get(list_discharge_requests).post(create_discharge_request),
        )
        .route("/discharge-requests/:id/review", post(review_discharge_request))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Requires `x-api-key` on mutating requests when an API key is configured.
///
/// Read-only requests (and everything when no key is configured) pass through.
async fn require_api_key(
    State(state): State<AppState>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };
    if req.method() == Method::GET {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match validate_api_key(provided, expected) {
        Ok(()) => next.run(req).await,
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorRes {
                error: "unauthorised".into(),
                message: e.to_string(),
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Wrapper mapping `ClinicError` onto HTTP responses.
///
/// The lifecycle kinds keep their explanatory messages in the body so the UI
/// can tell the user *why* an action failed; storage errors are logged and
/// replaced with a generic 500 body.
pub struct ApiError(ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            ClinicError::PatientNotFound(_) | ClinicError::RequestNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ClinicError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ClinicError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ClinicError::InvalidState(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_state"),
            ClinicError::InvalidInput(_) | ClinicError::Text(_) | ClinicError::Uuid(_) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            _ => {
                tracing::error!("internal error handling request: {}", self.0);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorRes {
                        error: "internal".into(),
                        message: "Internal error".into(),
                    }),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(ErrorRes {
                error: kind.into(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// DTO CONVERSIONS
// ============================================================================

fn patient_res(patient: &Patient) -> PatientRes {
    PatientRes {
        id: patient.id.to_string(),
        given_names: patient.given_names.clone(),
        last_name: patient.last_name.clone(),
        status: patient.status.to_string(),
        assigned_therapist_id: patient.assigned_therapist_id.as_ref().map(|id| id.to_string()),
        assigned_clinical_id: patient.assigned_clinical_id.as_ref().map(|id| id.to_string()),
        level_of_care: patient.level_of_care.clone(),
        intake_date: patient.intake_date.to_rfc3339(),
        discharge_date: patient.discharge_date.map(|dt| dt.to_rfc3339()),
        version: patient.version,
        last_updated: patient.last_updated.to_rfc3339(),
    }
}

fn appointment_res(appointment: &Appointment) -> AppointmentRes {
    AppointmentRes {
        id: appointment.id.to_string(),
        scheduled_at: appointment.scheduled_at.to_rfc3339(),
        status: appointment.status.to_string(),
    }
}

fn plan_res(plan: &TreatmentPlan) -> TreatmentPlanRes {
    TreatmentPlanRes {
        goals: plan
            .goals
            .iter()
            .map(|g| TreatmentGoalDto {
                description: g.description.clone(),
                complete: g.complete,
            })
            .collect(),
        clinician_signoff: plan.clinician_signoff,
        last_updated: plan.last_updated.map(|dt| dt.to_rfc3339()),
    }
}

fn request_res(request: &DischargeRequest) -> DischargeRequestRes {
    let review = request.review();
    DischargeRequestRes {
        id: request.id.to_string(),
        patient_id: request.patient_id.to_string(),
        requested_by_id: request.requested_by.id.to_string(),
        requested_by_role: request.requested_by.role.to_string(),
        requested_at: request.requested_at.to_rfc3339(),
        reason: request.reason.as_str().to_string(),
        status: request.status_label().to_string(),
        reviewed_by_id: review.map(|r| r.reviewed_by.id.to_string()),
        reviewed_by_role: review.map(|r| r.reviewed_by.role.to_string()),
        reviewed_at: review.map(|r| r.reviewed_at.to_rfc3339()),
        review_notes: review.and_then(|r| r.notes.as_ref().map(|n| n.as_str().to_string())),
    }
}

fn token_dto(token: &EvaluationToken) -> EvaluationTokenDto {
    EvaluationTokenDto {
        patient_id: token.patient_id.to_string(),
        evaluated_at: token.evaluated_at.to_rfc3339(),
        patient_version: token.patient_version,
    }
}

fn token_from_dto(dto: &EvaluationTokenDto) -> Result<EvaluationToken, ClinicError> {
    Ok(EvaluationToken {
        patient_id: RecordId::parse(&dto.patient_id)?,
        evaluated_at: parse_timestamp(&dto.evaluated_at)?,
        patient_version: dto.patient_version,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ClinicError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClinicError::InvalidInput(format!("invalid RFC 3339 timestamp '{}': {}", raw, e)))
}

fn parse_record_id(raw: &str) -> Result<RecordId, ClinicError> {
    Ok(RecordId::parse(raw)?)
}

// ============================================================================
// HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancer probes.
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = ListPatientsRes)
    )
)]
/// Lists all patient records.
async fn list_patients(State(state): State<AppState>) -> Json<ListPatientsRes> {
    let patients = state.patients.list().iter().map(patient_res).collect();
    Json(ListPatientsRes { patients })
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = IntakePatientReq,
    responses(
        (status = 201, description = "Patient created", body = PatientRes),
        (status = 400, description = "Bad request", body = ErrorRes)
    )
)]
/// Creates a patient record from an intake form submission.
async fn intake_patient(
    State(state): State<AppState>,
    Json(req): Json<IntakePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError> {
    let draft = PatientDraft {
        given_names: req.given_names,
        last_name: NonEmptyText::new(&req.last_name).map_err(ClinicError::from)?,
        assigned_therapist_id: req
            .assigned_therapist_id
            .as_deref()
            .map(parse_record_id)
            .transpose()?,
        assigned_clinical_id: req
            .assigned_clinical_id
            .as_deref()
            .map(parse_record_id)
            .transpose()?,
        level_of_care: req
            .level_of_care
            .as_deref()
            .map(NonEmptyText::new)
            .transpose()
            .map_err(ClinicError::from)?,
    };

    let patient = state.patients.intake(draft)?;
    Ok((StatusCode::CREATED, Json(patient_res(&patient))))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier (32 lowercase hex)")),
    responses(
        (status = 200, description = "Patient record", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
/// Fetches a single patient record.
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let patient = state.patients.get(&id)?;
    Ok(Json(patient_res(&patient)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/status",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = SetStatusReq,
    responses(
        (status = 200, description = "Status changed", body = PatientRes),
        (status = 403, description = "Actor role insufficient", body = ErrorRes),
        (status = 409, description = "Concurrent modification", body = ErrorRes),
        (status = 422, description = "Transition not defined", body = ErrorRes)
    )
)]
/// Changes a patient's lifecycle status as a manual staff edit.
async fn set_patient_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<SetStatusReq>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let status = req.status.parse()?;
    let role = req.actor_role.parse()?;

    let patient = state.patients.set_status(&id, status, role)?;
    Ok(Json(patient_res(&patient)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/level-of-care",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = SetLevelOfCareReq,
    responses(
        (status = 200, description = "Level of care updated", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
/// Sets or clears the patient's program assignment. Lifecycle status is untouched.
async fn set_level_of_care(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<SetLevelOfCareReq>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let patient = state
        .patients
        .set_level_of_care(&id, req.level_of_care.as_deref())?;
    Ok(Json(patient_res(&patient)))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/appointments",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = RecordAppointmentReq,
    responses(
        (status = 201, description = "Appointment recorded", body = AppointmentRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
/// Appends an appointment to the patient's log.
async fn record_appointment(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<RecordAppointmentReq>,
) -> Result<(StatusCode, Json<AppointmentRes>), ApiError> {
    let id = parse_record_id(&id)?;
    let scheduled_at = parse_timestamp(&req.scheduled_at)?;
    let status = req.status.parse()?;

    let appointment = state.patients.record_appointment(&id, scheduled_at, status)?;
    Ok((StatusCode::CREATED, Json(appointment_res(&appointment))))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/treatment-plan",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = TreatmentPlanReq,
    responses(
        (status = 200, description = "Treatment plan replaced", body = TreatmentPlanRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
/// Replaces the patient's treatment plan.
async fn store_treatment_plan(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<TreatmentPlanReq>,
) -> Result<Json<TreatmentPlanRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let plan = TreatmentPlan {
        goals: req
            .goals
            .into_iter()
            .map(|g| TreatmentGoal {
                description: g.description,
                complete: g.complete,
            })
            .collect(),
        clinician_signoff: req.clinician_signoff,
        last_updated: None,
    };

    let stored = state.patients.store_treatment_plan(&id, plan)?;
    Ok(Json(plan_res(&stored)))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/discharge/evaluation",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Evaluation result", body = EvaluateDischargeRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Patient already discharged", body = ErrorRes)
    )
)]
/// Evaluates the discharge criteria for a patient. Read-only; returns a token
/// when the patient is eligible.
async fn evaluate_discharge(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<EvaluateDischargeRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let evaluation = state.discharge.evaluate(&id)?;

    Ok(Json(EvaluateDischargeRes {
        should_discharge: evaluation.result.should_discharge,
        reason: evaluation.result.reason,
        criteria: evaluation.result.criteria,
        token: evaluation.token.as_ref().map(token_dto),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/discharge",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = AutoDischargeReq,
    responses(
        (status = 200, description = "Patient discharged", body = PatientRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 409, description = "Record changed since evaluation", body = ErrorRes)
    )
)]
/// Discharges a patient on the strength of a prior eligible evaluation.
async fn auto_discharge(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<AutoDischargeReq>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let token = token_from_dto(&req.token)?;

    let patient = state.discharge.auto_discharge(&id, &token)?;
    Ok(Json(patient_res(&patient)))
}

#[utoipa::path(
    post,
    path = "/discharge-requests",
    request_body = CreateDischargeRequestReq,
    responses(
        (status = 201, description = "Discharge request created", body = DischargeRequestRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Patient discharged or request already pending", body = ErrorRes)
    )
)]
/// Creates a pending discharge request for a patient.
async fn create_discharge_request(
    State(state): State<AppState>,
    Json(req): Json<CreateDischargeRequestReq>,
) -> Result<(StatusCode, Json<DischargeRequestRes>), ApiError> {
    let patient_id = parse_record_id(&req.patient_id)?;
    let requested_by = StaffRef {
        id: parse_record_id(&req.requested_by_id)?,
        role: req.requested_by_role.parse()?,
    };

    let request = state
        .discharge
        .create_request(&patient_id, requested_by, &req.reason)?;
    Ok((StatusCode::CREATED, Json(request_res(&request))))
}

/// Query parameters for listing discharge requests.
#[derive(Debug, Deserialize, IntoParams)]
struct ListRequestsQuery {
    /// Restrict the listing to one patient's requests.
    patient_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/discharge-requests",
    params(ListRequestsQuery),
    responses(
        (status = 200, description = "Discharge requests, newest first", body = ListDischargeRequestsRes)
    )
)]
/// Lists discharge requests, newest first, optionally for one patient.
async fn list_discharge_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<ListDischargeRequestsRes>, ApiError> {
    let patient_id = query
        .patient_id
        .as_deref()
        .map(parse_record_id)
        .transpose()?;

    let requests = state
        .discharge
        .list_requests(patient_id.as_ref())
        .iter()
        .map(request_res)
        .collect();
    Ok(Json(ListDischargeRequestsRes { requests }))
}

#[utoipa::path(
    post,
    path = "/discharge-requests/{id}/review",
    params(("id" = String, Path, description = "Discharge request identifier")),
    request_body = ReviewDischargeRequestReq,
    responses(
        (status = 200, description = "Request reviewed", body = DischargeRequestRes),
        (status = 403, description = "Reviewer not permitted", body = ErrorRes),
        (status = 409, description = "Concurrent review won the race", body = ErrorRes),
        (status = 422, description = "Request already reviewed", body = ErrorRes)
    )
)]
/// Approves or denies a pending discharge request. Approval also discharges
/// the patient.
async fn review_discharge_request(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ReviewDischargeRequestReq>,
) -> Result<Json<DischargeRequestRes>, ApiError> {
    let id = parse_record_id(&id)?;
    let reviewer = StaffRef {
        id: parse_record_id(&req.reviewer_id)?,
        role: req.reviewer_role.parse()?,
    };
    let decision = req.decision.parse()?;

    let request = state
        .discharge
        .review_request(&id, reviewer, decision, req.notes.as_deref())?;
    Ok(Json(request_res(&request)))
}
