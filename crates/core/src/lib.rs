//! # CPM Core
//!
//! Core business logic for the CPM practice-management system.
//!
//! This crate contains the patient lifecycle engine and its document store:
//! - Patient intake, listing and role-guarded status transitions
//! - Discharge criteria evaluation (pure, auditable predicate list)
//! - The human-in-the-loop discharge request workflow
//! - Sharded JSON document storage with optimistic concurrency control
//!
//! **No API concerns**: Authentication, HTTP servers, or service interfaces belong in
//! `api-rest` or `api-shared`.

pub mod config;
pub mod constants;
pub mod criteria;
pub mod discharge;
pub mod error;
pub mod events;
pub mod history;
pub mod patient;
pub mod repositories;
pub mod staff;
pub mod transition;
pub mod workflow;

pub use config::{CoreConfig, DischargePolicy};
pub use cpm_types::{NonEmptyText, TextError};
pub use cpm_uuid::RecordId;
pub use criteria::{DischargeCriteriaResult, DischargeEvaluation, EvaluationToken};
pub use discharge::DischargeService;
pub use error::{ClinicError, ClinicResult};
pub use events::LifecycleEvent;
pub use history::{Appointment, AppointmentStatus, PatientHistory, TreatmentGoal, TreatmentPlan};
pub use patient::{Patient, PatientDraft, PatientService, PatientStatus};
pub use staff::{StaffRef, StaffRole};
pub use transition::TransitionOrigin;
pub use workflow::{DischargeRequest, RequestState, ReviewDecision, ReviewRecord};
