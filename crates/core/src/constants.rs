//! Constants used throughout the CPM core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for clinic data storage when no explicit directory is configured.
pub const DEFAULT_CLINIC_DATA_DIR: &str = "clinic_data";

/// Directory name for patient records storage.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Directory name for discharge request storage.
pub const REQUESTS_DIR_NAME: &str = "discharge_requests";

/// Filename for the patient document inside a patient's sharded directory.
pub const PATIENT_RECORD_FILENAME: &str = "patient.json";

/// Filename for the appointment log inside a patient's sharded directory.
pub const APPOINTMENTS_FILENAME: &str = "appointments.json";

/// Filename for the treatment plan inside a patient's sharded directory.
pub const TREATMENT_PLAN_FILENAME: &str = "treatment_plan.json";

/// Filename for the discharge request document inside a request's sharded directory.
pub const REQUEST_RECORD_FILENAME: &str = "request.json";
