//! Error taxonomy for the CPM core.
//!
//! Four kinds carry the lifecycle semantics and are surfaced to end users with
//! enough detail to explain *why* an action failed:
//!
//! - `PatientNotFound` / `RequestNotFound`: a referenced entity is absent
//! - `InvalidState`: the operation is not valid for the current lifecycle state
//! - `Conflict`: a concurrent-modification race was lost
//! - `Forbidden`: the actor's role is insufficient for the requested transition
//!
//! All four are recoverable by the caller. Retrying is only appropriate for
//! `Conflict`, after re-fetching current state. The remaining variants are
//! storage and validation causes.

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("patient not found: {0}")]
    PatientNotFound(String),
    #[error("discharge request not found: {0}")]
    RequestNotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create record directory: {0}")]
    RecordDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialise record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialise record: {0}")]
    Deserialization(serde_json::Error),

    #[error("identifier error: {0}")]
    Uuid(#[from] cpm_uuid::UuidError),
    #[error("text validation error: {0}")]
    Text(#[from] cpm_types::TextError),
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
