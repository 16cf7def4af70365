//! Repository management modules.
//!
//! This module contains the document-store services backing the lifecycle
//! engine: patient records, appointment/treatment history, and discharge
//! requests. All repositories share the same storage scheme (one sharded
//! directory per record holding JSON documents) and the same optimistic
//! concurrency rule: every document carries a `version`, and a write must name
//! the version it read or fail with `Conflict`.

pub mod history;
pub mod patients;
pub mod requests;

pub(crate) mod helpers;
