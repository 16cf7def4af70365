//! Repository-related utilities.
//!
//! This module contains functions shared by the document repositories:
//! sharded directory allocation and traversal, and JSON document I/O.

use crate::error::{ClinicError, ClinicResult};
use cpm_uuid::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Creates a unique sharded directory within the base records directory.
///
/// This function generates identifiers using the provided source function and attempts to
/// create a corresponding sharded directory. It guards against identifier collisions or
/// pre-existing directories by retrying up to 5 times with different identifiers.
///
/// # Arguments
///
/// * `base_dir` - The base records directory.
/// * `id_source` - A mutable closure that generates new `RecordId` instances.
///
/// # Returns
///
/// Returns a tuple of the allocated `RecordId` and the `PathBuf` to the created directory.
///
/// # Errors
///
/// Returns a `ClinicError::RecordDirCreation` if:
/// - directory creation fails after 5 attempts,
/// - parent directory creation fails.
pub(crate) fn create_unique_record_dir(
    base_dir: &Path,
    mut id_source: impl FnMut() -> RecordId,
) -> ClinicResult<(RecordId, PathBuf)> {
    // Allocate a new identifier, but guard against pathological collisions (or pre-existing
    // directories from external interference) by limiting retries.
    for _attempt in 0..5 {
        let id = id_source();
        let candidate = id.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(ClinicError::RecordDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((id, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ClinicError::RecordDirCreation(e)),
        }
    }

    Err(ClinicError::RecordDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "could not allocate a unique record directory after 5 attempts",
    )))
}

/// Collects the leaf record directories under a sharded base directory.
///
/// Traverses `base_dir/<s1>/<s2>/<id>/` and returns each `<id>` directory. A
/// missing or unreadable base directory yields an empty list; listing must
/// degrade gracefully rather than fail the whole operation.
pub(crate) fn leaf_record_dirs(base_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    let s1_iter = match fs::read_dir(base_dir) {
        Ok(it) => it,
        Err(_) => return dirs,
    };
    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let s2_iter = match fs::read_dir(&s1_path) {
            Ok(it) => it,
            Err(_) => continue,
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let id_iter = match fs::read_dir(&s2_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                if id_path.is_dir() {
                    dirs.push(id_path);
                }
            }
        }
    }

    dirs
}

/// Reads and deserialises a JSON document.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> ClinicResult<T> {
    let contents = fs::read_to_string(path).map_err(ClinicError::FileRead)?;
    serde_json::from_str(&contents).map_err(ClinicError::Deserialization)
}

/// Serialises and writes a JSON document.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> ClinicResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(ClinicError::Serialization)?;
    fs::write(path, json).map_err(ClinicError::FileWrite)
}
