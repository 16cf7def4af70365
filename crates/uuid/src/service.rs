//! Internal implementation of the canonical record identifier.

use crate::{UuidError, UuidResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// CPM's canonical record identifier (32 lowercase hex characters, no hyphens).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in CPM's
/// canonical format. It provides type safety for identifier operations and ensures consistent
/// path derivation across the system.
///
/// # When to use this type
/// Use this wrapper whenever you are:
/// - Accepting an identifier string from *outside* the core (CLI input, API request, etc), or
/// - Deriving a sharded storage path for a patient or discharge request.
/// - Generating new record identifiers.
///
/// Once you have a `RecordId`, you can safely assume the internal UUID is valid
/// and in canonical form.
///
/// # Construction
/// - [`RecordId::new`] generates a new canonical identifier (for new records).
/// - [`RecordId::parse`] validates an externally supplied identifier.
///
/// # Display format
/// When displayed or converted to string, `RecordId` always produces the canonical
/// 32-character lowercase hex format without hyphens. The same representation is used
/// for serde serialisation, so identifiers round-trip through JSON documents unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordId {
    /// Generates a new identifier in CPM's canonical form.
    ///
    /// This is suitable for allocating a fresh identifier during patient intake or
    /// discharge request creation. The generated UUID follows RFC 4122 version 4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier string that must already be in CPM's canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example, hyphenated or
    /// uppercase). Callers must provide the canonical representation. This strict validation
    /// ensures consistency and prevents issues with different UUID representations.
    ///
    /// # Arguments
    ///
    /// * `input` - Identifier string to validate and wrap. Must be exactly 32 lowercase hex
    ///   characters.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if Self::is_canonical(input) {
            // SAFETY: is_canonical guarantees valid hex, so parse_str will succeed
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(UuidError::InvalidInput(format!(
            "Record ID must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    /// Returns the identifier as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in CPM's canonical identifier form.
    ///
    /// This is a purely syntactic check that validates:
    /// - Exactly 32 bytes long
    /// - Contains only lowercase hex characters (`0-9` and `a-f`)
    ///
    /// This method is fast and can be used for pre-validation before calling
    /// [`parse`](RecordId::parse).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>/` where `s1`/`s2` are derived from this identifier.
    ///
    /// This implements CPM's sharding scheme:
    /// - `s1` is the first two hex characters of the identifier
    /// - `s2` is the next two hex characters
    /// - The full identifier forms the leaf directory
    ///
    /// This sharding prevents filesystem performance issues with large numbers of record
    /// directories in a single location.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for RecordId {
    /// Formats the identifier in canonical form (32 lowercase hex characters, no hyphens).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display in canonical (simple) form
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = UuidError;

    /// Parses a string into a `RecordId`, requiring canonical form.
    ///
    /// This is equivalent to calling [`RecordId::parse`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = RecordId::new();
        let canonical = id.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(RecordId::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_id() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let result = RecordId::parse(canonical);

        assert!(result.is_ok());
        assert_eq!(result.unwrap().to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_id() {
        let hyphenated = "550e8400-e29b-41d4-a716-446655440000";
        let result = RecordId::parse(hyphenated);

        assert!(result.is_err());
        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_id() {
        let uppercase = "550E8400E29B41D4A716446655440000";
        assert!(RecordId::parse(uppercase).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(RecordId::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(RecordId::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(RecordId::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert!(RecordId::parse("550e8400e29b41d4a716446655440zzz").is_err());
    }

    #[test]
    fn test_sharded_dir_structure() {
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let parent = Path::new("/clinic_data/patients");
        let dir = id.sharded_dir(parent);

        assert_eq!(
            dir,
            Path::new("/clinic_data/patients/55/0e/550e8400e29b41d4a716446655440000")
        );
    }

    #[test]
    fn test_serde_round_trip_uses_canonical_form() {
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_string(&id).expect("should serialise");
        assert_eq!(json, "\"550e8400e29b41d4a716446655440000\"");

        let back: RecordId = serde_json::from_str(&json).expect("should deserialise");
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialise_rejects_non_canonical() {
        let result: Result<RecordId, _> =
            serde_json::from_str("\"550e8400-e29b-41d4-a716-446655440000\"");
        assert!(result.is_err());
    }
}
