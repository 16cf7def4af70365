/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input text exceeded the permitted length
    #[error("Text exceeds maximum length of {max} characters")]
    TooLong {
        /// The maximum permitted length in characters
        max: usize,
    },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
///
/// CPM uses this for free-text fields that must carry content to be meaningful, such as a
/// discharge request's reason or a patient's family name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a new `NonEmptyText`, additionally enforcing a maximum length.
    ///
    /// Length is measured in characters after trimming. Use this for
    /// user-supplied free text that is persisted verbatim (for example review
    /// notes), where unbounded input is a foot-gun.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty, or
    /// `TextError::TooLong` if it exceeds `max` characters.
    pub fn bounded(input: impl AsRef<str>, max: usize) -> Result<Self, TextError> {
        let text = Self::new(input)?;
        if text.0.chars().count() > max {
            return Err(TextError::TooLong { max });
        }
        Ok(text)
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_and_accepts_content() {
        let text = NonEmptyText::new("  Patient relocating  ").expect("should accept content");
        assert_eq!(text.as_str(), "Patient relocating");
    }

    #[test]
    fn test_new_rejects_whitespace_only() {
        let err = NonEmptyText::new("   ").expect_err("whitespace-only input should fail");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn test_bounded_rejects_over_length_input() {
        let err = NonEmptyText::bounded("a".repeat(11), 10).expect_err("11 chars should fail");
        assert!(matches!(err, TextError::TooLong { max: 10 }));
    }

    #[test]
    fn test_bounded_accepts_input_at_limit() {
        let text = NonEmptyText::bounded("a".repeat(10), 10).expect("10 chars should pass");
        assert_eq!(text.as_str().len(), 10);
    }
}
