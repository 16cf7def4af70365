/// Errors produced by API authentication checks.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    InvalidKey,
}

/// Validates a provided API key against the expected key.
///
/// The expected key is resolved once at startup and passed in; this function
/// never reads the environment.
///
/// Returns `Ok(())` if the key matches, or `AuthError::InvalidKey` otherwise.
pub fn validate_api_key(provided_key: &str, expected_key: &str) -> Result<(), AuthError> {
    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_key_is_accepted() {
        assert!(validate_api_key("secret", "secret").is_ok());
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        assert!(matches!(
            validate_api_key("wrong", "secret"),
            Err(AuthError::InvalidKey)
        ));
    }
}
