//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{PATIENTS_DIR_NAME, REQUESTS_DIR_NAME};
use crate::error::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};

/// Thresholds driving the discharge criteria evaluator.
///
/// These are clinic policy, not code: a clinic may require more attended sessions
/// before considering discharge, or use a longer inactivity window.
#[derive(Clone, Copy, Debug)]
pub struct DischargePolicy {
    /// A patient must have no non-cancelled appointment within this many days
    /// before "no recent contact" is considered satisfied.
    pub inactivity_window_days: i64,
    /// Minimum number of attended sessions before discharge can be considered.
    pub minimum_attended_sessions: u32,
}

impl Default for DischargePolicy {
    fn default() -> Self {
        Self {
            inactivity_window_days: 30,
            minimum_attended_sessions: 3,
        }
    }
}

impl DischargePolicy {
    /// Builds a policy from optional environment variable values.
    ///
    /// `None` or empty/whitespace values fall back to the defaults. Non-numeric
    /// values are rejected rather than silently defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if a provided value does not parse as
    /// a positive integer.
    pub fn from_env_values(
        inactivity_window_days: Option<String>,
        minimum_attended_sessions: Option<String>,
    ) -> ClinicResult<Self> {
        let defaults = Self::default();

        let window = match non_empty(inactivity_window_days) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ClinicError::InvalidInput(format!(
                    "inactivity window must be a whole number of days, got: '{}'",
                    raw
                ))
            })?,
            None => defaults.inactivity_window_days,
        };

        let sessions = match non_empty(minimum_attended_sessions) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ClinicError::InvalidInput(format!(
                    "minimum attended sessions must be a non-negative whole number, got: '{}'",
                    raw
                ))
            })?,
            None => defaults.minimum_attended_sessions,
        };

        Ok(Self {
            inactivity_window_days: window,
            minimum_attended_sessions: sessions,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    clinic_data_dir: PathBuf,
    policy: DischargePolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if the discharge policy is not usable
    /// (the inactivity window must be at least one day).
    pub fn new(clinic_data_dir: PathBuf, policy: DischargePolicy) -> ClinicResult<Self> {
        if policy.inactivity_window_days < 1 {
            return Err(ClinicError::InvalidInput(
                "inactivity window must be at least 1 day".into(),
            ));
        }

        Ok(Self {
            clinic_data_dir,
            policy,
        })
    }

    pub fn clinic_data_dir(&self) -> &Path {
        &self.clinic_data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.clinic_data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.clinic_data_dir.join(REQUESTS_DIR_NAME)
    }

    pub fn policy(&self) -> &DischargePolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_apply_for_missing_values() {
        let policy = DischargePolicy::from_env_values(None, None).expect("defaults should apply");
        assert_eq!(policy.inactivity_window_days, 30);
        assert_eq!(policy.minimum_attended_sessions, 3);
    }

    #[test]
    fn test_policy_defaults_apply_for_blank_values() {
        let policy = DischargePolicy::from_env_values(Some("  ".into()), Some(String::new()))
            .expect("blank values should fall back to defaults");
        assert_eq!(policy.inactivity_window_days, 30);
        assert_eq!(policy.minimum_attended_sessions, 3);
    }

    #[test]
    fn test_policy_parses_explicit_values() {
        let policy = DischargePolicy::from_env_values(Some("45".into()), Some("5".into()))
            .expect("explicit values should parse");
        assert_eq!(policy.inactivity_window_days, 45);
        assert_eq!(policy.minimum_attended_sessions, 5);
    }

    #[test]
    fn test_policy_rejects_non_numeric_values() {
        let err = DischargePolicy::from_env_values(Some("a month".into()), None)
            .expect_err("non-numeric window should fail");
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_config_rejects_zero_day_window() {
        let policy = DischargePolicy {
            inactivity_window_days: 0,
            minimum_attended_sessions: 3,
        };
        let err = CoreConfig::new(PathBuf::from("/tmp/clinic"), policy)
            .expect_err("zero-day window should be rejected");
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }
}
