//! Unified result of a build attempt.

use serde::{Deserialize, Serialize};

/// Outcome reported for either execution path.
///
/// A build that ran but failed is an outcome with `success == false`; errors
/// that prevented the build from running are [`crate::BuildError`]s instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,

    /// Empty when `success` is true.
    pub error_message: String,

    pub duration_seconds: f64,

    /// Process exit code, only known for headless runs.
    pub exit_code: Option<i32>,
}

impl BuildOutcome {
    pub fn succeeded(duration_seconds: f64, exit_code: Option<i32>) -> Self {
        Self {
            success: true,
            error_message: String::new(),
            duration_seconds,
            exit_code,
        }
    }

    pub fn failed(
        error_message: impl Into<String>,
        duration_seconds: f64,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            success: false,
            error_message: error_message.into(),
            duration_seconds,
            exit_code,
        }
    }
}
