//! Error taxonomy for build orchestration.

use std::path::PathBuf;
use std::time::Duration;

/// Errors produced while preparing or running a build attempt.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Bad or missing configuration, surfaced before any mutation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed explicit version string.
    #[error("invalid version '{input}': expected X.Y.Z")]
    VersionParse { input: String },

    /// Helper scripts could not be placed into (or removed from) the project.
    #[error("script deployment failed: {0}")]
    ScriptDeployment(String),

    /// The Unity executable could not be found or launched.
    #[error("build process error: {0}")]
    BuildProcess(String),

    /// The running editor did not answer the trigger before the deadline.
    #[error(
        "build result not received within {}s, expected: {}",
        .waited.as_secs(),
        .expected.display()
    )]
    TriggerTimeout { waited: Duration, expected: PathBuf },

    /// The response file existed but was not a valid result document.
    #[error("malformed build result {}: {reason}", .path.display())]
    HandshakeParse { path: PathBuf, reason: String },

    /// A headless run exceeded the configured batchmode timeout.
    #[error("Unity build timed out after {}s", .0.as_secs())]
    BuildTimeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Process exit code reported by the CLI for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Config(_) => 2,
            BuildError::VersionParse { .. } => 3,
            BuildError::ScriptDeployment(_) => 4,
            BuildError::BuildProcess(_) => 5,
            BuildError::TriggerTimeout { .. } => 6,
            BuildError::HandshakeParse { .. } => 7,
            BuildError::BuildTimeout(_) => 8,
            BuildError::Serialization(_) | BuildError::Io(_) => 1,
        }
    }
}

/// Result type for build orchestration.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_timeout_display_names_path() {
        let err = BuildError::TriggerTimeout {
            waited: Duration::from_secs(30),
            expected: PathBuf::from("/proj/build_result.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("30s"));
        assert!(msg.contains("build_result.json"));
    }

    #[test]
    fn test_version_parse_display() {
        let err = BuildError::VersionParse {
            input: "1.2".to_string(),
        };
        assert!(err.to_string().contains("'1.2'"));
    }

    #[test]
    fn test_exit_codes_are_nonzero_and_distinct() {
        let errors = [
            BuildError::Config("x".into()),
            BuildError::VersionParse { input: "x".into() },
            BuildError::ScriptDeployment("x".into()),
            BuildError::BuildProcess("x".into()),
            BuildError::TriggerTimeout {
                waited: Duration::ZERO,
                expected: PathBuf::new(),
            },
            BuildError::HandshakeParse {
                path: PathBuf::new(),
                reason: "x".into(),
            },
            BuildError::BuildTimeout(Duration::from_secs(60)),
        ];
        let mut codes: Vec<i32> = errors.iter().map(BuildError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_build_timeout_reports_seconds() {
        let err = BuildError::BuildTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Unity build timed out after 30s");
    }
}
