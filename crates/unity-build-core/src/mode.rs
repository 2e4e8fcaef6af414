//! Build mode selection.
//!
//! The editor's lock marker (`Temp/UnityLockfile`) is a point-in-time hint:
//! it can be stale after a crash or appear right after the check. An explicit
//! mode always overrides it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{BuildError, Result};

/// Mode requested by configuration or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfiguredMode {
    #[default]
    Auto,
    Batchmode,
    Trigger,
}

impl FromStr for ConfiguredMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ConfiguredMode::Auto),
            "batchmode" => Ok(ConfiguredMode::Batchmode),
            "trigger" => Ok(ConfiguredMode::Trigger),
            other => Err(BuildError::Config(format!(
                "invalid build mode: {other}, must be one of: auto, batchmode, trigger"
            ))),
        }
    }
}

/// Execution strategy chosen for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Headless subprocess; the editor must not be running.
    Batchmode,
    /// File handshake with an already-running editor.
    Trigger,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Batchmode => f.write_str("batchmode"),
            BuildMode::Trigger => f.write_str("trigger"),
        }
    }
}

/// Outcome of mode detection, including the lock observation it was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDecision {
    pub mode: BuildMode,
    pub lock_present: bool,
    pub lock_file: PathBuf,
}

impl ModeDecision {
    /// Whether the chosen mode disagrees with the lock file. Only an explicit
    /// mode can produce this.
    pub fn contradicts_lock(&self) -> bool {
        matches!(
            (self.mode, self.lock_present),
            (BuildMode::Batchmode, true) | (BuildMode::Trigger, false)
        )
    }
}

/// Path of the editor lock marker for a project.
pub fn lock_file_path(project_path: &Path) -> PathBuf {
    project_path.join("Temp").join("UnityLockfile")
}

/// Whether the editor currently appears to hold the project open.
pub fn editor_running(project_path: &Path) -> bool {
    lock_file_path(project_path).exists()
}

/// Resolve the configured mode against the project's lock state.
pub fn detect_mode(configured: ConfiguredMode, project_path: &Path) -> ModeDecision {
    let lock_file = lock_file_path(project_path);
    let lock_present = lock_file.exists();

    let mode = match configured {
        ConfiguredMode::Batchmode => BuildMode::Batchmode,
        ConfiguredMode::Trigger => BuildMode::Trigger,
        ConfiguredMode::Auto if lock_present => BuildMode::Trigger,
        ConfiguredMode::Auto => BuildMode::Batchmode,
    };

    debug!(?configured, lock_present, %mode, "Resolved build mode");

    let decision = ModeDecision {
        mode,
        lock_present,
        lock_file,
    };
    if decision.contradicts_lock() {
        warn!(
            %mode,
            lock_present,
            lock_file = %decision.lock_file.display(),
            "Explicit build mode disagrees with the editor lock file, proceeding as requested"
        );
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_lock(project: &Path) {
        let lock = lock_file_path(project);
        std::fs::create_dir_all(lock.parent().unwrap()).unwrap();
        std::fs::write(lock, b"").unwrap();
    }

    #[test]
    fn test_auto_without_lock_is_batchmode() {
        let dir = tempdir().unwrap();
        let decision = detect_mode(ConfiguredMode::Auto, dir.path());
        assert_eq!(decision.mode, BuildMode::Batchmode);
        assert!(!decision.lock_present);
    }

    #[test]
    fn test_auto_with_lock_is_trigger() {
        let dir = tempdir().unwrap();
        create_lock(dir.path());

        let decision = detect_mode(ConfiguredMode::Auto, dir.path());
        assert_eq!(decision.mode, BuildMode::Trigger);
        assert!(decision.lock_present);
        assert!(editor_running(dir.path()));
    }

    #[test]
    fn test_explicit_modes_ignore_lock() {
        let dir = tempdir().unwrap();
        assert_eq!(
            detect_mode(ConfiguredMode::Trigger, dir.path()).mode,
            BuildMode::Trigger
        );

        create_lock(dir.path());
        assert_eq!(
            detect_mode(ConfiguredMode::Batchmode, dir.path()).mode,
            BuildMode::Batchmode
        );
    }

    #[test]
    fn test_batchmode_overrides_stale_lock() {
        let dir = tempdir().unwrap();
        create_lock(dir.path());

        let decision = detect_mode(ConfiguredMode::Batchmode, dir.path());
        assert_eq!(decision.mode, BuildMode::Batchmode);
        assert!(decision.lock_present);
        assert!(decision.contradicts_lock());
    }

    #[test]
    fn test_trigger_without_lock_is_honoured() {
        let dir = tempdir().unwrap();

        let decision = detect_mode(ConfiguredMode::Trigger, dir.path());
        assert_eq!(decision.mode, BuildMode::Trigger);
        assert!(decision.contradicts_lock());
    }

    #[test]
    fn test_auto_never_contradicts_lock() {
        let dir = tempdir().unwrap();
        assert!(!detect_mode(ConfiguredMode::Auto, dir.path()).contradicts_lock());
        create_lock(dir.path());
        assert!(!detect_mode(ConfiguredMode::Auto, dir.path()).contradicts_lock());
    }

    #[test]
    fn test_configured_mode_from_str() {
        assert_eq!("auto".parse::<ConfiguredMode>().unwrap(), ConfiguredMode::Auto);
        assert_eq!(
            "trigger".parse::<ConfiguredMode>().unwrap(),
            ConfiguredMode::Trigger
        );
        assert!("headless".parse::<ConfiguredMode>().is_err());
    }
}
