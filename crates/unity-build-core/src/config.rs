//! Build configuration.
//!
//! Loaded from a JSON file (`config.json` by default). Relative `log_folder`
//! and `scripts_dir` entries resolve against the directory holding the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{BuildError, Result};
use crate::handshake::HandshakeSettings;
use crate::mode::ConfiguredMode;
use crate::version::IncrementKind;

/// Default location of the helper scripts, relative to the config file.
pub const DEFAULT_SCRIPTS_DIR: &str = "unity_build_script";

fn default_artifact_extension() -> String {
    "apk".to_string()
}

fn default_trigger_timeout_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Typed build configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Editor version directory name, e.g. `6000.3.7f1`.
    pub unity_version: String,

    /// Folder holding one directory per installed editor version.
    /// `None` means discover it.
    #[serde(default)]
    pub unity_editors_path: Option<PathBuf>,

    pub project_path: PathBuf,

    /// Scenes to include, in build order.
    pub scenes: Vec<String>,

    /// Unity build target identifier, e.g. `Android`.
    pub build_target: String,

    /// Where artifacts are written and scanned for versions.
    pub output_folder: PathBuf,

    pub apk_prefix: String,

    pub version_increment: IncrementKind,

    /// Static method passed to `-executeMethod`.
    pub build_script_method: String,

    pub log_folder: PathBuf,

    #[serde(default)]
    pub build_mode: ConfiguredMode,

    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Folder with `BuildScript.cs`, `BuildTriggerWatcher.cs` and their `.meta` files.
    #[serde(default)]
    pub scripts_dir: Option<PathBuf>,

    #[serde(default = "default_trigger_timeout_secs")]
    pub trigger_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Kill a headless run after this long. Unset waits indefinitely.
    #[serde(default)]
    pub batchmode_timeout_secs: Option<u64>,
}

impl BuildConfig {
    /// Parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BuildError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: BuildConfig = serde_json::from_str(&raw).map_err(|e| {
            BuildError::Config(format!("invalid configuration {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative_to(base);
        config.validate()?;

        debug!(config = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let scripts = self
            .scripts_dir
            .take()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPTS_DIR));
        self.scripts_dir = Some(join_relative(base, scripts));
        self.log_folder = join_relative(base, std::mem::take(&mut self.log_folder));
    }

    /// Check paths and values that must hold before anything is touched.
    pub fn validate(&self) -> Result<()> {
        if !self.project_path.is_dir() {
            return Err(BuildError::Config(format!(
                "Unity project not found: {}",
                self.project_path.display()
            )));
        }
        if !self.output_folder.is_dir() {
            return Err(BuildError::Config(format!(
                "output folder not found: {}",
                self.output_folder.display()
            )));
        }
        if self.apk_prefix.is_empty() {
            return Err(BuildError::Config("apk_prefix must not be empty".to_string()));
        }
        if self.artifact_extension.is_empty()
            || !self.artifact_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(BuildError::Config(format!(
                "invalid artifact_extension: {:?}",
                self.artifact_extension
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(BuildError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn with_overrides(
        mut self,
        increment: Option<IncrementKind>,
        mode: Option<ConfiguredMode>,
    ) -> Self {
        if let Some(increment) = increment {
            self.version_increment = increment;
        }
        if let Some(mode) = mode {
            self.build_mode = mode;
        }
        self
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.scripts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPTS_DIR))
    }

    pub fn handshake_settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            timeout: Duration::from_secs(self.trigger_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            focus_editor: true,
        }
    }

    pub fn batchmode_timeout(&self) -> Option<Duration> {
        self.batchmode_timeout_secs.map(Duration::from_secs)
    }
}

fn join_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn write_config(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    fn full_config(dir: &TempDir) -> serde_json::Value {
        let project = dir.path().join("project");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        json!({
            "unity_version": "6000.3.7f1",
            "unity_editors_path": "C:/Program Files/Unity/Hub/Editor",
            "project_path": project,
            "scenes": ["Assets/Scenes/Main.unity"],
            "build_target": "Android",
            "output_folder": output,
            "apk_prefix": "game",
            "version_increment": "patch",
            "build_script_method": "BuildAutomation.BuildScript.BuildAndroid",
            "log_folder": "logs"
        })
    }

    #[test]
    fn test_load_valid_config_with_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, full_config(&dir));

        let config = BuildConfig::load(&path).unwrap();
        assert_eq!(config.unity_version, "6000.3.7f1");
        assert_eq!(config.build_mode, ConfiguredMode::Auto);
        assert_eq!(config.version_increment, IncrementKind::Patch);
        assert_eq!(config.artifact_extension, "apk");
        assert_eq!(config.trigger_timeout_secs, 3600);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.batchmode_timeout(), None);
        assert_eq!(config.log_folder, dir.path().join("logs"));
        assert_eq!(config.scripts_dir(), dir.path().join(DEFAULT_SCRIPTS_DIR));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = BuildConfig::load(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_field_is_named() {
        let dir = tempdir().unwrap();
        let mut value = full_config(&dir);
        value.as_object_mut().unwrap().remove("build_target");
        let path = write_config(&dir, value);

        let err = BuildConfig::load(&path).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(err.to_string().contains("build_target"));
    }

    #[test]
    fn test_missing_project_is_config_error() {
        let dir = tempdir().unwrap();
        let mut value = full_config(&dir);
        value["project_path"] = json!(dir.path().join("nope"));
        let path = write_config(&dir, value);

        let err = BuildConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Unity project not found"));
    }

    #[test]
    fn test_missing_output_folder_is_config_error() {
        let dir = tempdir().unwrap();
        let mut value = full_config(&dir);
        value["output_folder"] = json!(dir.path().join("nope"));
        let path = write_config(&dir, value);

        let err = BuildConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("output folder not found"));
    }

    #[test]
    fn test_invalid_increment_rejected() {
        let dir = tempdir().unwrap();
        let mut value = full_config(&dir);
        value["version_increment"] = json!("huge");
        let path = write_config(&dir, value);

        assert!(matches!(
            BuildConfig::load(&path),
            Err(BuildError::Config(_))
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let dir = tempdir().unwrap();
        let mut value = full_config(&dir);
        value["poll_interval_ms"] = json!(0);
        let path = write_config(&dir, value);

        assert!(BuildConfig::load(&path)
            .unwrap_err()
            .to_string()
            .contains("poll_interval_ms"));
    }

    #[test]
    fn test_optional_fields_and_absolute_paths() {
        let dir = tempdir().unwrap();
        let scripts = tempdir().unwrap();
        let mut value = full_config(&dir);
        value["unity_editors_path"] = serde_json::Value::Null;
        value["build_mode"] = json!("trigger");
        value["scripts_dir"] = json!(scripts.path());
        value["batchmode_timeout_secs"] = json!(120);
        let path = write_config(&dir, value);

        let config = BuildConfig::load(&path).unwrap();
        assert_eq!(config.unity_editors_path, None);
        assert_eq!(config.build_mode, ConfiguredMode::Trigger);
        assert_eq!(config.scripts_dir(), scripts.path());
        assert_eq!(config.batchmode_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let dir = tempdir().unwrap();
        let path = write_config(&dir, full_config(&dir));

        let config = BuildConfig::load(&path)
            .unwrap()
            .with_overrides(Some(IncrementKind::Major), Some(ConfiguredMode::Batchmode));
        assert_eq!(config.version_increment, IncrementKind::Major);
        assert_eq!(config.build_mode, ConfiguredMode::Batchmode);

        let unchanged = config.clone().with_overrides(None, None);
        assert_eq!(unchanged, config);
    }
}
