//! One build attempt from version resolution to the reported outcome.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::batchmode::{BatchmodeCommand, BatchmodeExecutor, BatchmodeRequest};
use crate::config::BuildConfig;
use crate::deployer::{ScriptDeployer, ScriptKind};
use crate::error::{BuildError, Result};
use crate::handshake::{HandshakeCoordinator, HandshakeRequest};
use crate::locator::{EditorLocator, HubLayoutLocator};
use crate::mode::{detect_mode, BuildMode};
use crate::outcome::BuildOutcome;
use crate::version::{artifact_filename, resolve_version, SemanticVersion};

/// What an attempt will issue to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlannedAction {
    Batchmode(BatchmodeCommand),
    Trigger(HandshakeRequest),
}

/// Everything decided before an attempt touches the project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlan {
    pub version: SemanticVersion,
    pub artifact_filename: String,

    /// Absolute path the artifact is built to.
    pub output_path: PathBuf,

    pub mode: BuildMode,

    /// Whether the editor lock file was seen when the mode was chosen.
    pub lock_present: bool,

    pub action: PlannedAction,
}

impl BuildPlan {
    /// Helper script the action needs inside the project.
    pub fn script_kind(&self) -> ScriptKind {
        match self.action {
            PlannedAction::Batchmode(_) => ScriptKind::BuildScript,
            PlannedAction::Trigger(_) => ScriptKind::TriggerWatcher,
        }
    }
}

/// Composes version resolution, mode detection, deployment and execution.
pub struct BuildOrchestrator<L = HubLayoutLocator> {
    config: BuildConfig,
    locator: L,
}

impl BuildOrchestrator<HubLayoutLocator> {
    pub fn new(config: BuildConfig) -> Self {
        Self::with_locator(config, HubLayoutLocator)
    }
}

impl<L: EditorLocator> BuildOrchestrator<L> {
    pub fn with_locator(config: BuildConfig, locator: L) -> Self {
        Self { config, locator }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Compute the attempt without side effects.
    ///
    /// Reads the output folder, the lock file and (for batchmode) the editors
    /// folder. Nothing is written and nothing is launched.
    pub fn plan(&self, explicit_version: Option<SemanticVersion>) -> Result<BuildPlan> {
        let config = &self.config;

        let version = resolve_version(
            &config.output_folder,
            &config.apk_prefix,
            config.version_increment,
            explicit_version,
        )?;

        let decision = detect_mode(config.build_mode, &config.project_path);

        let artifact = artifact_filename(&config.apk_prefix, version, &config.artifact_extension);
        let output_path = std::path::absolute(config.output_folder.join(&artifact))?;

        let action = match decision.mode {
            BuildMode::Batchmode => {
                PlannedAction::Batchmode(self.batchmode_command(version, &output_path)?)
            }
            BuildMode::Trigger => PlannedAction::Trigger(HandshakeRequest {
                output_path: output_path.display().to_string(),
                scenes: config.scenes.clone(),
                build_target: config.build_target.clone(),
            }),
        };

        Ok(BuildPlan {
            version,
            artifact_filename: artifact,
            output_path,
            mode: decision.mode,
            lock_present: decision.lock_present,
            action,
        })
    }

    fn batchmode_command(
        &self,
        version: SemanticVersion,
        output_path: &std::path::Path,
    ) -> Result<BatchmodeCommand> {
        let config = &self.config;
        let editors_root = config.unity_editors_path.as_deref().ok_or_else(|| {
            BuildError::Config("unity_editors_path is not set".to_string())
        })?;
        let unity_exe = self.locator.locate(editors_root, &config.unity_version)?;
        let project_path = std::path::absolute(&config.project_path)?;
        let log_path =
            std::path::absolute(config.log_folder.join(format!("build_{version}.log")))?;

        Ok(BatchmodeCommand::new(&BatchmodeRequest {
            unity_exe: &unity_exe,
            project_path: &project_path,
            build_target: &config.build_target,
            execute_method: &config.build_script_method,
            output_path,
            scenes: &config.scenes,
            log_path: &log_path,
        }))
    }

    /// Run one build attempt.
    ///
    /// Returns `Ok` with a failed outcome when the editor reports a build
    /// failure, and `Err` when the attempt itself could not be carried out.
    /// The helper script is removed on every path.
    pub async fn run_build(
        &self,
        explicit_version: Option<SemanticVersion>,
    ) -> Result<BuildOutcome> {
        let plan = self.plan(explicit_version)?;
        self.execute(&plan).await
    }

    /// Carry out a previously computed plan.
    pub async fn execute(&self, plan: &BuildPlan) -> Result<BuildOutcome> {
        let start = Instant::now();
        let config = &self.config;

        info!(
            version = %plan.version,
            mode = %plan.mode,
            artifact = %plan.artifact_filename,
            "Starting build attempt"
        );

        if let PlannedAction::Batchmode(_) = plan.action {
            std::fs::create_dir_all(&config.log_folder).map_err(|e| {
                BuildError::Config(format!(
                    "cannot create log folder {}: {e}",
                    config.log_folder.display()
                ))
            })?;
        }

        let deployer = ScriptDeployer::new(config.scripts_dir(), &config.project_path);
        let script = deployer.deploy(plan.script_kind())?;

        let result = match &plan.action {
            PlannedAction::Batchmode(command) => {
                BatchmodeExecutor::execute(command, config.batchmode_timeout()).await
            }
            PlannedAction::Trigger(request) => {
                let mut coordinator =
                    HandshakeCoordinator::new(&config.project_path, config.handshake_settings());
                coordinator.exchange(request).await.map(BuildOutcome::from)
            }
        };

        // A build error outranks a cleanup error; a clean build does not hide one.
        let result = match (result, script.cleanup()) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(error = %cleanup, "Helper script cleanup failed");
                Err(e)
            }
        };

        match &result {
            Ok(outcome) => info!(
                success = outcome.success,
                duration_seconds = outcome.duration_seconds,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Build attempt finished"
            ),
            Err(e) => warn!(error = %e, "Build attempt aborted"),
        }

        result
    }
}
