//! Headless (batchmode) execution of the Unity editor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{BuildError, Result};
use crate::outcome::BuildOutcome;

pub const FLAG_BATCHMODE: &str = "-batchmode";
pub const FLAG_QUIT: &str = "-quit";
pub const FLAG_NOGRAPHICS: &str = "-nographics";
pub const FLAG_PROJECT_PATH: &str = "-projectPath";
pub const FLAG_BUILD_TARGET: &str = "-buildTarget";
pub const FLAG_EXECUTE_METHOD: &str = "-executeMethod";
pub const FLAG_LOG_FILE: &str = "-logFile";

/// Environment variable carrying the artifact output path.
pub const ENV_BUILD_OUTPUT_PATH: &str = "BUILD_OUTPUT_PATH";
/// Environment variable carrying the `;`-separated scene list.
pub const ENV_BUILD_SCENES: &str = "BUILD_SCENES";

/// Lines of the Unity log quoted in a failure message.
pub const LOG_TAIL_LINES: usize = 20;

/// Inputs for one headless run.
#[derive(Debug, Clone)]
pub struct BatchmodeRequest<'a> {
    pub unity_exe: &'a Path,
    pub project_path: &'a Path,
    pub build_target: &'a str,
    pub execute_method: &'a str,
    pub output_path: &'a Path,
    pub scenes: &'a [String],
    pub log_path: &'a Path,
}

/// Fully resolved command line for a headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchmodeCommand {
    /// Unity executable.
    pub program: PathBuf,

    pub args: Vec<String>,

    /// Extra environment passed to the child.
    pub env: Vec<(String, String)>,

    /// Where Unity writes its log.
    pub log_path: PathBuf,
}

impl BatchmodeCommand {
    pub fn new(request: &BatchmodeRequest<'_>) -> Self {
        let args = vec![
            FLAG_BATCHMODE.to_string(),
            FLAG_QUIT.to_string(),
            FLAG_NOGRAPHICS.to_string(),
            FLAG_PROJECT_PATH.to_string(),
            request.project_path.display().to_string(),
            FLAG_BUILD_TARGET.to_string(),
            request.build_target.to_string(),
            FLAG_EXECUTE_METHOD.to_string(),
            request.execute_method.to_string(),
            FLAG_LOG_FILE.to_string(),
            request.log_path.display().to_string(),
        ];
        let env = vec![
            (
                ENV_BUILD_OUTPUT_PATH.to_string(),
                request.output_path.display().to_string(),
            ),
            (ENV_BUILD_SCENES.to_string(), request.scenes.join(";")),
        ];

        Self {
            program: request.unity_exe.to_path_buf(),
            args,
            env,
            log_path: request.log_path.to_path_buf(),
        }
    }

    /// Value following `flag`, if present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for dry runs and logs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|part| {
                if part.contains(' ') {
                    format!("\"{part}\"")
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs Unity headlessly and interprets its exit status.
pub struct BatchmodeExecutor;

impl BatchmodeExecutor {
    /// Launch the command and wait for it to exit.
    ///
    /// Without a timeout this waits indefinitely. A launch failure is a
    /// [`BuildError::BuildProcess`]; a non-zero exit is a failed outcome.
    pub async fn execute(
        command: &BatchmodeCommand,
        timeout: Option<Duration>,
    ) -> Result<BuildOutcome> {
        let start = Instant::now();

        info!(command = %command.display_line(), "Starting Unity build");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BuildError::BuildProcess(format!(
                    "failed to launch {}: {e}",
                    command.program.display()
                ))
            })?;

        let status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "Unity build timed out, killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill Unity process");
                    }
                    return Err(BuildError::BuildTimeout(limit));
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| BuildError::BuildProcess(format!("failed waiting for Unity: {e}")))?;

        let duration_seconds = start.elapsed().as_secs_f64();
        let exit_code = status.code().unwrap_or(-1);

        if status.success() {
            info!(duration_seconds, "Unity build finished");
            return Ok(BuildOutcome::succeeded(duration_seconds, Some(exit_code)));
        }

        warn!(exit_code, log = %command.log_path.display(), "Unity build failed");
        let message = failure_message(exit_code, &command.log_path);
        Ok(BuildOutcome::failed(message, duration_seconds, Some(exit_code)))
    }
}

fn failure_message(exit_code: i32, log_path: &Path) -> String {
    let mut message = format!(
        "Unity build failed with exit code {exit_code}. Check log: {}",
        log_path.display()
    );
    let tail = log_tail(log_path, LOG_TAIL_LINES);
    if !tail.is_empty() {
        message.push_str(&format!("\n--- Last {} lines of build log ---\n", tail.len()));
        message.push_str(&tail.join("\n"));
    }
    message
}

/// Last `lines` lines of a log file; empty when unreadable.
pub fn log_tail(path: &Path, lines: usize) -> Vec<String> {
    let Ok(bytes) = std::fs::read(path) else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    all[skip..].iter().map(|l| l.to_string()).collect()
}
