//! File handshake with a running Unity editor.
//!
//! The editor-side watcher picks up `build_trigger.json` from the project
//! root, runs the build, and answers with `build_result.json`. There is at
//! most one outstanding request per project.
//!
//! One attempt walks the states
//! `Idle -> RequestWritten -> Focused -> Polling -> ResultReceived | TimedOut -> Cleaned`.
//! The request file is held by a guard, so it never outlives the attempt.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BuildError, Result};
use crate::focus;
use crate::outcome::BuildOutcome;

/// Request file name in the project root.
pub const REQUEST_FILENAME: &str = "build_trigger.json";
/// Response file name in the project root.
pub const RESULT_FILENAME: &str = "build_result.json";

/// Build request read by the editor watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub output_path: String,
    pub scenes: Vec<String>,
    pub build_target: String,
}

/// Build result written by the editor watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResult {
    pub success: bool,

    /// Empty on success.
    #[serde(default)]
    pub error: String,

    #[serde(default)]
    pub duration_seconds: f64,
}

impl From<HandshakeResult> for BuildOutcome {
    fn from(result: HandshakeResult) -> Self {
        if result.success {
            BuildOutcome::succeeded(result.duration_seconds, None)
        } else {
            let message = if result.error.is_empty() {
                "Unknown error".to_string()
            } else {
                result.error
            };
            BuildOutcome::failed(message, result.duration_seconds, None)
        }
    }
}

/// Handshake progress for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    RequestWritten,
    Focused,
    Polling,
    ResultReceived,
    TimedOut,
    Cleaned,
}

/// Timing knobs for the handshake.
#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    /// Give up after this long without a response.
    pub timeout: Duration,

    /// Delay between response-file checks.
    pub poll_interval: Duration,

    /// Bring the editor window forward after writing the request.
    pub focus_editor: bool,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_millis(500),
            focus_editor: true,
        }
    }
}

/// Drives one request/response exchange against a project directory.
pub struct HandshakeCoordinator {
    project_path: PathBuf,
    settings: HandshakeSettings,
    state: HandshakeState,
}

impl HandshakeCoordinator {
    pub fn new(project_path: impl Into<PathBuf>, settings: HandshakeSettings) -> Self {
        Self {
            project_path: project_path.into(),
            settings,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn request_path(&self) -> PathBuf {
        self.project_path.join(REQUEST_FILENAME)
    }

    pub fn result_path(&self) -> PathBuf {
        self.project_path.join(RESULT_FILENAME)
    }

    /// Send `request` to the editor and wait for its answer.
    ///
    /// Files left by an earlier timed-out attempt are cleared first. On
    /// return, neither the request nor the response file remains.
    pub async fn exchange(&mut self, request: &HandshakeRequest) -> Result<HandshakeResult> {
        let result = self.exchange_inner(request).await;
        self.transition(HandshakeState::Cleaned);
        result
    }

    async fn exchange_inner(&mut self, request: &HandshakeRequest) -> Result<HandshakeResult> {
        self.clear_stale()?;

        let pending = PendingRequest::write(&self.project_path, request)?;
        self.transition(HandshakeState::RequestWritten);

        if self.settings.focus_editor && focus::focus_editor().await {
            self.transition(HandshakeState::Focused);
        }

        self.transition(HandshakeState::Polling);
        let result_path = self.result_path();
        let started = Instant::now();

        info!(
            timeout_secs = self.settings.timeout.as_secs(),
            "Waiting for build result"
        );

        loop {
            if let Some(result) = read_result(&result_path)? {
                self.transition(HandshakeState::ResultReceived);
                pending.release()?;
                return Ok(result);
            }

            let waited = started.elapsed();
            if waited >= self.settings.timeout {
                self.transition(HandshakeState::TimedOut);
                pending.release()?;
                remove_if_present(&result_path)?;
                return Err(BuildError::TriggerTimeout {
                    waited,
                    expected: result_path,
                });
            }

            let remaining = self.settings.timeout - waited;
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }
    }

    fn clear_stale(&self) -> Result<()> {
        for path in [self.request_path(), self.result_path()] {
            if path.exists() {
                warn!(path = %path.display(), "Removing stale handshake file");
                remove_if_present(&path)?;
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "Handshake state");
        self.state = next;
    }
}

/// Request file written into the project; removed when dropped.
struct PendingRequest {
    path: PathBuf,
}

impl PendingRequest {
    /// Write the request atomically: temp file in the same directory, then rename.
    fn write(project_path: &Path, request: &HandshakeRequest) -> Result<Self> {
        let path = project_path.join(REQUEST_FILENAME);
        let body = serde_json::to_vec_pretty(request)?;

        let mut tmp = NamedTempFile::new_in(project_path)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(path = %path.display(), "Wrote build trigger");
        Ok(Self { path })
    }

    fn release(self) -> Result<()> {
        remove_if_present(&self.path)
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if let Err(e) = remove_if_present(&self.path) {
            warn!(error = %e, path = %self.path.display(), "Failed to remove build trigger");
        }
    }
}

/// Read and consume the response file if the editor has written it.
///
/// A zero-length file is treated as still being written.
fn read_result(path: &Path) -> Result<Option<HandshakeResult>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() {
        return Ok(None);
    }

    let parsed = serde_json::from_slice::<HandshakeResult>(&bytes);
    remove_if_present(path)?;

    parsed.map(Some).map_err(|e| BuildError::HandshakeParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
