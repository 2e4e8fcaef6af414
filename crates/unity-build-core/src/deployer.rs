//! Deployment of the editor-side helper scripts.
//!
//! Each helper is a C# script plus its `.meta` sidecar, copied into the
//! project's `Assets/Editor/` folder for the duration of one build attempt.
//! [`DeployedScript`] is a guard: dropping it removes both files, so every
//! exit path of an attempt cleans up.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{BuildError, Result};

/// Helper scripts consumed by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Entry point invoked by `-executeMethod` in a headless run.
    BuildScript,
    /// Watches for the trigger file inside a running editor.
    TriggerWatcher,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 2] = [ScriptKind::BuildScript, ScriptKind::TriggerWatcher];

    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptKind::BuildScript => "BuildScript.cs",
            ScriptKind::TriggerWatcher => "BuildTriggerWatcher.cs",
        }
    }

    pub fn meta_file_name(&self) -> String {
        format!("{}.meta", self.file_name())
    }
}

/// Copies helper scripts from a source folder into a project.
#[derive(Debug, Clone)]
pub struct ScriptDeployer {
    source_dir: PathBuf,
    editor_dir: PathBuf,
}

impl ScriptDeployer {
    pub fn new(source_dir: impl Into<PathBuf>, project_path: &Path) -> Self {
        Self {
            source_dir: source_dir.into(),
            editor_dir: editor_dir(project_path),
        }
    }

    pub fn editor_dir(&self) -> &Path {
        &self.editor_dir
    }

    /// Copy the script for `kind` and its sidecar into the project.
    ///
    /// Any helper pair left behind by an earlier attempt is removed first so
    /// that at most one pair is ever present.
    pub fn deploy(&self, kind: ScriptKind) -> Result<DeployedScript> {
        let script_src = self.source_dir.join(kind.file_name());
        let meta_src = self.source_dir.join(kind.meta_file_name());
        for src in [&script_src, &meta_src] {
            if !src.is_file() {
                return Err(BuildError::ScriptDeployment(format!(
                    "helper source not found: {}",
                    src.display()
                )));
            }
        }

        self.remove_stale()?;

        fs::create_dir_all(&self.editor_dir).map_err(|e| {
            BuildError::ScriptDeployment(format!(
                "cannot create {}: {e}",
                self.editor_dir.display()
            ))
        })?;

        let deployed = DeployedScript {
            kind,
            script_path: self.editor_dir.join(kind.file_name()),
            meta_path: self.editor_dir.join(kind.meta_file_name()),
            released: false,
        };

        // On a failed copy `deployed` drops here and removes whatever landed.
        copy_file(&script_src, &deployed.script_path)?;
        copy_file(&meta_src, &deployed.meta_path)?;

        info!(script = %deployed.script_path.display(), "Deployed helper script");
        Ok(deployed)
    }

    /// Remove helper files of every kind left over from an interrupted attempt.
    fn remove_stale(&self) -> Result<()> {
        for kind in ScriptKind::ALL {
            for name in [kind.file_name().to_string(), kind.meta_file_name()] {
                let path = self.editor_dir.join(name);
                if path.exists() {
                    warn!(path = %path.display(), "Removing stale helper script");
                    remove_if_present(&path)?;
                }
            }
        }
        Ok(())
    }
}

/// `Assets/Editor/` inside a project.
pub fn editor_dir(project_path: &Path) -> PathBuf {
    project_path.join("Assets").join("Editor")
}

/// A helper script pair currently present in the project.
#[derive(Debug)]
#[must_use = "dropping the guard removes the deployed script"]
pub struct DeployedScript {
    kind: ScriptKind,
    script_path: PathBuf,
    meta_path: PathBuf,
    released: bool,
}

impl DeployedScript {
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// Remove both files, reporting failures. Already-absent files are fine.
    pub fn cleanup(mut self) -> Result<()> {
        self.released = true;
        remove_pair(&self.script_path, &self.meta_path)
    }
}

impl Drop for DeployedScript {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_pair(&self.script_path, &self.meta_path) {
            warn!(error = %e, "Failed to clean up helper script");
        }
    }
}

fn remove_pair(script: &Path, meta: &Path) -> Result<()> {
    let first = remove_if_present(script);
    let second = remove_if_present(meta);
    debug!(script = %script.display(), "Removed helper script");
    first.and(second)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::ScriptDeployment(format!(
            "cannot remove {}: {e}",
            path.display()
        ))),
    }
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest).map(|_| ()).map_err(|e| {
        BuildError::ScriptDeployment(format!(
            "cannot copy {} to {}: {e}",
            src.display(),
            dest.display()
        ))
    })
}
