//! Unity editor lookup and discovery.
//!
//! Unity Hub installs each editor under `<editors root>/<version>/Editor/`.
//! When the editors root is not configured it is searched for and the result
//! is cached next to the configuration file.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{BuildError, Result};

/// Cache file written next to the configuration file.
pub const EDITORS_CACHE_FILENAME: &str = ".unity_editors_cache.json";

/// Unity Hub's editors folder relative to an install root.
pub const HUB_EDITOR_SUBPATH: &str = "Unity/Hub/Editor";

/// Executable path relative to an editor version directory.
#[cfg(windows)]
pub const EXECUTABLE_SUBPATH: &str = "Editor/Unity.exe";
#[cfg(target_os = "macos")]
pub const EXECUTABLE_SUBPATH: &str = "Unity.app/Contents/MacOS/Unity";
#[cfg(not(any(windows, target_os = "macos")))]
pub const EXECUTABLE_SUBPATH: &str = "Editor/Unity";

fn version_dir_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+[abfp]\d+$").expect("valid version dir pattern"))
}

/// Finds the Unity executable for a version.
pub trait EditorLocator {
    /// Absolute path of the executable for `unity_version` under `editors_root`.
    fn locate(&self, editors_root: &Path, unity_version: &str) -> Result<PathBuf>;
}

/// Locator for the standard Unity Hub layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubLayoutLocator;

impl EditorLocator for HubLayoutLocator {
    fn locate(&self, editors_root: &Path, unity_version: &str) -> Result<PathBuf> {
        if !editors_root.is_dir() {
            return Err(BuildError::Config(format!(
                "Unity editors directory not found: {}",
                editors_root.display()
            )));
        }

        let exe = editors_root.join(unity_version).join(EXECUTABLE_SUBPATH);
        if !exe.is_file() {
            let mut message = format!("Unity executable not found: {}", exe.display());
            let available = installed_versions(editors_root);
            if !available.is_empty() {
                message.push_str(&format!("\nAvailable versions: {}", available.join(", ")));
            }
            return Err(BuildError::BuildProcess(message));
        }

        Ok(std::path::absolute(&exe)?)
    }
}

/// Sorted names of the directories directly under `editors_root`.
pub fn installed_versions(editors_root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(editors_root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Whether `path` holds at least one versioned editor with an executable.
pub fn is_valid_editors_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    read_dirs(path).into_iter().any(|child| {
        child
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| version_dir_regex().is_match(name))
            && child.join(EXECUTABLE_SUBPATH).is_file()
    })
}

/// Search an install root (a drive or directory) for a Unity Hub editors folder.
///
/// Checks the usual install locations first, then looks two directory levels
/// deep. Unreadable directories are skipped.
pub fn search_for_editors(root: &Path) -> Option<PathBuf> {
    let candidates = [
        root.join("Program Files").join(HUB_EDITOR_SUBPATH),
        root.join("Program Files (x86)").join(HUB_EDITOR_SUBPATH),
        root.join(HUB_EDITOR_SUBPATH),
    ];
    for candidate in candidates {
        debug!(candidate = %candidate.display(), "Checking editors location");
        if is_valid_editors_dir(&candidate) {
            return Some(candidate);
        }
    }

    info!(root = %root.display(), "Scanning top-level directories for Unity editors");
    for top in read_dirs(root) {
        let deep = top.join(HUB_EDITOR_SUBPATH);
        if is_valid_editors_dir(&deep) {
            return Some(deep);
        }
        for sub in read_dirs(&top) {
            let deeper = sub.join(HUB_EDITOR_SUBPATH);
            if is_valid_editors_dir(&deeper) {
                return Some(deeper);
            }
        }
    }

    None
}

/// Search root for user input: a bare drive letter on Windows, otherwise a path.
pub fn search_root_from_input(input: &str) -> PathBuf {
    let trimmed = input.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if cfg!(windows) && letter.is_ascii_alphabetic() => {
            PathBuf::from(format!("{}:/", letter.to_ascii_uppercase()))
        }
        _ => PathBuf::from(trimmed),
    }
}

fn read_dirs(path: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default()
}

/// Contents of the editors cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorsCache {
    pub unity_editors_path: PathBuf,
    pub found_at: DateTime<Utc>,
}

/// Cached editors root, if the cache exists and still points at valid editors.
pub fn load_editors_cache(cache_path: &Path) -> Option<PathBuf> {
    let raw = std::fs::read_to_string(cache_path).ok()?;
    let cache: EditorsCache = serde_json::from_str(&raw).ok()?;
    if is_valid_editors_dir(&cache.unity_editors_path) {
        Some(cache.unity_editors_path)
    } else {
        debug!(cache = %cache_path.display(), "Ignoring stale editors cache");
        None
    }
}

/// Persist a discovered editors root. Write failures are not fatal.
pub fn save_editors_cache(cache_path: &Path, editors_path: &Path) {
    let cache = EditorsCache {
        unity_editors_path: editors_path.to_path_buf(),
        found_at: Utc::now(),
    };
    let written = serde_json::to_string_pretty(&cache)
        .map_err(|e| e.to_string())
        .and_then(|body| std::fs::write(cache_path, body).map_err(|e| e.to_string()));
    if let Err(e) = written {
        debug!(error = %e, cache = %cache_path.display(), "Failed to write editors cache");
    }
}
