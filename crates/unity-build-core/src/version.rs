//! Artifact version detection and increment.
//!
//! Artifacts are named `{prefix}_v{major}.{minor}.{patch}.{ext}`. The next
//! version is derived from the highest one already present in the output
//! folder, or starts at [`SemanticVersion::BASELINE`] when there is none.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{BuildError, Result};

/// Semantic version, ordered lexicographically by (major, minor, patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    /// Version used when no prior artifact exists.
    pub const BASELINE: SemanticVersion = SemanticVersion::new(0, 1, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Next version for the given increment kind, or `None` if the bumped
    /// component would overflow.
    pub fn increment(self, kind: IncrementKind) -> Option<Self> {
        let next = match kind {
            IncrementKind::Patch => Self::new(self.major, self.minor, self.patch.checked_add(1)?),
            IncrementKind::Minor => Self::new(self.major, self.minor.checked_add(1)?, 0),
            IncrementKind::Major => Self::new(self.major.checked_add(1)?, 0, 0),
        };
        Some(next)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BuildError::VersionParse {
            input: s.to_string(),
        };

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut fields = [0u64; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(fields[0], fields[1], fields[2]))
    }
}

/// Which version component to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementKind {
    #[default]
    Patch,
    Minor,
    Major,
}

impl IncrementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncrementKind::Patch => "patch",
            IncrementKind::Minor => "minor",
            IncrementKind::Major => "major",
        }
    }
}

impl fmt::Display for IncrementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncrementKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "patch" => Ok(IncrementKind::Patch),
            "minor" => Ok(IncrementKind::Minor),
            "major" => Ok(IncrementKind::Major),
            other => Err(BuildError::Config(format!(
                "invalid increment type: {other}, must be one of: major, minor, patch"
            ))),
        }
    }
}

/// Matches artifact filenames for one prefix.
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    regex: Regex,
}

impl ArtifactPattern {
    pub fn new(prefix: &str) -> Self {
        let pattern = format!(
            r"^{}_v(\d+)\.(\d+)\.(\d+)\.[A-Za-z0-9]+$",
            regex::escape(prefix)
        );
        let regex = Regex::new(&pattern).expect("escaped artifact prefix is a valid pattern");
        Self { regex }
    }

    /// Parse a filename into its version, or `None` if it is not an artifact.
    pub fn parse(&self, filename: &str) -> Option<SemanticVersion> {
        let caps = self.regex.captures(filename)?;
        let major = caps[1].parse().ok()?;
        let minor = caps[2].parse().ok()?;
        let patch = caps[3].parse().ok()?;
        Some(SemanticVersion::new(major, minor, patch))
    }
}

/// Build the artifact filename for a version.
pub fn artifact_filename(prefix: &str, version: SemanticVersion, extension: &str) -> String {
    format!("{prefix}_v{version}.{extension}")
}

/// Scan `dir` for artifacts and return the highest version found.
pub fn detect_latest_version(dir: &Path, prefix: &str) -> Result<Option<SemanticVersion>> {
    if !dir.is_dir() {
        return Err(BuildError::Config(format!(
            "output folder not found: {}",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        BuildError::Config(format!("cannot read output folder {}: {e}", dir.display()))
    })?;

    let pattern = ArtifactPattern::new(prefix);
    let mut latest: Option<SemanticVersion> = None;

    for entry in entries {
        let entry = entry.map_err(|e| {
            BuildError::Config(format!("cannot read output folder {}: {e}", dir.display()))
        })?;
        let name = entry.file_name();
        let Some(version) = name.to_str().and_then(|n| pattern.parse(n)) else {
            continue;
        };
        debug!(file = ?name, %version, "Found artifact");
        latest = latest.max(Some(version));
    }

    Ok(latest)
}

/// Determine the version to build.
///
/// An explicit version wins without scanning. Otherwise the highest existing
/// artifact version is incremented; with no artifacts the baseline is used
/// as-is regardless of `increment`.
pub fn resolve_version(
    dir: &Path,
    prefix: &str,
    increment: IncrementKind,
    explicit: Option<SemanticVersion>,
) -> Result<SemanticVersion> {
    if let Some(version) = explicit {
        info!(%version, "Using explicit version");
        return Ok(version);
    }

    match detect_latest_version(dir, prefix)? {
        None => {
            info!(
                version = %SemanticVersion::BASELINE,
                "No existing artifacts found, starting at baseline"
            );
            Ok(SemanticVersion::BASELINE)
        }
        Some(latest) => {
            let next = latest.increment(increment).ok_or_else(|| {
                BuildError::Config(format!(
                    "cannot apply {increment} increment to latest artifact version {latest}"
                ))
            })?;
            info!(%latest, %next, %increment, "Incrementing version");
            Ok(next)
        }
    }
}
