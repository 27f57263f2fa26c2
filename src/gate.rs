//! Eligibility gate
//!
//! Discovers specification files under a test root and decides which of
//! them take part in a run: blacklist membership, substring filters and
//! declared sidecar requirements.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::error::HarnessError;
use crate::spec::Specification;

/// Recursively find candidate files under `root`, sorted by path.
///
/// An empty `extensions` list accepts every file.
pub fn discover(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, HarnessError> {
    if !root.is_dir() {
        return Err(HarnessError::config(format!(
            "test directory not found: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    scan_dir(root, extensions, &mut files)
        .map_err(|e| HarnessError::config(format!("failed to scan {}: {}", root.display(), e)))?;
    files.sort();
    Ok(files)
}

fn scan_dir(dir: &Path, extensions: &[String], files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, extensions, files)?;
        } else if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
}

/// Path of `file` relative to `root`, joined with `/` on every platform.
pub fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(entry: &str) -> String {
    entry.trim().replace('\\', "/")
}

/// Relative paths excluded from the run.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashSet<String>,
}

impl Blacklist {
    /// Load a blacklist file: one relative path per line, blank lines ignored.
    ///
    /// An unreadable file is a configuration error.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("cannot read blacklist: {}", e)).with_path(path)
        })?;
        Ok(Self::parse(&data))
    }

    pub fn parse(data: &str) -> Self {
        let entries = data
            .lines()
            .map(normalize)
            .filter(|line| !line.is_empty())
            .collect();
        Self { entries }
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.entries.contains(relative)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Case-sensitive substring filters over relative paths.
#[derive(Debug, Clone, Default)]
pub struct Filters(Vec<String>);

impl Filters {
    pub fn new(filters: Vec<String>) -> Self {
        Self(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// No filters means everything matches.
    pub fn matches(&self, relative: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|f| relative.contains(f.as_str()))
    }
}

/// Why a file was left out of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    Blacklisted,
    Filtered,
    MissingSidecars(Vec<String>),
}

/// The combined eligibility rules
#[derive(Debug, Clone, Default)]
pub struct Gate {
    pub blacklist: Blacklist,
    pub filters: Filters,
    pub sidecars: BTreeSet<String>,
}

impl Gate {
    /// Path-based checks, applied before the file is loaded.
    pub fn check_path(&self, relative: &str) -> Result<(), Skip> {
        if self.blacklist.contains(relative) {
            return Err(Skip::Blacklisted);
        }
        if !self.filters.matches(relative) {
            return Err(Skip::Filtered);
        }
        Ok(())
    }

    /// Capability check, applied once the specification is loaded.
    pub fn check_spec(&self, spec: &Specification) -> Result<(), Skip> {
        if spec.is_supported_by(&self.sidecars) {
            Ok(())
        } else {
            Err(Skip::MissingSidecars(
                spec.missing_sidecars(&self.sidecars)
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ))
        }
    }
}
