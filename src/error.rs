//! Harness errors

use std::fmt;
use std::path::{Path, PathBuf};

/// The kind of harness error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required external resource is unusable (blacklist, test root).
    /// The only fatal kind: the run aborts before any execution.
    Config,
    /// IO error while reading a specification
    Io,
    /// Specification file is not valid JSON or has the wrong shape
    MalformedSpec,
    /// The executable-under-test could not be spawned or waited on
    Spawn,
    /// A truncated specification could not be written
    Staging,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::Config => "configuration error",
            ErrorKind::Io => "io error",
            ErrorKind::MalformedSpec => "malformed specification",
            ErrorKind::Spawn => "failed to run executable",
            ErrorKind::Staging => "failed to stage specification",
        }
    }
}

/// A harness error with optional file context
#[derive(Debug)]
pub struct HarnessError {
    pub kind: ErrorKind,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl HarnessError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedSpec, msg)
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Spawn, msg)
    }

    pub fn staging(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Staging, msg)
    }

    /// Fatal errors abort the run; everything else is recorded per file.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Config
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: ", path.display())?;
        }
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for HarnessError {}

impl From<std::io::Error> for HarnessError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::MalformedSpec, e.to_string())
    }
}
