//! Case limiter
//!
//! Restricts a specification to its first N test cases and stages the
//! restricted copy in a temporary file for one executable invocation.

use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tempfile::TempPath;

use crate::error::HarnessError;
use crate::spec::Specification;

/// Return a copy of `spec` restricted to its first `max_cases` test cases,
/// or `None` when the specification already fits.
///
/// Expected results are restricted to the retained ids; a retained id with
/// no expected result becomes optional (`null`).
pub fn truncate(spec: &Specification, max_cases: usize) -> Option<Specification> {
    if spec.testcases.len() <= max_cases {
        return None;
    }

    let mut testcases = spec.testcases.clone();
    testcases.truncate(max_cases);

    let expected_results: Map<String, Value> = testcases
        .ids()
        .map(|id| {
            let value = spec.expected_results.get(id).cloned().unwrap_or(Value::Null);
            (id.to_string(), value)
        })
        .collect();

    Some(Specification {
        title: spec.title.clone(),
        description: spec.description.clone(),
        testcases,
        expected_results,
        required_sidecars: spec.required_sidecars.clone(),
        extra: spec.extra.clone(),
    })
}

/// A specification written to a temporary file.
///
/// The file is removed by [`StagedSpec::close`] or on drop, whichever
/// comes first. Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct StagedSpec {
    path: Option<TempPath>,
}

impl StagedSpec {
    /// Write `spec` to a fresh `.json` file in `dir` (or the system temp dir).
    pub fn create(spec: &Specification, dir: Option<&Path>) -> Result<Self, HarnessError> {
        let data = spec.to_json()?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("emx-conformance-").suffix(".json");
        let mut file = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .map_err(|e| HarnessError::staging(e.to_string()).with_path(dir))?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(|e| HarnessError::staging(e.to_string()))?;

        let written = file.write_all(data.as_bytes()).and_then(|_| file.flush());
        if let Err(e) = written {
            return Err(HarnessError::staging(e.to_string()).with_path(file.path()));
        }

        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete the staged file now.
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.to_path_buf();
            if let Err(e) = path.close() {
                tracing::warn!(path = %shown.display(), error = %e, "failed to remove staged specification");
            }
        }
    }
}

impl Drop for StagedSpec {
    fn drop(&mut self) {
        self.remove();
    }
}
