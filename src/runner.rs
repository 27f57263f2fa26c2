//! Test runner
//!
//! Orchestrates a conformance run: discovers specification files under the
//! test root, applies the eligibility gate, optionally stages a truncated
//! copy, runs the executable-under-test once per file, classifies its
//! replies and collects everything into a [`RunReport`].
//!
//! Files are processed strictly one at a time.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::HarnessError;
use crate::gate::{self, Blacklist, Filters, Gate, Skip};
use crate::limiter::{self, StagedSpec};
use crate::matcher::{self, FailureKind, HarnessFailure};
use crate::process::{self, Execution};
use crate::report::{FileReport, RunReport};
use crate::spec::Specification;

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The executable-under-test
    pub executable: PathBuf,
    /// Directory containing specification files
    pub dir: PathBuf,
    /// Substring filters on relative paths; empty runs everything
    pub filters: Vec<String>,
    /// Sidecars available to this run
    pub sidecars: BTreeSet<String>,
    /// File listing relative paths to skip
    pub blacklist: Option<PathBuf>,
    /// Maximum number of test cases sent per file
    pub max_cases: Option<usize>,
    /// File name suffixes to scan; empty scans every file
    pub extensions: Vec<String>,
    /// Where truncated specifications are staged (default: system temp)
    pub staging_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            dir: PathBuf::from("tests"),
            filters: Vec::new(),
            sidecars: BTreeSet::new(),
            blacklist: None,
            max_cases: None,
            extensions: Vec::new(),
            staging_dir: None,
        }
    }
}

/// An eligible, loaded specification file
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    /// Path relative to the test root, `/`-separated
    pub relative: String,
    pub spec: Specification,
}

/// The test runner
pub struct TestRunner {
    config: RunConfig,
}

impl TestRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Build the eligibility gate. Fails if the blacklist cannot be read.
    fn gate(&self) -> Result<Gate, HarnessError> {
        let blacklist = match self.config.blacklist {
            Some(ref path) => Blacklist::load(path)?,
            None => Blacklist::default(),
        };
        Ok(Gate {
            blacklist,
            filters: Filters::new(self.config.filters.clone()),
            sidecars: self.config.sidecars.clone(),
        })
    }

    /// Discover, gate and load the specification files of this run.
    ///
    /// Only configuration errors are returned; unusable files are logged
    /// and left out.
    pub fn select(&self) -> Result<Vec<Candidate>, HarnessError> {
        let gate = self.gate()?;
        let root = &self.config.dir;
        let files = gate::discover(root, &self.config.extensions)?;

        if !gate.filters.is_empty()
            && !files.iter().any(|f| gate.filters.matches(&gate::relative_path(root, f)))
        {
            warn!(filters = ?self.config.filters, "no specification matches the given filters; nothing to run");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for path in files {
            let relative = gate::relative_path(root, &path);

            match gate.check_path(&relative) {
                Ok(()) => {}
                Err(Skip::Blacklisted) => {
                    info!(file = %relative, "skipping blacklisted specification");
                    continue;
                }
                Err(_) => continue,
            }

            let spec = match Specification::load(&path) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(file = %relative, error = %e, "skipping unreadable specification");
                    continue;
                }
            };

            if let Err(Skip::MissingSidecars(missing)) = gate.check_spec(&spec) {
                debug!(file = %relative, missing = ?missing, "skipping specification: sidecars unavailable");
                continue;
            }

            candidates.push(Candidate {
                path,
                relative,
                spec,
            });
        }
        Ok(candidates)
    }

    /// Count the files that would be run
    pub fn count_tests(&self) -> Result<usize, HarnessError> {
        Ok(self.select()?.len())
    }

    /// Run every eligible specification file
    pub fn run_all(&self) -> Result<RunReport, HarnessError> {
        let start = Instant::now();
        let candidates = self.select()?;

        let mut report = RunReport::default();
        for candidate in candidates {
            report.push(self.run_one(candidate));
        }
        report.duration = start.elapsed();
        Ok(report)
    }

    /// Run a single specification file
    pub fn run_one(&self, candidate: Candidate) -> FileReport {
        let Candidate {
            path,
            relative,
            spec,
        } = candidate;

        let restricted = self
            .config
            .max_cases
            .and_then(|n| limiter::truncate(&spec, n));
        let truncated_to = restricted.as_ref().map(|s| s.testcases.len());

        match truncated_to {
            Some(n) => info!(file = %relative, cases = n, total = spec.testcases.len(), "running (truncated)"),
            None => info!(file = %relative, cases = spec.testcases.len(), "running"),
        }

        let outcome = match restricted {
            Some(ref restricted) => self.run_staged(restricted),
            None => process::run_executable(&self.config.executable, &path),
        };
        let expected = match restricted {
            Some(restricted) => restricted.expected_results,
            None => spec.expected_results,
        };

        let (classification, elapsed) = match outcome {
            Ok(exec) => {
                log_execution(&relative, &exec);
                (matcher::classify(expected, &exec.stdout), exec.elapsed)
            }
            Err(e) => {
                warn!(file = %relative, error = %e, "executable did not run");
                let mut classification = matcher::classify(expected, "");
                classification.harness_failures.push(HarnessFailure {
                    kind: FailureKind::Execution,
                    line: None,
                    detail: e.to_string(),
                });
                (classification, Duration::ZERO)
            }
        };

        for mismatch in &classification.mismatches {
            debug!(file = %relative, id = %mismatch.id, "reply mismatch\n{}", mismatch.diff());
        }
        for failure in &classification.harness_failures {
            warn!(file = %relative, "{}", failure);
        }

        let mut report = FileReport::new(relative, classification, elapsed);
        report.truncated_to = truncated_to;
        info!(
            file = %report.path,
            successful = report.successful.len(),
            failed = report.failed.len(),
            missing = report.missing.len(),
            "finished"
        );
        report
    }

    /// Stage `spec`, run the executable on the staged copy, then remove it.
    fn run_staged(&self, spec: &Specification) -> Result<Execution, HarnessError> {
        let staged = StagedSpec::create(spec, self.config.staging_dir.as_deref())?;
        let result = process::run_executable(&self.config.executable, staged.path());
        staged.close();
        result
    }
}

fn log_execution(relative: &str, exec: &Execution) {
    debug!(file = %relative, status = %exec.status, elapsed = ?exec.elapsed, "executable exited");
    let stderr = exec.stderr.trim_end();
    if !stderr.is_empty() {
        debug!(file = %relative, "executable stderr:\n{}", stderr);
    }
}

/// Builder API for convenient test runner construction
pub struct TestRunnerBuilder {
    config: RunConfig,
}

impl TestRunnerBuilder {
    /// Start building a runner for the given executable
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfig {
                executable: executable.into(),
                ..Default::default()
            },
        }
    }

    /// Set the test root directory
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dir = dir.into();
        self
    }

    /// Add a substring filter
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filters.push(filter.into());
        self
    }

    /// Declare an available sidecar
    pub fn sidecar(mut self, sidecar: impl Into<String>) -> Self {
        self.config.sidecars.insert(sidecar.into());
        self
    }

    pub fn blacklist(mut self, path: impl AsRef<Path>) -> Self {
        self.config.blacklist = Some(path.as_ref().to_path_buf());
        self
    }

    /// Cap the number of test cases per file
    pub fn max_cases(mut self, n: usize) -> Self {
        self.config.max_cases = Some(n);
        self
    }

    /// Set file extensions to scan
    pub fn extensions(mut self, exts: Vec<String>) -> Self {
        self.config.extensions = exts;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> TestRunner {
        TestRunner::new(self.config)
    }

    /// Build and run all tests
    pub fn run(self) -> Result<RunReport, HarnessError> {
        self.build().run_all()
    }
}
