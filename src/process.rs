//! Process runner — invoke the executable-under-test

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::HarnessError;

/// Captured output of one executable invocation
#[derive(Debug)]
pub struct Execution {
    /// Reply channel: newline-delimited JSON records
    pub stdout: String,
    /// Diagnostics only, never parsed
    pub stderr: String,
    /// Recorded for diagnostics; not a pass/fail signal
    pub status: ExitStatus,
    pub elapsed: Duration,
}

/// Run `executable <spec_path>` and wait for it to exit.
///
/// Both output streams are drained concurrently until the child exits,
/// so a chatty stderr cannot stall the reply channel. There is no timeout.
pub fn run_executable(executable: &Path, spec_path: &Path) -> Result<Execution, HarnessError> {
    let mut cmd = Command::new(executable);
    cmd.arg(spec_path);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let start = Instant::now();
    let child = cmd.spawn().map_err(|e| {
        HarnessError::spawn(format!("'{}': {}", executable.display(), e))
    })?;
    let output = child.wait_with_output().map_err(|e| {
        HarnessError::spawn(format!("waiting for '{}': {}", executable.display(), e))
    })?;
    let elapsed = start.elapsed();

    Ok(Execution {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status,
        elapsed,
    })
}
