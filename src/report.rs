//! Report aggregation and rendering

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::matcher::{Classification, HarnessFailure};

/// Number of failed/missing ids shown per row
pub const PREVIEW_LEN: usize = 4;

/// Exit status when every file passed
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when any id failed or was missing, or the output was malformed
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for configuration errors, before any execution
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Result of one specification file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path relative to the test root, `/`-separated
    pub path: String,
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub missing: Vec<String>,
    pub harness_failures: Vec<HarnessFailure>,
    /// Cases actually sent, when the file was truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_to: Option<usize>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl FileReport {
    pub fn new(path: impl Into<String>, classification: Classification, elapsed: Duration) -> Self {
        Self {
            path: path.into(),
            successful: classification.successful,
            failed: classification.failed,
            missing: classification.missing,
            harness_failures: classification.harness_failures,
            truncated_to: None,
            elapsed,
        }
    }

    pub fn passed(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty() && self.harness_failures.is_empty()
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.successful.len().to_string(),
            self.failed.len().to_string(),
            self.missing.len().to_string(),
            self.harness_failures.len().to_string(),
            format_secs(self.elapsed),
            preview(&self.failed),
            preview(&self.missing),
        ]
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

const HEADER: [&str; 8] = [
    "Testfile",
    "Successful",
    "Failed",
    "Missing",
    "Harness Errors",
    "Time (s)",
    "Failed (Tasks)",
    "Missing (Tasks)",
];

impl RunReport {
    pub fn push(&mut self, file: FileReport) {
        self.files.push(file);
    }

    pub fn harness_failure_count(&self) -> usize {
        self.files.iter().map(|f| f.harness_failures.len()).sum()
    }

    /// No file has failed or missing ids and no harness failure occurred.
    pub fn all_passed(&self) -> bool {
        self.files.iter().all(FileReport::passed)
    }

    /// Process exit status for this report.
    pub fn exit_code(&self, allow_failures: bool) -> u8 {
        if allow_failures || self.all_passed() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    pub fn summary(&self) -> String {
        let count = |f: fn(&FileReport) -> usize| self.files.iter().map(f).sum::<usize>();
        format!(
            "{} file(s): {} successful, {} failed, {} missing, {} harness error(s) ({:.3}s)",
            self.files.len(),
            count(|f| f.successful.len()),
            count(|f| f.failed.len()),
            count(|f| f.missing.len()),
            self.harness_failure_count(),
            self.duration.as_secs_f64(),
        )
    }

    /// Column-aligned table; each column is as wide as its widest cell.
    pub fn render_table(&self) -> String {
        let rows: Vec<Vec<String>> = self.files.iter().map(FileReport::row).collect();
        let mut widths: Vec<usize> = HEADER.iter().map(|h| h.len()).collect();
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
        write_row(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(&mut out, &rule, &widths);
        for row in &rows {
            write_row(&mut out, row, &widths);
        }
        out
    }

    /// Comma-separated rows, one per file, with the same columns as the table.
    pub fn render_csv(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", HEADER.join(","));
        for file in &self.files {
            let cells: Vec<String> = file.row().iter().map(|c| csv_cell(c)).collect();
            let _ = writeln!(out, "{}", cells.join(","));
        }
        out
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

fn csv_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Seconds with three decimals
pub fn format_secs(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// First [`PREVIEW_LEN`] ids, with an ellipsis when there are more.
pub fn preview(ids: &[String]) -> String {
    let mut s = ids
        .iter()
        .take(PREVIEW_LEN)
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if ids.len() > PREVIEW_LEN {
        s.push_str(" ...");
    }
    s
}
