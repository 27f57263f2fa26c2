//! Result matcher
//!
//! Reconciles the executable's reply stream against a specification's
//! expected results. Every expected id ends up in exactly one of
//! `successful`, `failed` or `missing`; output lines that cannot be
//! attributed to an expected id are recorded as harness failures instead.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use similar::TextDiff;

/// Why an output line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Line is not valid JSON
    MalformedJson,
    /// Not an object with a string `id` and a `reply`
    InvalidFormat,
    /// `id` is unknown or was already answered
    UnexpectedId,
    /// The executable could not be run at all
    Execution,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::MalformedJson => "malformed json",
            FailureKind::InvalidFormat => "invalid format",
            FailureKind::UnexpectedId => "unexpected id",
            FailureKind::Execution => "execution failed",
        };
        f.write_str(s)
    }
}

/// A failure attributable to the executable's output rather than to a
/// reply mismatch on a known id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessFailure {
    pub kind: FailureKind,
    /// 1-based stdout line, when the failure comes from a line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub detail: String,
}

impl fmt::Display for HarnessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// A reply that differs from its expected value
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub id: String,
    pub expected: Value,
    pub actual: Value,
}

impl Mismatch {
    /// Unified diff of the pretty-printed expected and actual replies.
    pub fn diff(&self) -> String {
        let expected = pretty(&self.expected);
        let actual = pretty(&self.actual);
        TextDiff::from_lines(&expected, &actual)
            .unified_diff()
            .header("expected", "actual")
            .to_string()
    }
}

fn pretty(value: &Value) -> String {
    let mut s = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    s.push('\n');
    s
}

/// Outcome of matching one file
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub missing: Vec<String>,
    pub harness_failures: Vec<HarnessFailure>,
    pub mismatches: Vec<Mismatch>,
}

impl Classification {
    /// Number of ids accounted for
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.missing.len()
    }

    pub fn passed(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty() && self.harness_failures.is_empty()
    }

    fn reject(&mut self, kind: FailureKind, line: usize, detail: impl Into<String>) {
        self.harness_failures.push(HarnessFailure {
            kind,
            line: Some(line),
            detail: detail.into(),
        });
    }
}

/// Classify every expected id against the reply stream in `stdout`.
///
/// `expected` is consumed: matched ids are removed as replies arrive, so a
/// second reply for the same id is rejected as unexpected.
pub fn classify(mut expected: Map<String, Value>, stdout: &str) -> Classification {
    let mut result = Classification::default();

    for (idx, raw) in stdout.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                result.reject(FailureKind::MalformedJson, line_no, e.to_string());
                continue;
            }
        };

        let (id, reply) = match split_record(record) {
            Some(pair) => pair,
            None => {
                result.reject(
                    FailureKind::InvalidFormat,
                    line_no,
                    "expected an object with 'id' and 'reply'",
                );
                continue;
            }
        };

        let want = match expected.remove(&id) {
            Some(want) => want,
            None => {
                result.reject(FailureKind::UnexpectedId, line_no, format!("'{}'", id));
                continue;
            }
        };

        if json_eq(&reply, &want) {
            result.successful.push(id);
        } else {
            result.mismatches.push(Mismatch {
                id: id.clone(),
                expected: want,
                actual: reply,
            });
            result.failed.push(id);
        }
    }

    for (id, want) in expected {
        if want.is_null() {
            result.successful.push(id);
        } else {
            result.missing.push(id);
        }
    }

    result
}

fn split_record(record: Value) -> Option<(String, Value)> {
    let mut obj = match record {
        Value::Object(obj) => obj,
        _ => return None,
    };
    let id = match obj.get("id") {
        Some(Value::String(id)) => id.clone(),
        _ => return None,
    };
    let reply = obj.remove("reply")?;
    Some((id, reply))
}

/// Deep structural equality of JSON values.
///
/// Objects compare by key/value regardless of key order, arrays element by
/// element. Numbers compare by value; integers exactly, anything else as
/// `f64`. Values of different kinds are never equal.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                }
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |other| json_eq(v, other)))
        }
        _ => false,
    }
}
