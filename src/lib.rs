//! emx-conformance: a conformance harness for JSON-speaking executables
//!
//! The harness drives an executable-under-test through declarative
//! specification files and reports, per file, which test cases were
//! answered correctly, answered wrongly, or not answered at all.
//!
//! # Pipeline
//!
//! Each specification file flows through these stages, one file at a time:
//!
//! | Stage | Module | |
//! |-------|--------|-|
//! | Load | [`spec`] | parse the JSON specification, keep test case order |
//! | Gate | [`gate`] | blacklist, substring filters, required sidecars |
//! | Limit | [`limiter`] | keep the first N cases, stage a temporary copy |
//! | Run | [`process`] | `<executable> <spec-path>`, capture stdout/stderr |
//! | Match | [`matcher`] | reconcile `{"id", "reply"}` lines with expected results |
//! | Report | [`report`] | aligned table / CSV / JSON, exit status |
//!
//! # Executable contract
//!
//! The executable receives the specification path as its only argument and
//! writes one JSON object per line to stdout:
//!
//! ```text
//! {"id": "t1", "reply": {"x": 1}}
//! ```
//!
//! Ids whose expected result is `null` may be omitted. Diagnostics belong
//! on stderr, which is captured but never parsed. The exit code is ignored.

pub mod gate;
pub mod limiter;
pub mod matcher;
pub mod process;
pub mod report;
pub mod spec;
mod error;
mod runner;

pub use error::{ErrorKind, HarnessError};
pub use matcher::{classify, json_eq, Classification, FailureKind, HarnessFailure};
pub use report::{FileReport, RunReport, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
pub use runner::{Candidate, RunConfig, TestRunner, TestRunnerBuilder};
pub use spec::{Specification, TestCase, TestCases};
