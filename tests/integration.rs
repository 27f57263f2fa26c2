//! Integration tests: drive real child processes through the harness.
//!
//! Each test writes a small `/bin/sh` script that plays the
//! executable-under-test and a test root with specification files.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use emx_conformance::{FailureKind, Specification, TestRunnerBuilder};

struct Fixture {
    tmp: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tests")).unwrap();
        Self { tmp }
    }

    fn root(&self) -> PathBuf {
        self.tmp.path().join("tests")
    }

    fn spec(&self, rel: &str, data: &str) {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    /// An executable that prints `lines` to stdout, whatever the input.
    fn exe(&self, lines: &[&str]) -> PathBuf {
        let mut body = String::new();
        for line in lines {
            body.push_str(&format!("printf '%s\\n' '{}'\n", line));
        }
        self.script("exe.sh", &body)
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }
}

fn cli(fixture: &Fixture, exe: &Path, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_emx-conformance"))
        .arg(exe)
        .arg("--tests")
        .arg(fixture.root())
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn scenario_matching_reply_succeeds() {
    let f = Fixture::new();
    f.spec(
        "a.json",
        r#"{"testcases": {"t1": {"action": "x", "arguments": {}}}, "expectedResults": {"t1": {"x": 1}}}"#,
    );
    let exe = f.exe(&[r#"{"id":"t1","reply":{"x":1}}"#]);

    let report = TestRunnerBuilder::new(&exe).dir(f.root()).run().unwrap();
    let file = &report.files[0];
    assert_eq!(file.successful, vec!["t1"]);
    assert!(file.failed.is_empty());
    assert!(file.missing.is_empty());
    assert!(report.all_passed());
}

#[test]
fn scenario_optional_expectation_without_reply_succeeds() {
    let f = Fixture::new();
    f.spec(
        "b.json",
        r#"{"testcases": {"t2": {"action": "x"}}, "expectedResults": {"t2": null}}"#,
    );
    let exe = f.exe(&[]);

    let report = TestRunnerBuilder::new(&exe).dir(f.root()).run().unwrap();
    assert_eq!(report.files[0].successful, vec!["t2"]);
    assert!(report.all_passed());
}

#[test]
fn scenario_wrong_reply_fails() {
    let f = Fixture::new();
    f.spec(
        "c.json",
        r#"{"testcases": {"t3": {"action": "x"}}, "expectedResults": {"t3": {"y": 2}}}"#,
    );
    let exe = f.exe(&[r#"{"id":"t3","reply":{"y":3}}"#]);

    let report = TestRunnerBuilder::new(&exe).dir(f.root()).run().unwrap();
    assert_eq!(report.files[0].failed, vec!["t3"]);
    assert!(!report.all_passed());
}

#[test]
fn scenario_unexpected_id_fails_run() {
    let f = Fixture::new();
    f.spec(
        "d.json",
        r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": null}}"#,
    );
    let exe = f.exe(&[r#"{"id":"t9","reply":1}"#]);

    let report = TestRunnerBuilder::new(&exe).dir(f.root()).run().unwrap();
    let file = &report.files[0];
    assert_eq!(file.successful, vec!["t1"]);
    assert_eq!(file.harness_failures.len(), 1);
    assert_eq!(file.harness_failures[0].kind, FailureKind::UnexpectedId);
    assert!(!report.all_passed());
    assert_eq!(report.exit_code(false), 1);
}

#[test]
fn exit_code_is_not_a_signal() {
    let f = Fixture::new();
    f.spec(
        "a.json",
        r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": 1}}"#,
    );
    let exe = f.script(
        "exe.sh",
        "echo '{\"id\":\"t1\",\"reply\":1}'\necho 'noise on stderr' >&2\nexit 7\n",
    );

    let report = TestRunnerBuilder::new(&exe).dir(f.root()).run().unwrap();
    assert!(report.all_passed());
}

#[test]
fn truncation_sends_first_cases_and_removes_staged_file() {
    let f = Fixture::new();
    f.spec(
        "big.json",
        r#"{
            "title": "big",
            "testcases": {
                "z": {"action": "x"},
                "a": {"action": "x"},
                "m": {"action": "x"}
            },
            "expectedResults": {"z": 1, "a": 2, "m": 3}
        }"#,
    );
    let seen = f.path("seen.json");
    let argv = f.path("argv.txt");
    let exe = f.script(
        "exe.sh",
        &format!(
            "cp \"$1\" '{}'\necho \"$1\" > '{}'\necho '{{\"id\":\"z\",\"reply\":1}}'\necho '{{\"id\":\"a\",\"reply\":2}}'\n",
            seen.display(),
            argv.display()
        ),
    );
    let staging = f.path("staging");

    let report = TestRunnerBuilder::new(&exe)
        .dir(f.root())
        .max_cases(2)
        .staging_dir(&staging)
        .run()
        .unwrap();

    let sent = Specification::load(&seen).unwrap();
    let ids: Vec<&str> = sent.testcases.ids().collect();
    assert_eq!(ids, vec!["z", "a"]);
    assert_eq!(sent.expected_results.len(), 2);

    let file = &report.files[0];
    assert_eq!(file.truncated_to, Some(2));
    assert_eq!(file.successful, vec!["z", "a"]);
    assert!(file.missing.is_empty());
    assert!(report.all_passed());

    let staged = PathBuf::from(std::fs::read_to_string(&argv).unwrap().trim());
    assert!(staged.starts_with(&staging));
    assert!(!staged.exists());
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
}

#[test]
fn small_files_are_not_staged() {
    let f = Fixture::new();
    f.spec(
        "small.json",
        r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": 1}}"#,
    );
    let argv = f.path("argv.txt");
    let exe = f.script("exe.sh", &format!("echo \"$1\" > '{}'\n", argv.display()));

    let report = TestRunnerBuilder::new(&exe)
        .dir(f.root())
        .max_cases(5)
        .run()
        .unwrap();
    assert_eq!(report.files[0].missing, vec!["t1"]);
    assert_eq!(report.files[0].truncated_to, None);
    let passed = PathBuf::from(std::fs::read_to_string(&argv).unwrap().trim());
    assert_eq!(passed, f.root().join("small.json"));
}

#[test]
fn gate_skips_are_not_reported() {
    let f = Fixture::new();
    let ok = r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": null}}"#;
    f.spec("keep/a.json", ok);
    f.spec("keep/blacklisted.json", ok);
    f.spec("keep/malformed.json", "{\"testcases\": ");
    f.spec(
        "keep/sidecar.json",
        r#"{"testcases": {}, "expectedResults": {"s": 1}, "requiredSidecars": ["oracle"]}"#,
    );
    f.spec("other/b.json", ok);
    std::fs::write(f.path("blacklist.txt"), "\n  keep/blacklisted.json  \n").unwrap();
    let exe = f.exe(&[]);

    let report = TestRunnerBuilder::new(&exe)
        .dir(f.root())
        .filter("keep/")
        .blacklist(f.path("blacklist.txt"))
        .run()
        .unwrap();
    let paths: Vec<&str> = report.files.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["keep/a.json"]);
    assert!(report.all_passed());
}

#[test]
fn cli_exit_codes() {
    let f = Fixture::new();
    f.spec(
        "a.json",
        r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": 1}}"#,
    );
    let good = f.exe(&[r#"{"id":"t1","reply":1}"#]);
    let bad = f.script("bad.sh", "echo '{\"id\":\"t1\",\"reply\":2}'\n");

    let out = cli(&f, &good, &[]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.starts_with("Testfile"));
    assert!(stdout.contains("a.json"));

    assert_eq!(cli(&f, &bad, &[]).status.code(), Some(1));
    assert_eq!(cli(&f, &bad, &["--allow-failures"]).status.code(), Some(0));

    let out = cli(&f, &good, &["--blacklist", "/nonexistent/blacklist.txt"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
}

#[test]
fn cli_json_report() {
    let f = Fixture::new();
    f.spec(
        "a.json",
        r#"{"testcases": {"t1": {"action": "x"}}, "expectedResults": {"t1": 1, "t2": 2}}"#,
    );
    let exe = f.exe(&[r#"{"id":"t1","reply":1}"#]);

    let out = cli(&f, &exe, &["--format", "json"]);
    assert_eq!(out.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["files"][0]["successful"], serde_json::json!(["t1"]));
    assert_eq!(report["files"][0]["missing"], serde_json::json!(["t2"]));
}

#[test]
fn staged_file_removed_when_executable_cannot_run() {
    let f = Fixture::new();
    f.spec(
        "big.json",
        r#"{"testcases": {"a": {"action": "x"}, "b": {"action": "x"}}, "expectedResults": {"a": 1, "b": 2}}"#,
    );
    let staging = f.path("staging");

    let report = TestRunnerBuilder::new(f.path("nope"))
        .dir(f.root())
        .max_cases(1)
        .staging_dir(&staging)
        .run()
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.truncated_to, Some(1));
    assert_eq!(file.missing, vec!["a"]);
    assert_eq!(file.harness_failures.len(), 1);
    assert_eq!(file.harness_failures[0].kind, FailureKind::Execution);
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    assert!(!report.all_passed());
}

#[test]
fn staged_copy_keeps_unknown_fields() {
    let f = Fixture::new();
    f.spec(
        "big.json",
        r#"{"version": 2, "testcases": {"a": {"action": "x", "mode": "fast"}, "b": {"action": "x"}}, "expectedResults": {"a": null, "b": 2}}"#,
    );
    let seen = f.path("seen.json");
    let exe = f.script("exe.sh", &format!("cp \"$1\" '{}'\n", seen.display()));

    TestRunnerBuilder::new(&exe)
        .dir(f.root())
        .max_cases(1)
        .run()
        .unwrap();

    let sent: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&seen).unwrap()).unwrap();
    assert_eq!(sent["version"], 2);
    assert_eq!(sent["testcases"]["a"]["mode"], "fast");
    assert!(sent["testcases"].get("b").is_none());
}
