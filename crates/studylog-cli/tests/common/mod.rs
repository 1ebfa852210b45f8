//! Common utilities for CLI E2E tests.
#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// An isolated data directory the CLI is pointed at.
pub struct Home {
    dir: TempDir,
}

impl Home {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp home"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Invoke a CLI command and return (stdout, stderr, exit code).
    pub fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = Command::new(env!("CARGO_BIN_EXE_studylog"))
            .args(args)
            .env("STUDYLOG_HOME", self.path())
            .env_remove("STUDYLOG_LOG")
            .env_remove("STUDYLOG_ENV")
            .env_remove("STUDYLOG_REMOTE_KEY")
            .output()
            .expect("Failed to execute CLI command");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        (stdout, stderr, code)
    }

    /// Invoke a CLI command and expect success.
    pub fn success(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
        stdout
    }

    /// Invoke a CLI command and expect failure; returns stderr.
    pub fn failure(&self, args: &[&str]) -> String {
        let (_, stderr, code) = self.run(args);
        assert_eq!(code, 1, "CLI command unexpectedly succeeded: {args:?}");
        assert!(stderr.contains("error: "), "missing error prefix: {stderr}");
        stderr
    }

    /// Every JSON document a command printed, in order.
    pub fn json(&self, args: &[&str]) -> Vec<serde_json::Value> {
        parse_json_stream(&self.success(args))
    }
}

pub fn parse_json_stream(out: &str) -> Vec<serde_json::Value> {
    serde_json::Deserializer::from_str(out)
        .into_iter::<serde_json::Value>()
        .collect::<Result<_, _>>()
        .expect("Failed to parse JSON output")
}

/// Check if string contains substring
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "Expected '{}' to contain '{}'",
        haystack,
        needle
    );
}
