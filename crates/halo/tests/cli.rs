// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive the `halo` binary against a temporary file store.
//!
//! Each test writes its own config file so runs are isolated from the user's
//! configuration and data.

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

struct Workspace {
    dir: tempfile::TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new(daily_limit: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("halo.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &config,
            format!(
                r#"
[meter]
log_level = "error"

[storage]
backend = "file"
data_dir = "{}"

[budget]
daily_limit_usd = {daily_limit:?}
hard_stop = true
"#,
                data_dir.display().to_string().replace('\\', "/")
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn halo(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_halo"))
            .arg("--config")
            .arg(&self.config)
            .arg("--plain")
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut argv = args.to_vec();
        argv.push("--json");
        let output = self.halo(&argv);
        assert!(
            output.status.success(),
            "halo {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn record_opus(ws: &Workspace) -> Value {
    ws.json(&[
        "record",
        "--model",
        "claude-3-opus-20240229",
        "--input",
        "10000",
        "--output",
        "2000",
    ])
}

#[test]
fn records_survive_between_invocations() {
    let ws = Workspace::new(100.0);
    let first = record_opus(&ws);
    let second = record_opus(&ws);
    assert!(second["record"]["id"].as_u64() > first["record"]["id"].as_u64());

    let today = ws.json(&["today"]);
    assert_eq!(today["operation_count"], 2);
}

#[test]
fn check_exits_with_blocked_code_over_hard_limit() {
    let ws = Workspace::new(0.01);
    assert_eq!(ws.halo(&["check"]).status.code(), Some(0));

    let recorded = record_opus(&ws);
    assert_eq!(recorded["decision"]["decision"], "blocked");
    assert_eq!(ws.halo(&["check"]).status.code(), Some(2));

    let reset = ws.halo(&["reset", "--yes"]);
    assert!(reset.status.success());
    assert_eq!(ws.halo(&["check"]).status.code(), Some(0));
}

#[test]
fn invalid_tokens_are_rejected_without_recording() {
    let ws = Workspace::new(100.0);
    let output = ws.halo(&["record", "--input", "-5"]);
    assert_eq!(output.status.code(), Some(1));

    let today = ws.json(&["today"]);
    assert_eq!(today["operation_count"], 0);
}

#[test]
fn destructive_commands_need_confirmation() {
    let ws = Workspace::new(100.0);
    record_opus(&ws);
    assert_eq!(ws.halo(&["clear"]).status.code(), Some(1));
    assert_eq!(ws.json(&["today"])["operation_count"], 1);
}

#[test]
fn export_file_restores_into_another_workspace() {
    let source = Workspace::new(100.0);
    record_opus(&source);
    source.json(&["budget", "set", "--monthly", "42"]);
    let export = source.path("export.json");
    let output = source.halo(&["export", "--output", export.to_str().unwrap()]);
    assert!(output.status.success());

    let target = Workspace::new(100.0);
    let imported = target.json(&["import", export.to_str().unwrap()]);
    assert_eq!(imported["records"], 1);
    assert_eq!(target.json(&["budget", "show"])["monthly_limit"], 42.0);
    assert_eq!(target.json(&["today"])["operation_count"], 1);
}

#[test]
fn csv_export_goes_to_stdout() {
    let ws = Workspace::new(100.0);
    record_opus(&ws);
    let output = ws.halo(&["export", "--format", "csv"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Date,Operation,Model,InputTokens,OutputTokens,CachedTokens,Cost")
    );
    assert!(lines.next().unwrap().contains("claude-3-opus-20240229"));
}
