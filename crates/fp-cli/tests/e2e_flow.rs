//! End-to-end tests of the `fp` binary.
//!
//! Each test runs against its own temporary HOME, so neither the user's
//! configuration nor their data directory is touched.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const ARCHIVE: &str = r#"{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:00Z","kind":{"type":"ide_state","phase":"startup"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:01Z","kind":{"type":"solution","action":"open_solution","target":"Shop.sln"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:02Z","active_document":"src/Cart.cs","kind":{"type":"document","document":"src/Cart.cs","action":"opened"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:04Z","active_document":"src/Cart.cs","kind":{"type":"command","command_id":"Edit.Copy"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:04Z","active_document":"src/Cart.cs","kind":{"type":"command","command_id":"Edit.Copy"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:09Z","active_document":"src/Cart.cs","kind":{"type":"document","document":"src/Cart.cs","action":"closing"}}
{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:30Z","kind":{"type":"ide_state","phase":"shutdown"}}
"#;

fn fp_binary() -> String {
    env!("CARGO_BIN_EXE_fp").to_string()
}

fn fp(home: &Path, args: &[&str]) -> Output {
    Command::new(fp_binary())
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run fp")
}

fn setup() -> TempDir {
    let temp = TempDir::new().unwrap();
    let archives = temp.path().join("archives/2016");
    std::fs::create_dir_all(&archives).unwrap();
    std::fs::write(archives.join("dev-1.jsonl"), ARCHIVE).unwrap();
    temp
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()))
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_process_writes_cleaned_events_and_intervals() {
    let temp = setup();
    let out = temp.path().join("out");
    let input = temp.path().join("archives");

    let output = fp(
        temp.path(),
        &["process", input.to_str().unwrap(), "--out", out.to_str().unwrap()],
    );

    assert!(
        output.status.success(),
        "fp process should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2016/dev-1: 6 events"), "{stdout}");
    assert!(stdout.contains("Processed 1 units, 0 failed"), "{stdout}");

    let events = read_lines(&out.join("2016/dev-1.events.jsonl"));
    assert_eq!(events.len(), 6);
    assert_eq!(events[4]["kind"]["command_id"], "Close");

    let intervals = read_lines(&out.join("2016/dev-1.intervals.jsonl"));
    assert!(
        intervals
            .iter()
            .all(|interval| interval["user_id"] == "2016/dev-1")
    );
    let file = intervals
        .iter()
        .find(|interval| interval["kind"]["type"] == "file_interaction")
        .expect("file interaction interval");
    assert_eq!(file["duration"], 7_000);
    assert_eq!(file["project"], "Shop.sln");

    assert!(out.join("2016/dev-1.completions.jsonl").exists());
}

#[test]
fn test_process_defaults_to_configured_output_dir() {
    let temp = setup();
    let out = temp.path().join("configured");
    let config = temp.path().join("fp.toml");
    std::fs::write(&config, format!("output_dir = {:?}\n", out.to_str().unwrap())).unwrap();
    let input = temp.path().join("archives");

    let output = fp(
        temp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "process",
            input.to_str().unwrap(),
        ],
    );

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(out.join("2016/dev-1.events.jsonl").exists());
}

#[test]
fn test_failed_unit_exits_non_zero_but_writes_the_rest() {
    let temp = setup();
    let out = temp.path().join("out");
    let input = temp.path().join("archives");
    std::fs::write(input.join("broken.jsonl"), "{not json\n").unwrap();

    let output = fp(
        temp.path(),
        &["process", input.to_str().unwrap(), "--out", out.to_str().unwrap()],
    );

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("broken: FAILED: unit 'broken':"), "{stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 2 units failed"), "{stderr}");
    assert!(out.join("2016/dev-1.events.jsonl").exists());
}

#[test]
fn test_inspect_json_reports_stage_counts() {
    let temp = setup();
    let input = temp.path().join("archives");

    let output = fp(temp.path(), &["inspect", input.to_str().unwrap(), "--json"]);

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stages = entries[0]["stages"].as_array().unwrap();
    assert_eq!(entries[0]["unit"], "2016/dev-1");
    assert_eq!(stages.first().unwrap()["count"], 7);
    assert_eq!(stages.last().unwrap()["stage"], "after ordering");
    assert_eq!(stages.last().unwrap()["count"], 6);
}

#[test]
fn test_strict_ordering_from_environment_fails_unordered_unit() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("archives");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(
        input.join("dev-1.jsonl"),
        concat!(
            r#"{"triggered_at":"2016-08-19T19:00:02Z","kind":{"type":"command","command_id":"b"}}"#,
            "\n",
            r#"{"triggered_at":"2016-08-19T19:00:01Z","kind":{"type":"command","command_id":"a"}}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = Command::new(fp_binary())
        .env("HOME", temp.path())
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env("FP_ORDERING", "strict")
        .args(["inspect", input.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error: unit 'dev-1': event #1"), "{stdout}");
}

#[test]
fn test_no_subcommand_prints_help() {
    let temp = TempDir::new().unwrap();

    let output = fp(temp.path(), &[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("process"));
    assert!(stdout.contains("inspect"));
}
