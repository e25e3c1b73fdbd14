//! CLI Integration Tests
//!
//! These tests run the `ibsth` binary. Argument handling runs without
//! Bluetooth hardware; `watch` itself is marked `#[ignore]`.
//!
//! Run hardware tests:
//! ```
//! cargo test --package ibsth-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::path::Path;
use std::process::{Command, Output};

/// Run ibsth with an isolated config and cache directory
fn run_ibsth(cache_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ibsth"))
        .args(args)
        .env("IBSTH_CACHE_DIR", cache_dir)
        .env("XDG_CONFIG_HOME", cache_dir.join("config"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run ibsth binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version Tests (no hardware required)
// =============================================================================

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_ibsth(dir.path(), &["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("watch"));
    assert!(!text.contains("cache list"));
}

#[test]
fn test_watch_help_lists_options() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_ibsth(dir.path(), &["watch", "--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("--count"));
    assert!(text.contains("--timeout"));
    assert!(text.contains("--no-duplicates"));
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_ibsth(dir.path(), &["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("ibsth "));
}

#[test]
fn test_unknown_command_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_ibsth(dir.path(), &["frobnicate"]);
    assert!(!output.status.success());
}

// =============================================================================
// Hardware Tests
// =============================================================================

#[test]
#[ignore = "requires BLE hardware"]
fn test_watch_one_reading() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_ibsth(dir.path(), &["watch", "--count", "1", "--format", "json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert!(value["address"].is_string());
}
