//! CLI integration tests.
//!
//! None of these start a server; they cover parsing, help output and the
//! offline commands against an isolated config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command with config discovery and secrets pinned to `home`.
fn vulnscope(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vulnscope").unwrap();
    cmd.current_dir(home.path())
        .env("VULNSCOPE_CONFIG_DIR", home.path().join("config"))
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_SECRET_ID")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GEMINI_MODEL")
        .env_remove("GOOGLE_APPLICATION_CREDENTIALS")
        .env_remove("GCS_BUCKET_NAME")
        .env_remove("BG_AUDIT_LOG_TABLE")
        .env_remove("BG_AUDIT_LOG_TABLE_EVENTS");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vulnscope"));
}

#[test]
fn test_start_help_lists_overrides() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--database"))
        .stdout(predicate::str::contains("--reports-dir"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();
    vulnscope(&home).arg("frobnicate").assert().failure();
}

#[test]
fn test_config_show_defaults() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-2.5-flash"))
        .stdout(predicate::str::contains("gostlm"));
}

#[test]
fn test_config_show_applies_env_and_redacts() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("extra.toml");
    std::fs::write(
        &file,
        "[engine]\napi_key = \"sk-plaintext\"\n\n[server]\nauth_token = \"hunter2\"\n",
    )
    .unwrap();

    vulnscope(&home)
        .env("GEMINI_MODEL", "gemini-2.5-pro")
        .args(["--config", file.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-2.5-pro"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("sk-plaintext").not())
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_show_json() {
    let home = TempDir::new().unwrap();
    let output = vulnscope(&home)
        .env("GOOGLE_APPLICATION_CREDENTIALS", "/data/warehouse.db")
        .args(["--json", "config"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["warehouse"]["database"], "/data/warehouse.db");
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .failure();
}

#[test]
fn test_check_fails_without_api_key() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn test_start_fails_without_api_key() {
    let home = TempDir::new().unwrap();
    vulnscope(&home)
        .args(["start", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API key"));
}
