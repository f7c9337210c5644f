//! Integration tests for the `meterbridge` binary.
//!
//! Every test points `--config` at a temp directory, so nothing touches
//! the user's real configuration or credentials, and no test needs the
//! network or the system keyring.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            dir: TempDir::new().unwrap(),
        };
        sandbox.write_config("");
        sandbox
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config_file(&self) -> PathBuf {
        self.root().join("config.toml")
    }

    fn credentials_file(&self) -> PathBuf {
        self.root().join("install").join("credentials.toml")
    }

    fn backup_file(&self) -> PathBuf {
        self.root().join("storage").join("credentials.backup.toml")
    }

    /// Config with sandboxed paths plus `extra` TOML appended.
    fn write_config(&self, extra: &str) {
        let text = format!(
            "[paths]\ncredentials_file = '{}'\nbackup_file = '{}'\n\n{extra}",
            self.credentials_file().display(),
            self.backup_file().display(),
        );
        fs::write(self.config_file(), text).unwrap();
    }

    /// Build a [`Command`] for the binary with env isolation.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("meterbridge");
        cmd.env("HOME", self.root())
            .env("XDG_CONFIG_HOME", self.root().join("xdg-config"))
            .env("XDG_DATA_HOME", self.root().join("xdg-data"))
            .env_remove("METERBRIDGE_CONFIG")
            .env_remove("METERBRIDGE_PASSWORD")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_file());
        cmd
    }

    fn configure(&self) {
        self.cmd()
            .args([
                "configure",
                "--device",
                "192.168.1.50",
                "--email",
                "user@example.com",
                "--password",
                "s3cr3t-pass",
            ])
            .assert()
            .success();
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cargo_bin_cmd!("meterbridge").output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("meterbridge")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run")
                .and(predicate::str::contains("configure"))
                .and(predicate::str::contains("fetch"))
                .and(predicate::str::contains("restore")),
        );
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("meterbridge")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meterbridge"));
}

#[test]
fn test_fetch_rejects_unknown_source() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["fetch", "bluetooth"])
        .assert()
        .code(2);
}

// ── Credentials lifecycle ───────────────────────────────────────────

#[test]
fn test_show_without_credentials_is_auth_error() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("show")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials configured"));
}

#[test]
fn test_configure_then_show_redacts_password() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    assert!(sandbox.credentials_file().exists());
    assert!(sandbox.backup_file().exists(), "write-through backup");

    sandbox
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("192.168.1.50")
                .and(predicate::str::contains("user@example.com"))
                .and(predicate::str::contains("s3cr3t-pass").not()),
        );
}

#[test]
fn test_show_json() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    let output = sandbox.cmd().args(["show", "--output", "json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["email"], "user@example.com");
    assert_eq!(value["password"], "********");
    assert_eq!(value["backup_present"], true);
}

#[test]
fn test_configure_rejects_empty_email() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["configure", "--device", "10.0.0.2", "--email", " ", "--password", "pw"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("email"));
    assert!(!sandbox.credentials_file().exists());
}

#[test]
fn test_restore_after_install_dir_wipe() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    fs::remove_dir_all(sandbox.root().join("install")).unwrap();
    sandbox
        .cmd()
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));
    sandbox
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("user@example.com"));

    sandbox
        .cmd()
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("not needed"));
}

#[test]
fn test_show_recovers_wiped_install_dir_from_backup() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    fs::remove_dir_all(sandbox.root().join("install")).unwrap();
    sandbox
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("user@example.com"));
    assert!(sandbox.credentials_file().exists());
}

#[test]
fn test_export_recovers_wiped_install_dir_from_backup() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    fs::remove_file(sandbox.credentials_file()).unwrap();
    sandbox
        .cmd()
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("192.168.1.50"));
}

#[test]
fn test_show_with_corrupt_backup_and_no_primary_is_setup_failure() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.backup_file().parent().unwrap()).unwrap();
    fs::write(sandbox.backup_file(), "email = [broken").unwrap();

    sandbox.cmd().arg("show").assert().code(9);
    sandbox.cmd().args(["fetch", "lan"]).assert().code(9);
}

#[test]
fn test_restore_with_corrupt_backup_is_setup_failure() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.backup_file().parent().unwrap()).unwrap();
    fs::write(sandbox.backup_file(), "email = [broken").unwrap();

    sandbox.cmd().arg("restore").assert().code(9);
}

#[test]
fn test_export_import_round_trip() {
    let source = Sandbox::new();
    source.configure();

    let exported = source.root().join("exported.toml");
    source
        .cmd()
        .args(["export", "--file"])
        .arg(&exported)
        .assert()
        .success();
    assert!(fs::read_to_string(&exported).unwrap().contains("192.168.1.50"));

    let target = Sandbox::new();
    target.cmd().arg("import").arg(&exported).assert().success();
    target
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("192.168.1.50"));
}

#[test]
fn test_import_rejects_garbage() {
    let sandbox = Sandbox::new();
    let bogus = sandbox.root().join("bogus.toml");
    fs::write(&bogus, "this is not a credential record").unwrap();

    sandbox.cmd().arg("import").arg(&bogus).assert().failure();
    assert!(!sandbox.credentials_file().exists());
}

#[test]
fn test_clear_requires_yes_without_terminal() {
    let sandbox = Sandbox::new();
    sandbox.configure();

    sandbox.cmd().arg("clear").assert().code(2);
    assert!(sandbox.credentials_file().exists());

    sandbox.cmd().args(["clear", "--yes"]).assert().success();
    assert!(!sandbox.credentials_file().exists());
    assert!(!sandbox.backup_file().exists());
    sandbox.cmd().arg("show").assert().code(3);
}

#[test]
fn test_backup_without_credentials_fails() {
    let sandbox = Sandbox::new();
    sandbox.cmd().arg("backup").assert().code(3);
}

// ── Config validation ───────────────────────────────────────────────

#[test]
fn test_zero_interval_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox.write_config("[polling]\nlan_interval_secs = 0\n");
    sandbox
        .cmd()
        .arg("show")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("lan_interval_secs"));
}

#[test]
fn test_backup_inside_install_dir_is_rejected() {
    let sandbox = Sandbox::new();
    let text = format!(
        "[paths]\ncredentials_file = '{}'\nbackup_file = '{}'\n",
        sandbox.credentials_file().display(),
        sandbox.root().join("install/backup.toml").display(),
    );
    fs::write(sandbox.config_file(), text).unwrap();

    sandbox.cmd().arg("show").assert().code(2);
}

#[test]
fn test_fetch_without_credentials_is_auth_error() {
    let sandbox = Sandbox::new();
    sandbox.cmd().args(["fetch", "lan"]).assert().code(3);
}
