#![allow(clippy::unwrap_used)]
// Credential survival across a destructive overwrite of the install
// directory: set → backup → wipe → restore.

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use meterbridge_core::{BackupGuard, CredentialStore, Credentials, RestoreOutcome};

// ── Helpers ─────────────────────────────────────────────────────────

fn guard(root: &Path) -> BackupGuard {
    BackupGuard::new(
        root.join("custom_components/meter/credentials.toml"),
        root.join(".storage/meter_credentials_backup.toml"),
    )
}

fn full_credentials() -> Credentials {
    let mut creds = Credentials::new(
        "192.168.1.50",
        "user@example.com",
        SecretString::from("hunter2".to_string()),
    )
    .unwrap();
    creds.bearer_token = Some(SecretString::from("bearer-abc".to_string()));
    creds.token_expiry = Utc.timestamp_opt(1_718_449_200, 0).single();
    creds.lan_token = Some(SecretString::from("lan-xyz".to_string()));
    creds
}

/// What a package manager does to the install directory on update.
fn wipe_install_dir(root: &Path) {
    fs::remove_dir_all(root.join("custom_components")).unwrap();
    fs::create_dir_all(root.join("custom_components/meter")).unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn credentials_survive_overwrite() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());

    let store = CredentialStore::open(g.primary()).unwrap();
    store.set(full_credentials()).unwrap();
    assert_ok!(g.backup_now());
    drop(store);

    wipe_install_dir(root.path());

    assert_eq!(g.restore_if_needed().unwrap(), RestoreOutcome::Restored);
    let restored = CredentialStore::open(g.primary()).unwrap().get();
    assert_eq!(restored, Some(full_credentials()));
}

#[test]
fn write_through_backup_tracks_token_refresh() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());

    let store = CredentialStore::open(g.primary())
        .unwrap()
        .with_backup(g.clone());
    store.set(full_credentials()).unwrap();
    store
        .update(|c| c.bearer_token = Some(SecretString::from("refreshed".to_string())))
        .unwrap();
    let expected = store.get().unwrap();
    drop(store);

    wipe_install_dir(root.path());

    g.restore_if_needed().unwrap();
    assert_eq!(CredentialStore::open(g.primary()).unwrap().get(), Some(expected));
}

#[test]
fn restore_is_idempotent_with_populated_primary() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());
    let store = CredentialStore::open(g.primary())
        .unwrap()
        .with_backup(g.clone());
    store.set(full_credentials()).unwrap();

    let before = fs::read_to_string(g.primary()).unwrap();
    assert_eq!(g.restore_if_needed().unwrap(), RestoreOutcome::NotNeeded);
    assert_eq!(g.restore_if_needed().unwrap(), RestoreOutcome::NotNeeded);
    assert_eq!(fs::read_to_string(g.primary()).unwrap(), before);
}

#[test]
fn restore_keeps_keys_written_by_newer_versions() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());
    let record = "device_address = \"10.0.0.2\"\n\
                  email = \"user@example.com\"\n\
                  password = \"pw\"\n\
                  meter_serial = \"1ESY1160000000\"\n";
    fs::create_dir_all(g.backup().parent().unwrap()).unwrap();
    fs::write(g.backup(), record).unwrap();

    g.restore_if_needed().unwrap();
    assert_eq!(fs::read_to_string(g.primary()).unwrap(), record);
}

#[test]
fn empty_primary_counts_as_missing() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());
    let store = CredentialStore::open(g.primary())
        .unwrap()
        .with_backup(g.clone());
    store.set(full_credentials()).unwrap();
    drop(store);

    fs::write(g.primary(), "").unwrap();
    assert_eq!(g.restore_if_needed().unwrap(), RestoreOutcome::Restored);
    assert_eq!(
        CredentialStore::open(g.primary()).unwrap().get(),
        Some(full_credentials())
    );
}

#[test]
fn corrupt_backup_is_an_error_not_a_silent_skip() {
    let root = TempDir::new().unwrap();
    let g = guard(root.path());
    fs::create_dir_all(g.backup().parent().unwrap()).unwrap();
    fs::write(g.backup(), "device_address = [unterminated").unwrap();

    assert_err!(g.restore_if_needed());
    assert!(!g.primary().exists());
}
