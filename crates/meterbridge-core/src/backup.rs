// ── Credential backup guard ──
//
// Mirrors the primary credential record to a secondary path that is
// expected to survive a full overwrite of the primary's directory, and
// restores from it on start-up when the primary is gone or unreadable.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persist::{self, RecordState};

/// Outcome of [`BackupGuard::restore_if_needed`]. IO trouble is the `Err` arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RestoreOutcome {
    #[strum(serialize = "restored")]
    Restored,
    #[strum(serialize = "not needed")]
    NotNeeded,
}

#[derive(Debug, Clone)]
pub struct BackupGuard {
    primary: PathBuf,
    backup: PathBuf,
}

impl BackupGuard {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
        }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Copy the primary record to the backup location.
    ///
    /// An empty primary is skipped, and so is a corrupt one so that a good
    /// backup is never replaced by garbage.
    pub fn backup_now(&self) -> Result<(), StoreError> {
        match persist::read_record(&self.primary)? {
            RecordState::Valid(_, raw) => {
                persist::write_atomic(&self.backup, &raw)?;
                debug!(backup = %self.backup.display(), "credentials backed up");
            }
            RecordState::Empty => debug!("no primary credentials to back up"),
            RecordState::Corrupt(reason) => {
                warn!(%reason, "primary credential record is corrupt, keeping previous backup");
            }
        }
        Ok(())
    }

    /// Restore the primary record from the backup when the primary is
    /// missing, empty or unparseable.
    ///
    /// Idempotent: with a readable primary this touches nothing.
    pub fn restore_if_needed(&self) -> Result<RestoreOutcome, StoreError> {
        let primary_state = match persist::read_record(&self.primary) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "primary credential record unreadable");
                RecordState::Corrupt(e.to_string())
            }
        };

        match primary_state {
            RecordState::Valid(..) => {
                debug!("primary credentials present, restore not needed");
                return Ok(RestoreOutcome::NotNeeded);
            }
            RecordState::Corrupt(reason) => {
                warn!(%reason, "primary credential record is damaged");
            }
            RecordState::Empty => {}
        }

        match persist::read_record(&self.backup)? {
            RecordState::Valid(_, raw) => {
                persist::write_atomic(&self.primary, &raw)?;
                info!(
                    primary = %self.primary.display(),
                    backup = %self.backup.display(),
                    "credentials restored from backup"
                );
                Ok(RestoreOutcome::Restored)
            }
            RecordState::Empty => {
                debug!("no backup to restore from");
                Ok(RestoreOutcome::NotNeeded)
            }
            RecordState::Corrupt(reason) => Err(StoreError::Corrupt {
                path: self.backup.clone(),
                reason,
            }),
        }
    }

    /// Delete the backup. Used when credentials are deliberately cleared.
    pub fn discard(&self) -> Result<(), StoreError> {
        persist::remove_if_exists(&self.backup)
    }
}
