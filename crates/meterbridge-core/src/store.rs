// ── Credential store ──
//
// Single owner of the credential record. All mutations go through one
// mutex and are persisted atomically before the lock is released, then
// mirrored to the backup location when a `BackupGuard` is attached.
//
// A failed write keeps the new value in memory and marks the store
// dirty; `flush_pending` retries it (the runtime calls it from the
// backup task and on shutdown).

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::backup::BackupGuard;
use crate::credentials::Credentials;
use crate::error::StoreError;
use crate::persist::{self, RecordState};

#[derive(Debug, Default)]
struct State {
    current: Option<Credentials>,
    dirty: bool,
}

/// Durable, lock-serialized holder of the credential record.
///
/// Share it as `Arc<CredentialStore>`.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    backup: Option<BackupGuard>,
    state: Mutex<State>,
}

impl CredentialStore {
    /// Open the store at `path`, loading whatever is there.
    ///
    /// A missing or empty file yields an empty store. A corrupt file is
    /// logged and treated as empty so that `set` can overwrite it; run
    /// [`BackupGuard::restore_if_needed`] first to recover it instead.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let current = load(&path)?;
        debug!(path = %path.display(), loaded = current.is_some(), "credential store opened");
        Ok(Self {
            path,
            backup: None,
            state: Mutex::new(State {
                current,
                dirty: false,
            }),
        })
    }

    /// Mirror every successful write to `guard`'s backup location.
    pub fn with_backup(mut self, guard: BackupGuard) -> Self {
        self.backup = Some(guard);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_guard(&self) -> Option<&BackupGuard> {
        self.backup.as_ref()
    }

    /// Snapshot of the current credentials.
    pub fn get(&self) -> Option<Credentials> {
        self.lock().current.clone()
    }

    /// Replace the credentials and persist them.
    pub fn set(&self, credentials: Credentials) -> Result<(), StoreError> {
        credentials.validate()?;
        let mut state = self.lock();
        state.current = Some(credentials);
        self.persist(&mut state)
    }

    /// Read-modify-write under the store lock.
    ///
    /// Returns the updated credentials, or `None` when the store is empty
    /// (the closure is not called then).
    pub fn update<F>(&self, f: F) -> Result<Option<Credentials>, StoreError>
    where
        F: FnOnce(&mut Credentials),
    {
        let mut state = self.lock();
        let Some(creds) = state.current.as_mut() else {
            return Ok(None);
        };
        f(creds);
        let updated = creds.clone();
        self.persist(&mut state)?;
        Ok(Some(updated))
    }

    /// Forget the credentials, on disk and in the backup.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.current = None;
        state.dirty = false;
        persist::remove_if_exists(&self.path)?;
        if let Some(guard) = &self.backup {
            guard.discard()?;
        }
        debug!("credentials cleared");
        Ok(())
    }

    /// Serialize the current credentials for disaster recovery.
    pub fn export(&self) -> Result<String, StoreError> {
        match &self.lock().current {
            Some(creds) => creds.to_toml(),
            None => Err(StoreError::Validation {
                message: "no credentials stored".into(),
            }),
        }
    }

    /// Replace the credentials with a previously exported record.
    pub fn import(&self, text: &str) -> Result<Credentials, StoreError> {
        let creds = Credentials::from_toml(text).map_err(|reason| StoreError::Validation {
            message: format!("import rejected: {reason}"),
        })?;
        self.set(creds.clone())?;
        Ok(creds)
    }

    /// Re-read the primary file, e.g. after a restore.
    ///
    /// Unflushed in-memory changes win over the file and are kept.
    pub fn reload(&self) -> Result<Option<Credentials>, StoreError> {
        let mut state = self.lock();
        if state.dirty {
            warn!("credential store has unflushed changes, not reloading from disk");
            return Ok(state.current.clone());
        }
        state.current = load(&self.path)?;
        Ok(state.current.clone())
    }

    /// Retry a write that failed earlier. Returns `true` if one was pending.
    pub fn flush_pending(&self) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if !state.dirty {
            return Ok(false);
        }
        self.persist(&mut state)?;
        debug!("pending credential write flushed");
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &mut State) -> Result<(), StoreError> {
        let result = self.write_through(state.current.as_ref());
        state.dirty = result.is_err();
        if let Err(e) = &result {
            error!(error = %e, "credential write failed, keeping value in memory");
        }
        result
    }

    fn write_through(&self, current: Option<&Credentials>) -> Result<(), StoreError> {
        match current {
            Some(creds) => persist::write_atomic(&self.path, &creds.to_toml()?)?,
            None => persist::remove_if_exists(&self.path)?,
        }
        if let Some(guard) = &self.backup {
            guard.backup_now()?;
        }
        Ok(())
    }
}

fn load(path: &Path) -> Result<Option<Credentials>, StoreError> {
    match persist::read_record(path)? {
        RecordState::Valid(creds, _) => Ok(Some(creds)),
        RecordState::Empty => Ok(None),
        RecordState::Corrupt(reason) => {
            warn!(path = %path.display(), %reason, "ignoring corrupt credential record");
            Ok(None)
        }
    }
}
