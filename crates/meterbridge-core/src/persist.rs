// Atomic file helpers shared by the credential store and the backup guard.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::credentials::Credentials;
use crate::error::StoreError;

/// What a credential file on disk currently holds.
#[derive(Debug)]
pub(crate) enum RecordState {
    /// No file, or a file with nothing but whitespace.
    Empty,
    /// Parsed credentials plus the raw text, so copies keep unknown keys.
    Valid(Credentials, String),
    /// Present but unparseable. Carries the parse reason.
    Corrupt(String),
}

/// Replace `path` with `contents` so readers see either the old or the new file.
///
/// Writes a sibling temp file, flushes it to disk, then renames it over
/// the target. A crash mid-write leaves at most a stray `.tmp` file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Read and classify a credential file.
pub(crate) fn read_record(path: &Path) -> Result<RecordState, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RecordState::Empty),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    if text.trim().is_empty() {
        return Ok(RecordState::Empty);
    }

    Ok(match Credentials::from_toml(&text) {
        Ok(creds) => RecordState::Valid(creds, text),
        Err(reason) => RecordState::Corrupt(reason),
    })
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/creds.toml");

        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.toml");
        write_atomic(&path, "x").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn read_record_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.toml");

        assert!(matches!(read_record(&path).unwrap(), RecordState::Empty));

        fs::write(&path, "   \n").unwrap();
        assert!(matches!(read_record(&path).unwrap(), RecordState::Empty));

        fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(read_record(&path).unwrap(), RecordState::Corrupt(_)));

        fs::write(&path, "device_address = \"d\"\nemail = \"e\"\npassword = \"p\"\n").unwrap();
        assert!(matches!(read_record(&path).unwrap(), RecordState::Valid(..)));
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("/data/credentials.toml"));
        assert_eq!(tmp, Path::new("/data/credentials.toml.tmp"));
    }
}
