//! Locked/unlocked naming convention and the state oracle.
//!
//! A locked artifact is named `<unlocked name><locked suffix>`, e.g.
//! `bookmarks.db` and `bookmarks.db.enc`. Other parts of the application
//! branch on that suffix, so it is part of the public contract.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LockError;
use crate::fs::FileSystem;

/// Which form of an artifact is on disk, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// The locked form exists at this path.
    Locked(PathBuf),
    /// Only the unlocked form exists, at this path.
    Unlocked(PathBuf),
}

/// True if the file name of `path` carries `suffix` and is longer than it.
///
/// Compares raw bytes, so names that are not valid UTF-8 still match.
pub fn has_locked_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name().is_some_and(|name| {
        let name = name.as_encoded_bytes();
        name.len() > suffix.len() && name.ends_with(suffix.as_bytes())
    })
}

/// The locked name for `path`. Idempotent on names that already carry the suffix.
pub fn locked_path(path: &Path, suffix: &str) -> PathBuf {
    if has_locked_suffix(path, suffix) {
        return path.to_path_buf();
    }
    append_suffix(path, suffix)
}

/// The unlocked name for `path`. Idempotent on names without the suffix.
pub fn unlocked_path(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name().and_then(|name| strip_suffix(name, suffix)) {
        Some(stem) => path.with_file_name(stem),
        None => path.to_path_buf(),
    }
}

/// `name` without a trailing `suffix`, if it has one and is longer than it.
#[cfg(unix)]
fn strip_suffix(name: &OsStr, suffix: &str) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;

    let bytes = name.as_bytes();
    (bytes.len() > suffix.len() && bytes.ends_with(suffix.as_bytes()))
        .then(|| OsStr::from_bytes(&bytes[..bytes.len() - suffix.len()]).to_os_string())
}

/// `name` without a trailing `suffix`, if it has one and is longer than it.
#[cfg(not(unix))]
fn strip_suffix(name: &OsStr, suffix: &str) -> Option<OsString> {
    // Non-UTF-8 names are refused by `Locker::lock` on these platforms.
    let name = name.to_str()?;
    (name.len() > suffix.len())
        .then(|| name.strip_suffix(suffix))
        .flatten()
        .map(OsString::from)
}

/// Append `suffix` to the final component of `path`.
pub(crate) fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Decide which form of the artifact named by `path` exists.
///
/// `path` may name either form. The locked form wins if both exist. Fails
/// with `NotFound` when neither exists. Reads metadata only.
pub fn probe<F: FileSystem>(fs: &F, path: &Path, suffix: &str) -> Result<LockState, LockError> {
    let locked = locked_path(path, suffix);
    if fs.exists(&locked) {
        debug!(path = %locked.display(), "artifact is locked");
        return Ok(LockState::Locked(locked));
    }
    let unlocked = unlocked_path(path, suffix);
    if fs.exists(&unlocked) {
        debug!(path = %unlocked.display(), "artifact is unlocked");
        return Ok(LockState::Unlocked(unlocked));
    }
    Err(LockError::NotFound(path.to_path_buf()))
}

/// `Ok(())` if the artifact is locked, `NotLocked` if only the unlocked form
/// exists, `NotFound` if neither does.
pub fn is_locked<F: FileSystem>(fs: &F, path: &Path, suffix: &str) -> Result<(), LockError> {
    match probe(fs, path, suffix)? {
        LockState::Locked(_) => Ok(()),
        LockState::Unlocked(unlocked) => Err(LockError::NotLocked(unlocked)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;

    #[test]
    fn test_naming() {
        let plain = Path::new("dir/notes.txt");
        let locked = Path::new("dir/notes.txt.enc");

        assert_eq!(locked_path(plain, ".enc"), locked);
        assert_eq!(locked_path(locked, ".enc"), locked);
        assert_eq!(unlocked_path(locked, ".enc"), plain);
        assert_eq!(unlocked_path(plain, ".enc"), plain);
    }

    #[test]
    fn test_bare_suffix_is_not_locked_name() {
        let bare = Path::new("dir/.enc");
        assert!(!has_locked_suffix(bare, ".enc"));
        assert_eq!(locked_path(bare, ".enc"), Path::new("dir/.enc.enc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_naming_non_utf8() {
        use std::os::unix::ffi::OsStrExt;

        let plain = Path::new(OsStr::from_bytes(b"dir/notes\xff.txt"));
        let locked = Path::new(OsStr::from_bytes(b"dir/notes\xff.txt.enc"));

        assert!(has_locked_suffix(locked, ".enc"));
        assert!(!has_locked_suffix(plain, ".enc"));
        assert_eq!(locked_path(plain, ".enc"), locked);
        assert_eq!(unlocked_path(locked, ".enc"), plain);
    }

    #[test]
    fn test_probe_states() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("notes.txt");
        let locked = dir.path().join("notes.txt.enc");
        let fs = StdFileSystem;

        assert!(matches!(
            is_locked(&fs, &plain, ".enc"),
            Err(LockError::NotFound(_))
        ));

        std::fs::write(&plain, b"hello").unwrap();
        assert_eq!(
            probe(&fs, &locked, ".enc").unwrap(),
            LockState::Unlocked(plain.clone())
        );
        assert!(matches!(
            is_locked(&fs, &plain, ".enc"),
            Err(LockError::NotLocked(_))
        ));

        std::fs::write(&locked, b"cipher").unwrap();
        assert_eq!(
            probe(&fs, &plain, ".enc").unwrap(),
            LockState::Locked(locked.clone())
        );
        assert!(is_locked(&fs, &plain, ".enc").is_ok());
        assert!(is_locked(&fs, &locked, ".enc").is_ok());
    }
}
