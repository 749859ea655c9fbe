//! Crash-safe replacement of a file's bytes.
//!
//! One replacement walks a fixed sequence of states:
//!
//! ```text
//! Start --backup--> BackedUp --write--> Written --cleanup--> Done
//!                       |
//!                       +--write fails--> restore --ok--> FailedRestored
//!                                                 --err-> FailedUnrestored
//! ```
//!
//! At every step either the pre-operation bytes or the new bytes are on disk
//! under a known path. The backup is only deleted once it is no longer the
//! sole copy of anything.

use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::LockError;
use crate::fs::FileSystem;

/// One replacement: move `original`'s logical content to `target` as
/// `contents`, using `backup` as the safety net.
///
/// `target` may equal `original` (in-place rewrite) or differ from it
/// (rewrite plus rename, as lock and unlock do).
#[derive(Debug, Clone, Copy)]
pub struct Replacement<'a> {
    pub original: &'a Path,
    pub target: &'a Path,
    pub backup: &'a Path,
    pub contents: &'a [u8],
}

impl Replacement<'_> {
    fn renames(&self) -> bool {
        self.original != self.target
    }
}

/// Perform `replacement` against `fs`.
///
/// Errors:
/// - `BackupError`: nothing was touched (the backup path was occupied, the
///   original is missing, or the copy failed).
/// - `WriteFailedRestored`: the write failed; the original is intact.
/// - `WriteFailedAndRestoreFailed`: the write and the restore both failed;
///   the backup file still holds the original bytes.
///
/// Cleanup failures after a successful write are logged, not returned.
pub fn safe_replace<F: FileSystem>(fs: &F, replacement: &Replacement<'_>) -> Result<(), LockError> {
    let Replacement {
        original,
        target,
        backup,
        contents,
    } = *replacement;

    // Start -> BackedUp
    backup_original(fs, original, backup)?;
    debug!(original = %original.display(), backup = %backup.display(), "backed up");

    // BackedUp -> Written
    let fresh_target = replacement.renames() && !fs.exists(target);
    if let Err(write_error) = fs.write(target, contents) {
        return Err(recover(fs, replacement, fresh_target, write_error));
    }
    debug!(target = %target.display(), bytes = contents.len(), "written");

    // Written -> Done
    if replacement.renames() {
        if let Err(e) = fs.remove(original) {
            warn!(path = %original.display(), error = %e, "replaced file left behind");
        }
    }
    if let Err(e) = fs.remove(backup) {
        warn!(path = %backup.display(), error = %e, "backup left behind");
    }
    debug!(target = %target.display(), "replace complete");
    Ok(())
}

fn backup_original<F: FileSystem>(fs: &F, original: &Path, backup: &Path) -> Result<(), LockError> {
    let backup_error = |source: std::io::Error| LockError::BackupError {
        original: original.to_path_buf(),
        backup: backup.to_path_buf(),
        source,
    };

    // An existing backup may be the only copy left by an earlier double
    // failure; never overwrite it.
    if fs.exists(backup) {
        return Err(backup_error(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "backup path is occupied",
        )));
    }
    if !fs.is_file(original) {
        return Err(backup_error(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "original is not a regular file",
        )));
    }
    if let Err(e) = fs.copy(original, backup) {
        // A half-written backup is useless; the original is untouched.
        if fs.exists(backup) {
            if let Err(cleanup) = fs.remove(backup) {
                warn!(path = %backup.display(), error = %cleanup, "partial backup left behind");
            }
        }
        return Err(backup_error(e));
    }
    Ok(())
}

/// The write failed: undo whatever it left behind and put the original back.
///
/// A distinct target is only removed if this replacement created it.
fn recover<F: FileSystem>(
    fs: &F,
    replacement: &Replacement<'_>,
    fresh_target: bool,
    write_error: std::io::Error,
) -> LockError {
    let Replacement {
        original,
        target,
        backup,
        ..
    } = *replacement;

    if fresh_target && fs.exists(target) {
        if let Err(e) = fs.remove(target) {
            warn!(path = %target.display(), error = %e, "partial target left behind");
        }
    }

    match fs.copy(backup, original) {
        Ok(()) => {
            debug!(original = %original.display(), "original restored");
            if let Err(e) = fs.remove(backup) {
                warn!(path = %backup.display(), error = %e, "backup left behind");
            }
            LockError::WriteFailedRestored {
                target: target.to_path_buf(),
                source: write_error,
            }
        }
        Err(restore_error) => {
            error!(
                original = %original.display(),
                backup = %backup.display(),
                write_error = %write_error,
                restore_error = %restore_error,
                "write and restore both failed; recover from backup manually"
            );
            LockError::WriteFailedAndRestoreFailed {
                original: original.to_path_buf(),
                target: target.to_path_buf(),
                backup: backup.to_path_buf(),
                write_error,
                restore_error,
            }
        }
    }
}
