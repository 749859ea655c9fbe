//! Error types for marklock.
//!
//! Every variant is a distinct failure mode of a lock or unlock call.
//! Messages name the paths involved but never passphrases or file contents.
//! Authentication failures are deliberately collapsed into a single variant:
//! a wrong passphrase and a corrupted file look identical to the verifier,
//! and telling them apart would hand an attacker an integrity oracle.

use std::io;
use std::path::PathBuf;

/// The single error type for all marklock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The caller supplied an empty (or whitespace-only) passphrase.
    #[error("passphrase is empty")]
    PassphraseEmpty,

    /// Neither the locked nor the unlocked form of the artifact exists, or
    /// the path is not a regular file.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// `lock` was called on an artifact that is already locked.
    #[error("already locked: {}", .0.display())]
    AlreadyLocked(PathBuf),

    /// `unlock` (or `is_locked`) found only the unlocked form.
    #[error("not locked: {}", .0.display())]
    NotLocked(PathBuf),

    /// Unlocking would overwrite an unrelated file that already holds the
    /// unlocked name.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// The buffer is shorter than the fixed header.
    #[error("malformed ciphertext: {len} bytes is shorter than the {min}-byte header")]
    MalformedCiphertext { len: usize, min: usize },

    /// Authentication failed. Covers wrong passphrase, tampering, truncation
    /// and unrecognised headers alike.
    #[error("wrong passphrase or corrupted ciphertext")]
    WrongPassphraseOrCorrupted,

    /// The random source or the cipher itself failed while encrypting.
    #[error("crypto failure: {0}")]
    Crypto(&'static str),

    /// Reading an input file failed.
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The original could not be snapshotted. Nothing was modified.
    #[error("cannot back up {} to {}: {source}", .original.display(), .backup.display())]
    BackupError {
        original: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    /// The new content could not be written; the original was restored.
    #[error("cannot write {} (original restored): {source}", .target.display())]
    WriteFailedRestored { target: PathBuf, source: io::Error },

    /// The new content could not be written and restoring the original
    /// failed too. The backup file still holds the original bytes.
    #[error(
        "cannot write {} ({write_error}) and cannot restore {} ({restore_error}); \
         original content survives in {}",
        .target.display(),
        .original.display(),
        .backup.display()
    )]
    WriteFailedAndRestoreFailed {
        original: PathBuf,
        target: PathBuf,
        backup: PathBuf,
        #[source]
        write_error: io::Error,
        restore_error: io::Error,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A fieldless view of [`LockError`] for callers that branch on the kind of
/// failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PassphraseEmpty,
    NotFound,
    AlreadyLocked,
    NotLocked,
    DestinationExists,
    MalformedCiphertext,
    WrongPassphraseOrCorrupted,
    Crypto,
    Io,
    BackupError,
    WriteFailedRestored,
    WriteFailedAndRestoreFailed,
    Config,
}

impl LockError {
    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PassphraseEmpty => ErrorKind::PassphraseEmpty,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyLocked(_) => ErrorKind::AlreadyLocked,
            Self::NotLocked(_) => ErrorKind::NotLocked,
            Self::DestinationExists(_) => ErrorKind::DestinationExists,
            Self::MalformedCiphertext { .. } => ErrorKind::MalformedCiphertext,
            Self::WrongPassphraseOrCorrupted => ErrorKind::WrongPassphraseOrCorrupted,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Io { .. } => ErrorKind::Io,
            Self::BackupError { .. } => ErrorKind::BackupError,
            Self::WriteFailedRestored { .. } => ErrorKind::WriteFailedRestored,
            Self::WriteFailedAndRestoreFailed { .. } => ErrorKind::WriteFailedAndRestoreFailed,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the original content is still at its original path.
    ///
    /// Only a double failure during replacement breaks this; every other
    /// error is raised before the first mutation or after a successful restore.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::WriteFailedAndRestoreFailed { .. })
    }
}
