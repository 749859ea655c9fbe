//! # marklock
//!
//! Passphrase locking of files at rest.
//!
//! `lock` encrypts a file in place and renames it with a `.enc` suffix;
//! `unlock` reverses it. Both commit through a backup-then-write-then-cleanup
//! sequence, so a crash, a wrong passphrase or a disk error never destroys
//! the original without leaving a usable copy on disk.
//!
//! ## Public API
//!
//! The free functions use the default configuration. Use [`Locker`] to
//! choose suffixes or KDF cost, inject a file system or random source, or
//! collect an audit trail.

pub mod audit;
pub mod cipher;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;
pub(crate) mod keys;
pub mod locker;
pub mod replace;
pub mod state;

use std::path::{Path, PathBuf};

pub use cipher::Cipher;
pub use config::LockConfig;
pub use error::{ErrorKind, LockError};
pub use keys::{KdfParams, Passphrase};
pub use locker::Locker;

/// Lock the file at `path` under `passphrase`. Returns the locked path.
pub fn lock(path: impl AsRef<Path>, passphrase: &str) -> Result<PathBuf, LockError> {
    Locker::new(LockConfig::default())?.lock(path, passphrase)
}

/// Unlock the artifact named by `path` (locked or unlocked name). Returns
/// the unlocked path.
pub fn unlock(path: impl AsRef<Path>, passphrase: &str) -> Result<PathBuf, LockError> {
    Locker::new(LockConfig::default())?.unlock(path, passphrase)
}

/// `Ok(())` if the artifact named by `path` is locked; `NotLocked` if only
/// its unlocked form exists; `NotFound` if neither does.
pub fn is_locked(path: impl AsRef<Path>) -> Result<(), LockError> {
    state::is_locked(
        &fs::StdFileSystem,
        path.as_ref(),
        config::DEFAULT_LOCKED_SUFFIX,
    )
}
