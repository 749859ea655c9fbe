//! Lock and unlock: validation, naming and composition.
//!
//! Each call runs strictly in order: validate -> read -> transform -> commit.
//! Encryption and decryption happen entirely in memory before the first
//! write, so a wrong passphrase never touches the disk.

use std::path::{Path, PathBuf};

use tracing::info;
use zeroize::Zeroizing;

use crate::audit::{AuditLog, AuditRecord, AuditSink, Operation};
use crate::cipher::Cipher;
use crate::config::LockConfig;
use crate::crypto::{RandomSource, SystemRandomSource};
use crate::error::LockError;
use crate::fs::{FileSystem, StdFileSystem};
use crate::keys::Passphrase;
use crate::replace::{safe_replace, Replacement};
use crate::state::{self, LockState};

/// Locks and unlocks files under a passphrase.
///
/// Every collaborator (configuration, file system, randomness) is owned by
/// the value; nothing is read from process-wide state. Calls on the same
/// artifact must be serialized by the caller. Calls on different artifacts
/// are independent.
#[derive(Debug)]
pub struct Locker<F: FileSystem = StdFileSystem> {
    config: LockConfig,
    cipher: Cipher,
    fs: F,
    audit: AuditLog,
}

impl Locker<StdFileSystem> {
    /// A locker on the real file system with OS randomness.
    pub fn new(config: LockConfig) -> Result<Self, LockError> {
        Self::with_parts(config, StdFileSystem, Box::new(SystemRandomSource::new()))
    }
}

impl<F: FileSystem> Locker<F> {
    /// A locker with injected file system and random source.
    pub fn with_parts(
        config: LockConfig,
        fs: F,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, LockError> {
        config.validate()?;
        let cipher = Cipher::with_rng(config.kdf, rng);
        Ok(Self {
            config,
            cipher,
            fs,
            audit: AuditLog::new(),
        })
    }

    /// The validated configuration this locker runs with.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Records of every successful transition made through this locker.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Forward every audit record to `sink` as well.
    pub fn add_audit_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.audit.add_forward_sink(sink);
    }

    /// `Ok(())` if the artifact named by `path` (either form) is locked.
    pub fn is_locked(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        state::is_locked(&self.fs, path.as_ref(), &self.config.locked_suffix)
    }

    /// Encrypt the file at `path` and rename it to its locked name.
    ///
    /// Returns the locked path. On failure the plaintext is untouched (or
    /// restored) and no locked file is left behind.
    pub fn lock(&mut self, path: impl AsRef<Path>, passphrase: &str) -> Result<PathBuf, LockError> {
        let passphrase = Passphrase::new(passphrase)?;
        let path = path.as_ref();

        let unlocked = match state::probe(&self.fs, path, &self.config.locked_suffix)? {
            LockState::Locked(locked) => return Err(LockError::AlreadyLocked(locked)),
            LockState::Unlocked(unlocked) => unlocked,
        };
        if !self.fs.is_file(&unlocked) {
            return Err(LockError::NotFound(unlocked));
        }
        #[cfg(not(unix))]
        if unlocked.file_name().and_then(|name| name.to_str()).is_none() {
            return Err(LockError::Io {
                path: unlocked,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "file name is not valid Unicode",
                ),
            });
        }
        let locked = state::locked_path(&unlocked, &self.config.locked_suffix);

        let plaintext = Zeroizing::new(self.read(&unlocked)?);
        let ciphertext = self.cipher.encrypt_with(&plaintext, &passphrase)?;

        self.commit(&unlocked, &locked, &ciphertext)?;
        info!(from = %unlocked.display(), to = %locked.display(), "locked");
        self.audit
            .append(AuditRecord::now(Operation::Lock, &unlocked, &locked));
        Ok(locked)
    }

    /// Decrypt the locked artifact named by `path` (either form) and rename
    /// it back to its unlocked name.
    ///
    /// Returns the unlocked path. A wrong passphrase leaves the locked file
    /// byte-for-byte unchanged.
    pub fn unlock(
        &mut self,
        path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<PathBuf, LockError> {
        let passphrase = Passphrase::new(passphrase)?;
        let path = path.as_ref();

        let locked = match state::probe(&self.fs, path, &self.config.locked_suffix)? {
            LockState::Locked(locked) => locked,
            LockState::Unlocked(unlocked) => return Err(LockError::NotLocked(unlocked)),
        };
        if !self.fs.is_file(&locked) {
            return Err(LockError::NotFound(locked));
        }
        let unlocked = state::unlocked_path(&locked, &self.config.locked_suffix);
        if self.fs.exists(&unlocked) {
            return Err(LockError::DestinationExists(unlocked));
        }

        let ciphertext = self.read(&locked)?;
        let plaintext = self.cipher.decrypt_with(&ciphertext, &passphrase)?;

        self.commit(&locked, &unlocked, &plaintext)?;
        info!(from = %locked.display(), to = %unlocked.display(), "unlocked");
        self.audit
            .append(AuditRecord::now(Operation::Unlock, &locked, &unlocked));
        Ok(unlocked)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, LockError> {
        self.fs.read(path).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn commit(&self, original: &Path, target: &Path, contents: &[u8]) -> Result<(), LockError> {
        let backup = state::append_suffix(original, &self.config.backup_suffix);
        safe_replace(
            &self.fs,
            &Replacement {
                original,
                target,
                backup: &backup,
                contents,
            },
        )
    }
}
