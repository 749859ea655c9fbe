//! Locking configuration.
//!
//! Configuration reaches the locking code only through [`crate::Locker`];
//! there is no process-wide state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LockError;
use crate::keys::KdfParams;

/// Default suffix marking a locked file.
pub const DEFAULT_LOCKED_SUFFIX: &str = ".enc";

/// Default suffix for the transient backup taken during replacement.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Settings for a [`crate::Locker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Appended to a file's name when it is locked.
    pub locked_suffix: String,
    /// Appended to a file's name for the backup taken while replacing it.
    pub backup_suffix: String,
    /// Argon2id cost for new encryptions.
    pub kdf: KdfParams,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            locked_suffix: DEFAULT_LOCKED_SUFFIX.to_owned(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_owned(),
            kdf: KdfParams::default(),
        }
    }
}

impl LockConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, LockError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LockError::Config(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check the suffixes and KDF cost.
    pub fn validate(&self) -> Result<(), LockError> {
        check_suffix("locked_suffix", &self.locked_suffix)?;
        check_suffix("backup_suffix", &self.backup_suffix)?;
        if self.locked_suffix == self.backup_suffix {
            return Err(LockError::Config(
                "locked_suffix and backup_suffix must differ".to_owned(),
            ));
        }
        self.kdf
            .check()
            .map_err(|e| LockError::Config(format!("kdf: {e}")))
    }
}

fn check_suffix(field: &str, suffix: &str) -> Result<(), LockError> {
    if suffix.len() < 2 || !suffix.starts_with('.') {
        return Err(LockError::Config(format!(
            "{field} must be a dot followed by at least one character, got {suffix:?}"
        )));
    }
    if suffix.contains(|c: char| c == '/' || c == '\\') {
        return Err(LockError::Config(format!(
            "{field} must not contain a path separator, got {suffix:?}"
        )));
    }
    Ok(())
}
