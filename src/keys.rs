//! Passphrases and key derivation.
//!
//! This module owns two responsibilities:
//! 1. Turning a low-entropy passphrase into a 256-bit key with Argon2id.
//! 2. Holding secret material in types that are opaque, non-cloneable,
//!    and zeroised on drop.
//!
//! ## Derivation structure
//!
//! ```text
//! Argon2id v0x13(
//!     password = passphrase bytes (untrimmed),
//!     salt     = 16 random bytes, fresh per encryption,
//!     m, t, p  = KdfParams stored in the file header,
//!     out      = 32 bytes
//! )
//! ```

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::KEY_LEN;
use crate::error::LockError;

/// Size of the per-encryption KDF salt in bytes.
pub const SALT_LEN: usize = 16;

/// Upper bound on `m_cost` accepted from a file header (1 GiB, in KiB).
pub const MAX_M_COST: u32 = 1 << 20;

/// Upper bound on `t_cost` accepted from a file header.
pub const MAX_T_COST: u32 = 16;

/// Upper bound on `p_cost` accepted from a file header.
pub const MAX_P_COST: u32 = 16;

// ---------------------------------------------------------------------------
// Passphrase
// ---------------------------------------------------------------------------

/// A user passphrase, alive only for the duration of one call.
///
/// - Never empty: construction rejects empty and whitespace-only input.
/// - Not `Clone`, zeroised on drop, redacted in `Debug`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Passphrase {
    value: String,
}

impl Passphrase {
    /// Wrap a caller-supplied passphrase.
    ///
    /// The trimmed form is only used for the emptiness check; the key is
    /// derived from the string exactly as given.
    pub fn new(value: &str) -> Result<Self, LockError> {
        if value.trim().is_empty() {
            return Err(LockError::PassphraseEmpty);
        }
        Ok(Self {
            value: value.to_owned(),
        })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// KDF parameters
// ---------------------------------------------------------------------------

/// Argon2id cost parameters. Written into every file header so the cost can
/// be raised later without breaking files locked earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 64 MiB = 65536).
    pub m_cost: u32,
    /// Number of iterations (default: 3).
    pub t_cost: u32,
    /// Degree of parallelism (default: 1).
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Check the parameters against both argon2's minimums and our upper
    /// bounds. Headers are attacker-controlled, so this runs before any
    /// memory is committed to a derivation.
    pub fn check(&self) -> Result<(), String> {
        if self.t_cost < Params::MIN_T_COST || self.t_cost > MAX_T_COST {
            return Err(format!(
                "t_cost {} outside {}..={}",
                self.t_cost,
                Params::MIN_T_COST,
                MAX_T_COST
            ));
        }
        if self.p_cost < Params::MIN_P_COST || self.p_cost > MAX_P_COST {
            return Err(format!(
                "p_cost {} outside {}..={}",
                self.p_cost,
                Params::MIN_P_COST,
                MAX_P_COST
            ));
        }
        let min_m = Params::MIN_M_COST.max(8 * self.p_cost);
        if self.m_cost < min_m || self.m_cost > MAX_M_COST {
            return Err(format!(
                "m_cost {} outside {}..={}",
                self.m_cost, min_m, MAX_M_COST
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Derived key
// ---------------------------------------------------------------------------

/// A key derived from a passphrase and salt.
///
/// - Not `Clone`.
/// - Zeroised on drop.
/// - Raw bytes are `pub(crate)` only.
pub(crate) struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

/// Derive a key from `passphrase` and `salt` using Argon2id.
///
/// Fails with `Config` when the parameters are out of bounds and with
/// `Crypto` when argon2 itself rejects the inputs. Callers on the decrypt
/// path fold both into `WrongPassphraseOrCorrupted`.
pub(crate) fn derive_key(
    passphrase: &Passphrase,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<DerivedKey, LockError> {
    params.check().map_err(LockError::Config)?;

    let argon2_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|_| LockError::Crypto("invalid key derivation parameters"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, bytes.as_mut())
        .map_err(|_| LockError::Crypto("key derivation failed"))?;

    Ok(DerivedKey { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: KdfParams = KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    };

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(Passphrase::new(""), Err(LockError::PassphraseEmpty)));
        assert!(matches!(
            Passphrase::new(" \t\n"),
            Err(LockError::PassphraseEmpty)
        ));
    }

    #[test]
    fn test_passphrase_kept_untrimmed() {
        let p = Passphrase::new(" swordfish ").unwrap();
        assert_eq!(p.as_bytes(), b" swordfish ");
        assert_eq!(format!("{p:?}"), "Passphrase(<redacted>)");
    }

    #[test]
    fn test_derive_key_deterministic() {
        let p = Passphrase::new("password").unwrap();
        let salt = [3u8; SALT_LEN];
        let k1 = derive_key(&p, &salt, &CHEAP).unwrap();
        let k2 = derive_key(&p, &salt, &CHEAP).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_salts_different_keys() {
        let p = Passphrase::new("password").unwrap();
        let k1 = derive_key(&p, &[1u8; SALT_LEN], &CHEAP).unwrap();
        let k2 = derive_key(&p, &[2u8; SALT_LEN], &CHEAP).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_passphrases_different_keys() {
        let salt = [3u8; SALT_LEN];
        let k1 = derive_key(&Passphrase::new("one").unwrap(), &salt, &CHEAP).unwrap();
        let k2 = derive_key(&Passphrase::new("two").unwrap(), &salt, &CHEAP).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_param_bounds() {
        assert!(KdfParams::default().check().is_ok());
        assert!(CHEAP.check().is_ok());
        assert!(KdfParams { t_cost: 0, ..CHEAP }.check().is_err());
        assert!(KdfParams { t_cost: MAX_T_COST + 1, ..CHEAP }.check().is_err());
        assert!(KdfParams { p_cost: 0, ..CHEAP }.check().is_err());
        assert!(KdfParams { m_cost: MAX_M_COST + 1, ..CHEAP }.check().is_err());
        assert!(KdfParams { m_cost: 8, p_cost: 2, ..CHEAP }.check().is_err());
    }

    #[test]
    fn test_params_serialization() {
        let json = serde_json::to_string(&KdfParams::default()).unwrap();
        let parsed: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, KdfParams::default());
    }
}
