//! Low-level cryptographic operations.
//!
//! This module and `keys` are the only places in the crate that touch the
//! primitives directly. Everything else encrypts and decrypts through the
//! functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::LockError;

/// The AEAD algorithm used throughout marklock.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of a derived key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// A source of cryptographically secure random bytes.
///
/// Injected into [`crate::Cipher`] so tests can substitute a failing or
/// recording source. Production code uses [`SystemRandomSource`].
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), LockError>;
}

/// The operating system's CSPRNG, via `ring::rand::SystemRandom`.
#[derive(Debug)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    /// Wrap a fresh `SystemRandom`.
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), LockError> {
        self.rng
            .fill(dest)
            .map_err(|_| LockError::Crypto("randomness source failed"))
    }
}

/// Generate a fresh nonce for a single encryption.
pub(crate) fn generate_nonce(rng: &dyn RandomSource) -> Result<[u8; NONCE_LEN], LockError> {
    let mut buf = [0u8; NONCE_LEN];
    rng.fill(&mut buf)?;
    Ok(buf)
}

fn sealing_key(key_bytes: &[u8; KEY_LEN]) -> Result<LessSafeKey, LockError> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes)
        .map_err(|_| LockError::Crypto("cipher rejected the key"))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under AES-256-GCM, binding `aad` as associated data.
///
/// Returns `ciphertext || tag`. The nonce is not included; the caller owns
/// the framing.
pub(crate) fn seal(
    key_bytes: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, LockError> {
    let key = sealing_key(key_bytes)?;

    // Sealing happens in place; if it fails the buffer still holds plaintext.
    let mut in_out = Zeroizing::new(Vec::with_capacity(plaintext.len() + TAG_LEN));
    in_out.extend_from_slice(plaintext);

    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce),
        Aad::from(aad),
        &mut *in_out,
    )
    .map_err(|_| LockError::Crypto("encryption failed"))?;

    Ok(std::mem::take(&mut *in_out))
}

/// Decrypt `ciphertext || tag` produced by [`seal`] with the same key,
/// nonce and associated data.
///
/// Any mismatch (wrong key, altered ciphertext, altered `aad`, truncation)
/// fails the GCM check. The caller receives no partial plaintext.
pub(crate) fn open(
    key_bytes: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, LockError> {
    let key = sealing_key(key_bytes).map_err(|_| LockError::WrongPassphraseOrCorrupted)?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::from(aad), &mut in_out)
        .map_err(|_| LockError::WrongPassphraseOrCorrupted)?
        .len();

    in_out.truncate(plaintext_len);
    Ok(in_out)
}
