//! Passphrase-level encryption of whole in-memory buffers.
//!
//! # Layout of an encrypted file (format version 1)
//! ```text
//! [ magic "BMLK" (4) ][ version (1) ][ m_cost (4) ][ t_cost (4) ][ p_cost (4) ]
//! [ salt (16) ][ nonce (12) ][ ciphertext + GCM tag (N + 16) ]
//! ```
//! Integers are little-endian. The whole 45-byte header is bound as AEAD
//! associated data, so altering any byte of the file fails authentication.

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::{self, RandomSource, SystemRandomSource, NONCE_LEN};
use crate::error::LockError;
use crate::keys::{self, KdfParams, Passphrase, SALT_LEN};

/// Marker at the start of every locked file.
pub const MAGIC: &[u8; 4] = b"BMLK";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header preceding the ciphertext.
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 3 * 4 + SALT_LEN + NONCE_LEN;

/// Passphrase-based authenticated encryption of byte buffers.
///
/// Holds the KDF cost used for new encryptions and the random source for
/// salts and nonces. Decryption reads the cost from the file header.
pub struct Cipher {
    params: KdfParams,
    rng: Box<dyn RandomSource>,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").field("params", &self.params).finish()
    }
}

impl Default for Cipher {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl Cipher {
    /// A cipher drawing randomness from the operating system.
    pub fn new(params: KdfParams) -> Self {
        Self::with_rng(params, Box::new(SystemRandomSource::new()))
    }

    /// A cipher drawing randomness from `rng`.
    pub fn with_rng(params: KdfParams, rng: Box<dyn RandomSource>) -> Self {
        Self { params, rng }
    }

    /// The KDF cost written into headers of new ciphertexts.
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt `plaintext` under `passphrase`.
    ///
    /// Every call draws a fresh salt and nonce, so encrypting the same input
    /// twice yields two different outputs.
    pub fn encrypt(&self, plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>, LockError> {
        let passphrase = Passphrase::new(passphrase)?;
        self.encrypt_with(plaintext, &passphrase)
    }

    pub(crate) fn encrypt_with(
        &self,
        plaintext: &[u8],
        passphrase: &Passphrase,
    ) -> Result<Vec<u8>, LockError> {
        let mut salt = [0u8; SALT_LEN];
        self.rng.fill(&mut salt)?;
        let nonce = crypto::generate_nonce(self.rng.as_ref())?;

        let key = keys::derive_key(passphrase, &salt, &self.params)?;
        let header = Header {
            params: self.params,
            salt,
            nonce,
        }
        .encode();

        let sealed = crypto::seal(key.as_bytes(), nonce, &header, plaintext)?;

        let mut output = Vec::with_capacity(HEADER_LEN + sealed.len());
        output.extend_from_slice(&header);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Decrypt a buffer produced by [`Cipher::encrypt`].
    ///
    /// Fails with `MalformedCiphertext` if the buffer cannot hold a header,
    /// and with `WrongPassphraseOrCorrupted` for everything else that goes
    /// wrong, including an unknown format and out-of-bounds KDF cost.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        passphrase: &str,
    ) -> Result<Zeroizing<Vec<u8>>, LockError> {
        let passphrase = Passphrase::new(passphrase)?;
        self.decrypt_with(ciphertext, &passphrase)
    }

    pub(crate) fn decrypt_with(
        &self,
        ciphertext: &[u8],
        passphrase: &Passphrase,
    ) -> Result<Zeroizing<Vec<u8>>, LockError> {
        if ciphertext.len() < HEADER_LEN {
            return Err(LockError::MalformedCiphertext {
                len: ciphertext.len(),
                min: HEADER_LEN,
            });
        }
        let (header_bytes, body) = ciphertext.split_at(HEADER_LEN);
        let header = Header::decode(header_bytes)?;

        let key = keys::derive_key(passphrase, &header.salt, &header.params)
            .map_err(|_| LockError::WrongPassphraseOrCorrupted)?;

        crypto::open(key.as_bytes(), header.nonce, header_bytes, body)
    }
}

struct Header {
    params: KdfParams,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

impl Header {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(MAGIC);
        put(&[FORMAT_VERSION]);
        put(&self.params.m_cost.to_le_bytes());
        put(&self.params.t_cost.to_le_bytes());
        put(&self.params.p_cost.to_le_bytes());
        put(&self.salt);
        put(&self.nonce);
        out
    }

    /// Parse a header. Any unrecognised content is reported as an
    /// authentication failure, never as a distinct error.
    fn decode(bytes: &[u8]) -> Result<Self, LockError> {
        let mut reader = Reader { bytes, at: 0 };
        if reader.take::<4>()? != *MAGIC || reader.take::<1>()? != [FORMAT_VERSION] {
            return Err(LockError::WrongPassphraseOrCorrupted);
        }
        let params = KdfParams {
            m_cost: u32::from_le_bytes(reader.take()?),
            t_cost: u32::from_le_bytes(reader.take()?),
            p_cost: u32::from_le_bytes(reader.take()?),
        };
        params
            .check()
            .map_err(|_| LockError::WrongPassphraseOrCorrupted)?;

        Ok(Self {
            params,
            salt: reader.take()?,
            nonce: reader.take()?,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], LockError> {
        let chunk = self
            .bytes
            .get(self.at..self.at + N)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(LockError::WrongPassphraseOrCorrupted)?;
        self.at += N;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: KdfParams = KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    };

    struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), LockError> {
            Err(LockError::Crypto("randomness source failed"))
        }
    }

    #[test]
    fn test_header_len() {
        assert_eq!(HEADER_LEN, 45);
    }

    #[test]
    fn test_layout() {
        let cipher = Cipher::new(CHEAP);
        let out = cipher.encrypt(b"hello", "swordfish").unwrap();
        assert_eq!(out.len(), HEADER_LEN + 5 + crypto::TAG_LEN);
        assert_eq!(&out[..4], MAGIC);
        assert_eq!(out[4], FORMAT_VERSION);
        assert_eq!(&out[5..9], &cipher.params().m_cost.to_le_bytes());
    }

    #[test]
    fn test_header_roundtrip() {
        let header = Header {
            params: CHEAP,
            salt: [9u8; SALT_LEN],
            nonce: [4u8; NONCE_LEN],
        };
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded.params, CHEAP);
        assert_eq!(decoded.salt, [9u8; SALT_LEN]);
        assert_eq!(decoded.nonce, [4u8; NONCE_LEN]);
    }

    #[test]
    fn test_short_buffer_is_malformed() {
        let cipher = Cipher::new(CHEAP);
        let err = cipher.decrypt(&[0u8; HEADER_LEN - 1], "k").unwrap_err();
        assert!(matches!(err, LockError::MalformedCiphertext { len: 44, min: 45 }));
    }

    #[test]
    fn test_oversized_cost_rejected_without_derivation() {
        let cipher = Cipher::new(CHEAP);
        let mut out = cipher.encrypt(b"hello", "k").unwrap();
        out[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = cipher.decrypt(&out, "k").unwrap_err();
        assert!(matches!(err, LockError::WrongPassphraseOrCorrupted));
    }

    #[test]
    fn test_unknown_version_is_opaque() {
        let cipher = Cipher::new(CHEAP);
        let mut out = cipher.encrypt(b"hello", "k").unwrap();
        out[4] = 2;
        let err = cipher.decrypt(&out, "k").unwrap_err();
        assert!(matches!(err, LockError::WrongPassphraseOrCorrupted));
    }

    #[test]
    fn test_broken_random_source() {
        let cipher = Cipher::with_rng(CHEAP, Box::new(BrokenRandom));
        let err = cipher.encrypt(b"hello", "k").unwrap_err();
        assert!(matches!(err, LockError::Crypto(_)));
    }

    #[test]
    fn test_empty_passphrase() {
        let cipher = Cipher::new(CHEAP);
        assert!(matches!(
            cipher.encrypt(b"hello", ""),
            Err(LockError::PassphraseEmpty)
        ));
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let cipher = Cipher::new(CHEAP);
        let out = cipher.encrypt(b"", "k").unwrap();
        assert!(cipher.decrypt(&out, "k").unwrap().is_empty());
    }

    #[test]
    fn test_decrypt_uses_header_cost() {
        let locked = Cipher::new(KdfParams { m_cost: 512, ..CHEAP })
            .encrypt(b"hello", "k")
            .unwrap();
        let opened = Cipher::new(CHEAP).decrypt(&locked, "k").unwrap();
        assert_eq!(&opened[..], b"hello");
    }
}
