//! Properties of passphrase encryption: round-trip, freshness, rejection.

use marklock::{Cipher, KdfParams, LockError};
use proptest::prelude::*;

/// Cheap Argon2 cost so property runs stay fast. Never use outside tests.
const CHEAP: KdfParams = KdfParams {
    m_cost: 256,
    t_cost: 1,
    p_cost: 1,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 1..2048),
                 passphrase in "[ -~]{0,24}[!-~]") {
        let cipher = Cipher::new(CHEAP);
        let sealed = cipher.encrypt(&plaintext, &passphrase).unwrap();
        let opened = cipher.decrypt(&sealed, &passphrase).unwrap();
        prop_assert_eq!(&opened[..], &plaintext[..]);
    }
}

#[test]
fn test_encryption_is_not_deterministic() {
    let cipher = Cipher::new(CHEAP);
    let a = cipher.encrypt(b"hello", "swordfish").unwrap();
    let b = cipher.encrypt(b"hello", "swordfish").unwrap();

    assert_ne!(a, b);
    assert_eq!(&cipher.decrypt(&a, "swordfish").unwrap()[..], b"hello");
    assert_eq!(&cipher.decrypt(&b, "swordfish").unwrap()[..], b"hello");
}

#[test]
fn test_wrong_passphrase_rejected() {
    let cipher = Cipher::new(CHEAP);
    let sealed = cipher.encrypt(b"hello", "swordfish").unwrap();

    let err = cipher.decrypt(&sealed, "wrong-pass").unwrap_err();
    assert!(matches!(err, LockError::WrongPassphraseOrCorrupted));
}

#[test]
fn test_every_single_byte_flip_is_detected() {
    // Threat: an attacker with write access alters the file at rest.
    // Goal: any single altered byte, header included, fails authentication
    // with the same error a wrong passphrase produces.
    let cipher = Cipher::new(CHEAP);
    let sealed = cipher.encrypt(b"hello", "swordfish").unwrap();

    for i in 0..sealed.len() {
        let mut tampered = sealed.clone();
        tampered[i] ^= 0x01;
        let result = cipher.decrypt(&tampered, "swordfish");
        assert!(
            matches!(result, Err(LockError::WrongPassphraseOrCorrupted)),
            "flip at byte {i} was not rejected: {result:?}"
        );
    }
}

#[test]
fn test_truncation_is_detected() {
    let cipher = Cipher::new(CHEAP);
    let sealed = cipher.encrypt(b"hello world", "swordfish").unwrap();

    for len in [0, 10, marklock::cipher::HEADER_LEN - 1] {
        assert!(matches!(
            cipher.decrypt(&sealed[..len], "swordfish"),
            Err(LockError::MalformedCiphertext { .. })
        ));
    }
    for len in marklock::cipher::HEADER_LEN..sealed.len() {
        assert!(matches!(
            cipher.decrypt(&sealed[..len], "swordfish"),
            Err(LockError::WrongPassphraseOrCorrupted)
        ));
    }
}
