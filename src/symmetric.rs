//! Authenticated symmetric encryption for converted row payloads.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per encryption. A
//! symmetric ciphertext is `nonce || body || tag` as emitted by the AEAD;
//! it is length-delimited by whatever carries it, so no framing is added.

use crate::error::{Error, Result};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
#[allow(unused_imports)]
use rand::{CryptoRng, Rng, RngCore};

/// AEAD key length in bytes.
pub const KEY_LEN: usize = 32;

/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A derived AEAD key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymmetricKey(pub(crate) [u8; KEY_LEN]);

/// An AEAD ciphertext, `nonce || body || tag`.
pub type SymmetricCiphertext = Vec<u8>;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt<RNG: CryptoRng + Rng>(
    key: &SymmetricKey,
    plaintext: &[u8],
    rng: &mut RNG,
) -> Result<SymmetricCiphertext> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key.0));

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let body = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| Error::AeadFailure)?;

    let mut out = Vec::with_capacity(NONCE_LEN + body.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt a [`SymmetricCiphertext`]; fails on any nonce or tag
/// corruption.
pub fn decrypt(key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::AeadFailure);
    }
    let (nonce, body) = ciphertext.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key.0));
    cipher
        .decrypt(GenericArray::from_slice(nonce), body)
        .map_err(|_| Error::AeadFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_key(rng: &mut StdRng) -> SymmetricKey {
        let mut key = [0u8; KEY_LEN];
        rng.fill_bytes(&mut key);
        SymmetricKey(key)
    }

    #[test]
    fn test_roundtrip() {
        let mut rng = StdRng::from_entropy();
        let key = random_key(&mut rng);

        let ct = encrypt(&key, b"payload bytes", &mut rng).unwrap();
        assert_eq!(ct.len(), NONCE_LEN + b"payload bytes".len() + TAG_LEN);
        assert_eq!(decrypt(&key, &ct).unwrap(), b"payload bytes");
    }

    #[test]
    fn test_corruption_rejected() {
        let mut rng = StdRng::from_entropy();
        let key = random_key(&mut rng);
        let ct = encrypt(&key, b"payload", &mut rng).unwrap();

        // flip one bit in every region: nonce, body, tag
        for idx in [0, NONCE_LEN, ct.len() - 1] {
            let mut bad = ct.clone();
            bad[idx] ^= 1;
            assert!(matches!(decrypt(&key, &bad), Err(Error::AeadFailure)));
        }

        // truncation
        assert!(matches!(
            decrypt(&key, &ct[..NONCE_LEN + TAG_LEN - 1]),
            Err(Error::AeadFailure)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let mut rng = StdRng::from_entropy();
        let key = random_key(&mut rng);
        let other = random_key(&mut rng);

        let ct = encrypt(&key, b"payload", &mut rng).unwrap();
        assert!(matches!(decrypt(&other, &ct), Err(Error::AeadFailure)));
    }

    #[test]
    fn test_nonces_fresh_per_call() {
        let mut rng = StdRng::from_entropy();
        let key = random_key(&mut rng);

        let a = encrypt(&key, b"payload", &mut rng).unwrap();
        let b = encrypt(&key, b"payload", &mut rng).unwrap();
        assert_ne!(a, b);
    }
}
