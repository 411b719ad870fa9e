//! DH-style oblivious PRF over the randomizable encryption layer.
//!
//! `F_k(x) = H(x, sid)^k`, evaluated homomorphically on ciphertexts: the
//! input owner blinds `H(x, sid)` by encrypting it under the blinding key,
//! the key holder raises both ciphertext components to `k` and
//! re-randomizes (mandatory for unlinkability), and the input owner
//! unblinds by decrypting. Also holds the HKDF derivation of AEAD keys
//! from group elements.

use crate::error::{Error, Result};
use crate::group::{self, Point, Scalar};
use crate::pke::{self, Ciphertext, Message};
use crate::symmetric::{SymmetricKey, KEY_LEN};
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;

/// An OPRF key, a uniform scalar.
#[derive(Clone, Copy)]
pub struct OprfKey(pub(crate) Scalar);

/// Sample a fresh OPRF key.
pub fn key_gen<RNG: CryptoRng + Rng>(rng: &mut RNG) -> OprfKey {
    OprfKey(Scalar::random(rng))
}

/// Blind an input for evaluation: encrypt `H(input, sid)` under the
/// blinding key `bpk`.
pub fn blind<RNG: CryptoRng + Rng>(
    bpk: &Point,
    input: &[u8],
    sid: &[u8],
    rng: &mut RNG,
) -> Result<Ciphertext> {
    let hashed = group::hash_to_point(input, sid)?;
    Ok(pke::encrypt(bpk, &Message::from_point(hashed), rng))
}

/// Evaluate the PRF on a blinded input: raise both components to the key
/// and re-randomize so repeated evaluations are unlinkable.
pub fn eval<RNG: CryptoRng + Rng>(
    key: &OprfKey,
    bpk: &Point,
    ct: &Ciphertext,
    rng: &mut RNG,
) -> Ciphertext {
    let exponentiated = Ciphertext {
        c0: ct.c0.scalar_exp(&key.0),
        c1: ct.c1.scalar_exp(&key.0),
    };
    pke::rerand(bpk, &exponentiated, rng)
}

/// Unblind an evaluated ciphertext with the blinding secret key.
pub fn unblind(bsk: &Scalar, ct: &Ciphertext) -> Message {
    pke::decrypt(bsk, ct)
}

/// Derive an AEAD key from a group element by HKDF-SHA256 over its
/// compressed encoding, with the session id as the info string.
pub fn key_from_point(point: &Point, sid: &[u8]) -> Result<SymmetricKey> {
    let hk = Hkdf::<Sha256>::new(None, &point.to_bytes());
    let mut key = [0u8; KEY_LEN];
    hk.expand(sid, &mut key)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(SymmetricKey(key))
}

/// Sample a uniform group element and derive its AEAD key.
pub fn random_key_from_point<RNG: CryptoRng + Rng>(
    sid: &[u8],
    rng: &mut RNG,
) -> Result<(Point, SymmetricKey)> {
    let point = Point::random(rng);
    let key = key_from_point(&point, sid)?;
    Ok((point, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SID: [u8; 32] = [3u8; 32];

    #[test]
    fn test_blind_eval_unblind() {
        let mut rng = StdRng::from_entropy();
        let (sk, pk) = pke::key_gen(&mut rng);
        let key = key_gen(&mut rng);

        let blinded = blind(&pk.bpk, b"uid-42", &SID, &mut rng).unwrap();
        let evaluated = eval(&key, &pk.bpk, &blinded, &mut rng);
        let output = unblind(&sk.bsk, &evaluated);

        let expected = group::hash_to_point(b"uid-42", &SID)
            .unwrap()
            .scalar_exp(&key.0);
        assert_eq!(*output.as_point(), expected);
    }

    #[test]
    fn test_deterministic_across_blindings() {
        // Two independent blindings of the same input evaluate to the same
        // PRF output; a different input does not.
        let mut rng = StdRng::from_entropy();
        let (sk, pk) = pke::key_gen(&mut rng);
        let key = key_gen(&mut rng);

        let out = |input: &[u8], rng: &mut StdRng| {
            let blinded = blind(&pk.bpk, input, &SID, rng).unwrap();
            unblind(&sk.bsk, &eval(&key, &pk.bpk, &blinded, rng)).point_bytes()
        };

        assert_eq!(out(b"uid-1", &mut rng), out(b"uid-1", &mut rng));
        assert_ne!(out(b"uid-1", &mut rng), out(b"uid-2", &mut rng));
    }

    #[test]
    fn test_eval_rerandomizes() {
        let mut rng = StdRng::from_entropy();
        let (_, pk) = pke::key_gen(&mut rng);
        let key = key_gen(&mut rng);

        let blinded = blind(&pk.bpk, b"uid", &SID, &mut rng).unwrap();
        let a = eval(&key, &pk.bpk, &blinded, &mut rng);
        let b = eval(&key, &pk.bpk, &blinded, &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_from_point_deterministic() {
        let mut rng = StdRng::from_entropy();
        let point = Point::random(&mut rng);

        let a = key_from_point(&point, &SID).unwrap();
        let b = key_from_point(&point, &SID).unwrap();
        assert_eq!(a, b);

        let other_sid = [4u8; 32];
        assert_ne!(a, key_from_point(&point, &other_sid).unwrap());
    }

    #[test]
    fn test_random_key_from_point_consistent() {
        let mut rng = StdRng::from_entropy();
        let (point, key) = random_key_from_point(&SID, &mut rng).unwrap();
        assert_eq!(key, key_from_point(&point, &SID).unwrap());
    }
}
