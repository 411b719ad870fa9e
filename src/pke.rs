//! Message embedding and randomizable public-key encryption.
//!
//! Messages are group elements that canonically embed a short byte string
//! in their x-coordinate: the low byte carries the length, the bytes above
//! it the data, and the remaining high bytes are random padding chosen so
//! the candidate x-coordinate decompresses to a curve point. Encryption is
//! ElGamal over the message slot, `Enc(pk, m) = (g^r, pk^r · m)`, which
//! stays decryptable after re-randomization and after the homomorphic
//! exponentiations the OPRF applies.

use crate::error::{Error, Result};
use crate::group::{Point, Scalar, POINT_LEN};
#[allow(unused_imports)]
use rand::{CryptoRng, Rng, RngCore};

/// Maximum number of bytes a message point can embed.
pub const MESSAGE_CAPACITY: usize = 30;

/// Length of a serialized ciphertext: two compressed points.
pub const CIPHERTEXT_LEN: usize = 2 * POINT_LEN;

/// Byte width of the x-coordinate of a compressed point.
const FIELD_LEN: usize = 32;

/// A group element carrying a plaintext slot of the encryption scheme.
///
/// Payload messages are built with [`Message::embed`] and recover their
/// bytes with [`Message::to_bytes`]; OPRF values wrap arbitrary points and
/// are only ever compared or serialized, never decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message(Point);

impl Message {
    /// Injectively embed up to [`MESSAGE_CAPACITY`] bytes into a group
    /// element. Retries fresh random padding until the candidate
    /// x-coordinate lands on the curve.
    pub fn embed<RNG: CryptoRng + Rng>(data: &[u8], rng: &mut RNG) -> Result<Message> {
        if data.len() > MESSAGE_CAPACITY {
            return Err(Error::ValueTooLong {
                len: data.len(),
                max: MESSAGE_CAPACITY,
            });
        }

        let pad_len = FIELD_LEN - 1 - data.len();
        let mut encoded = [0u8; POINT_LEN];
        encoded[0] = 0x02;
        encoded[1 + pad_len..FIELD_LEN].copy_from_slice(data);
        encoded[FIELD_LEN] = data.len() as u8;

        loop {
            rng.fill_bytes(&mut encoded[1..1 + pad_len]);
            if let Ok(point) = Point::from_bytes(&encoded) {
                return Ok(Message(point));
            }
        }
    }

    /// Embed a fresh 16-byte random string; returns the message together
    /// with its recoverable bytes.
    pub fn random<RNG: CryptoRng + Rng>(rng: &mut RNG) -> Result<(Message, Vec<u8>)> {
        let mut data = [0u8; 16];
        rng.fill_bytes(&mut data);
        let msg = Message::embed(&data, rng)?;
        Ok((msg, data.to_vec()))
    }

    /// Wrap an arbitrary group element as a plaintext slot.
    pub fn from_point(point: Point) -> Message {
        Message(point)
    }

    /// The underlying group element.
    pub fn as_point(&self) -> &Point {
        &self.0
    }

    /// Compressed encoding of the underlying element. Used as a grouping
    /// key for pseudonym points that are not in the embedding image.
    pub fn point_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Recover the embedded byte string; fails when the element is not in
    /// the embedding image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded = self.0.to_bytes();
        if encoded.len() != POINT_LEN {
            return Err(Error::BadEncoding(
                "message point has no x-coordinate".into(),
            ));
        }
        let x = &encoded[1..];
        let len = x[FIELD_LEN - 1] as usize;
        if len > MESSAGE_CAPACITY {
            return Err(Error::BadEncoding(
                "point outside the message embedding image".into(),
            ));
        }
        Ok(x[FIELD_LEN - 1 - len..FIELD_LEN - 1].to_vec())
    }
}

/// An ElGamal ciphertext `(g^r, pk^r · m)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    pub(crate) c0: Point,
    pub(crate) c1: Point,
}

impl Ciphertext {
    /// Serialize as `c0 || c1`, both compressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let c0 = self.c0.to_bytes();
        let c1 = self.c1.to_bytes();
        if c0.len() != POINT_LEN || c1.len() != POINT_LEN {
            return Err(Error::BadEncoding(
                "ciphertext component is the identity".into(),
            ));
        }
        let mut out = Vec::with_capacity(CIPHERTEXT_LEN);
        out.extend_from_slice(&c0);
        out.extend_from_slice(&c1);
        Ok(out)
    }

    /// Inverse of [`Ciphertext::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Ciphertext> {
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(Error::BadEncoding(format!(
                "ciphertext must be {} bytes, got {}",
                CIPHERTEXT_LEN,
                bytes.len()
            )));
        }
        Ok(Ciphertext {
            c0: Point::from_bytes(&bytes[..POINT_LEN])?,
            c1: Point::from_bytes(&bytes[POINT_LEN..])?,
        })
    }
}

/// The receiver's secret key material: the payload decryption key and the
/// OPRF blinding key.
#[derive(Clone)]
pub struct SecretKey {
    pub(crate) esk: Scalar,
    pub(crate) bsk: Scalar,
}

/// The receiver's public key material: the payload encryption key and the
/// OPRF blinding key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    /// Payload encryption key `g^esk`.
    pub epk: Point,
    /// OPRF blinding key `g^bsk`.
    pub bpk: Point,
}

/// Generate the receiver's key material: an encryption pair and an
/// OPRF-blinding pair.
pub fn key_gen<RNG: CryptoRng + Rng>(rng: &mut RNG) -> (SecretKey, PublicKey) {
    let esk = Scalar::random(rng);
    let bsk = Scalar::random(rng);
    let pk = PublicKey {
        epk: Point::base_exp(&esk),
        bpk: Point::base_exp(&bsk),
    };
    (SecretKey { esk, bsk }, pk)
}

/// Encrypt a message slot under a public key point.
pub fn encrypt<RNG: CryptoRng + Rng>(pk: &Point, msg: &Message, rng: &mut RNG) -> Ciphertext {
    let r = Scalar::random(rng);
    Ciphertext {
        c0: Point::base_exp(&r),
        c1: pk.scalar_exp(&r).mul(msg.as_point()),
    }
}

/// Decrypt a ciphertext: `m = c1 · c0^{-sk}`.
pub fn decrypt(sk: &Scalar, ct: &Ciphertext) -> Message {
    Message::from_point(ct.c1.mul(&ct.c0.scalar_exp(&sk.neg())))
}

/// Re-randomize a ciphertext under the same public key. The result
/// decrypts identically but is unlinkable to its input.
pub fn rerand<RNG: CryptoRng + Rng>(pk: &Point, ct: &Ciphertext, rng: &mut RNG) -> Ciphertext {
    let r = Scalar::random(rng);
    Ciphertext {
        c0: ct.c0.mul(&Point::base_exp(&r)),
        c1: ct.c1.mul(&pk.scalar_exp(&r)),
    }
}

/// Componentwise [`rerand`] over a vector ciphertext.
pub fn rerand_vector<RNG: CryptoRng + Rng>(
    pk: &Point,
    cts: &[Ciphertext],
    rng: &mut RNG,
) -> Vec<Ciphertext> {
    cts.iter().map(|ct| rerand(pk, ct, rng)).collect()
}

/// Decrypt a vector ciphertext and concatenate the embedded bytes of each
/// component in order.
pub fn decrypt_vector(sk: &Scalar, cts: &[Ciphertext]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for ct in cts {
        out.extend_from_slice(&decrypt(sk, ct).to_bytes()?);
    }
    Ok(out)
}

/// Serialize a vector ciphertext as a big-endian `u32` count followed by
/// the fixed-width component encodings.
pub fn serialize_ciphertexts(cts: &[Ciphertext]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + cts.len() * CIPHERTEXT_LEN);
    out.extend_from_slice(&(cts.len() as u32).to_be_bytes());
    for ct in cts {
        out.extend_from_slice(&ct.to_bytes()?);
    }
    Ok(out)
}

/// Inverse of [`serialize_ciphertexts`].
pub fn deserialize_ciphertexts(bytes: &[u8]) -> Result<Vec<Ciphertext>> {
    if bytes.len() < 4 {
        return Err(Error::BadEncoding("ciphertext vector too short".into()));
    }
    let mut count_bytes = [0u8; 4];
    count_bytes.copy_from_slice(&bytes[..4]);
    let count = u32::from_be_bytes(count_bytes) as usize;

    let body = &bytes[4..];
    if body.len() != count * CIPHERTEXT_LEN {
        return Err(Error::BadEncoding(format!(
            "ciphertext vector of count {} must carry {} bytes, got {}",
            count,
            count * CIPHERTEXT_LEN,
            body.len()
        )));
    }

    body.chunks_exact(CIPHERTEXT_LEN)
        .map(Ciphertext::from_bytes)
        .collect()
}
