//! Prime-order group layer over NIST P-256.
//!
//! Thin wrappers around the `p256` arithmetic backend exposing exactly the
//! operations the join protocol needs: the abelian group operation written
//! multiplicatively, scalar exponentiation, uniform sampling, compressed
//! SEC1 serialization and hash-to-curve with a per-session domain
//! separation tag.

use crate::error::{Error, Result};
use p256::elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::Field;
use p256::{AffinePoint, EncodedPoint, NistP256, ProjectivePoint};
use rand::{CryptoRng, Rng};
use sha2::Sha256;

/// Length of a compressed SEC1 point encoding.
pub const POINT_LEN: usize = 33;

/// Domain-separation prefix for hash-to-curve; the session id is appended.
const HASH_TO_POINT_DST_PREFIX: &[u8] = b"hash_to_element";

/// An element of the P-256 scalar field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scalar(p256::Scalar);

impl Scalar {
    /// The additive identity.
    pub fn zero() -> Scalar {
        Scalar(p256::Scalar::ZERO)
    }

    /// Build a scalar from a small integer.
    pub fn from_u64(value: u64) -> Scalar {
        Scalar(p256::Scalar::from(value))
    }

    /// Sample a uniform scalar.
    pub fn random<RNG: CryptoRng + Rng>(rng: &mut RNG) -> Scalar {
        Scalar(p256::Scalar::random(&mut *rng))
    }

    /// Scalar addition modulo the group order.
    pub fn add(&self, other: &Scalar) -> Scalar {
        Scalar(self.0 + other.0)
    }

    /// Scalar multiplication modulo the group order.
    pub fn mul(&self, other: &Scalar) -> Scalar {
        Scalar(self.0 * other.0)
    }

    /// Additive inverse.
    pub fn neg(&self) -> Scalar {
        Scalar(-self.0)
    }

    /// Multiplicative inverse; `None` for zero.
    pub fn invert(&self) -> Option<Scalar> {
        Option::<p256::Scalar>::from(self.0.invert()).map(Scalar)
    }

}

/// An element of the P-256 group, written multiplicatively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point(ProjectivePoint);

impl Point {
    /// The group generator.
    pub fn generator() -> Point {
        Point(ProjectivePoint::GENERATOR)
    }

    /// The neutral element.
    pub fn identity() -> Point {
        Point(ProjectivePoint::IDENTITY)
    }

    /// The group operation on two elements.
    pub fn mul(&self, other: &Point) -> Point {
        Point(self.0 + other.0)
    }

    /// The group inverse.
    pub fn invert(&self) -> Point {
        Point(-self.0)
    }

    /// Exponentiation by a scalar.
    pub fn scalar_exp(&self, exp: &Scalar) -> Point {
        Point(self.0 * exp.0)
    }

    /// Exponentiation of the generator by a scalar.
    pub fn base_exp(exp: &Scalar) -> Point {
        Point(ProjectivePoint::GENERATOR * exp.0)
    }

    /// Sample a uniform group element as `g^s` for a uniform scalar `s`.
    /// Cheaper than decompressing random x-coordinates.
    pub fn random<RNG: CryptoRng + Rng>(rng: &mut RNG) -> Point {
        Point::base_exp(&Scalar::random(rng))
    }

    /// Compressed SEC1 encoding. 33 bytes for every non-identity element.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_affine().to_encoded_point(true).as_bytes().to_vec()
    }

    /// Decode a compressed SEC1 encoding, rejecting anything that is not a
    /// canonical encoding of an on-curve element.
    pub fn from_bytes(bytes: &[u8]) -> Result<Point> {
        if bytes.len() != POINT_LEN {
            return Err(Error::BadEncoding(format!(
                "point encoding must be {} bytes, got {}",
                POINT_LEN,
                bytes.len()
            )));
        }
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|e| Error::BadEncoding(format!("malformed point encoding: {e}")))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| Error::BadEncoding("off-curve or non-canonical point".into()))?;
        Ok(Point(ProjectivePoint::from(affine)))
    }
}

/// Product of a slice of group elements; the identity for an empty slice.
pub fn mul_batched(points: &[Point]) -> Point {
    let mut acc = Point::identity();
    for point in points {
        acc = acc.mul(point);
    }
    acc
}

/// Hash a byte string onto the curve, domain-separated by the session id.
pub fn hash_to_point(msg: &[u8], sid: &[u8]) -> Result<Point> {
    let mut dst = Vec::with_capacity(HASH_TO_POINT_DST_PREFIX.len() + sid.len());
    dst.extend_from_slice(HASH_TO_POINT_DST_PREFIX);
    dst.extend_from_slice(sid);
    let point = NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[msg], &[dst.as_slice()])
        .map_err(|e| Error::HashToCurve(e.to_string()))?;
    Ok(Point(point))
}
