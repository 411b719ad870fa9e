//! Error types surfaced by the join protocol.

use thiserror::Error;

/// Errors surfaced by the protocol core.
///
/// Every variant is fatal to the operation that produced it; nothing is
/// retried internally. An empty intersection is a success value, never an
/// error.
#[derive(Error, Debug)]
pub enum Error {
    /// Session parameters are unusable (arity, role collision, source list).
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// A payload value exceeds the message embedding capacity.
    #[error("value of {len} bytes exceeds the {max}-byte embedding capacity")]
    ValueTooLong {
        /// Length of the offending value.
        len: usize,
        /// Maximum number of bytes a message point can carry.
        max: usize,
    },

    /// A serialized point or ciphertext could not be decoded.
    #[error("bad encoding: {0}")]
    BadEncoding(String),

    /// Authenticated decryption failed. Evidence of corruption or attack.
    #[error("authenticated decryption failed")]
    AeadFailure,

    /// A decrypted source index does not name a session source.
    #[error("source index {index} out of range for {sources} sources")]
    InvalidSourceIndex {
        /// The decrypted index.
        index: usize,
        /// Number of sources in the session.
        sources: usize,
    },

    /// The helper's pad-key shares were not set up before streaming.
    #[error("pad-key shares not initialized")]
    NoncesNotInitialized,

    /// A join-row insert referenced a source id that is not a column.
    #[error("source id {0} is not part of the join")]
    UnknownSource(String),

    /// The hash-to-curve map rejected its input.
    #[error("hash-to-curve: {0}")]
    HashToCurve(String),

    /// HKDF rejected the requested output.
    #[error("key derivation: {0}")]
    KeyDerivation(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
