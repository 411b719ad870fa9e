//! Session parameters shared by all protocol parties.
//!
//! A session fixes the participant set and the receiver's public key, and
//! carries a 32-byte session id that domain-separates every cryptographic
//! derivation of the run. Sessions are value-typed snapshots: each party
//! derives its private state from one and never mutates it.

use crate::error::{Error, Result};
use crate::pke::PublicKey;
use hkdf::Hkdf;
use sha2::Sha256;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Length of a session id in bytes.
pub const SESSION_ID_LEN: usize = 32;

/// Identifier of a protocol participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyId(String);

impl PartyId {
    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartyId {
    fn from(id: &str) -> PartyId {
        PartyId(id.to_string())
    }
}

impl From<String> for PartyId {
    fn from(id: String) -> PartyId {
        PartyId(id)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 32-byte session id binding all derivations of one protocol run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Derive a fresh session id from the participant set and a random
    /// nonce: `HKDF-SHA256(ikm = uuid, info = "n|helper|receiver|src…")`.
    pub fn derive(sources: &[PartyId], helper: &PartyId, receiver: &PartyId) -> Result<SessionId> {
        let nonce = Uuid::new_v4().to_string();

        let mut info = format!("{}|{}|{}", sources.len(), helper, receiver);
        for source in sources {
            info.push('|');
            info.push_str(source.as_str());
        }

        let hk = Hkdf::<Sha256>::new(None, nonce.as_bytes());
        let mut sid = [0u8; SESSION_ID_LEN];
        hk.expand(info.as_bytes(), &mut sid)
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(SessionId(sid))
    }

    /// View as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Public parameters of one join session.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    sources: Vec<PartyId>,
    helper: PartyId,
    receiver: PartyId,
    receiver_pk: PublicKey,
}

impl Session {
    /// Create a session, deriving a fresh session id from the
    /// participants.
    pub fn new(
        sources: Vec<PartyId>,
        helper: PartyId,
        receiver: PartyId,
        receiver_pk: PublicKey,
    ) -> Result<Session> {
        let id = SessionId::derive(&sources, &helper, &receiver)?;
        Session::with_id(id, sources, helper, receiver, receiver_pk)
    }

    /// Create a session from an externally agreed session id. Sessions are
    /// distributed out-of-band, so all parties must construct the same
    /// record.
    pub fn with_id(
        id: SessionId,
        sources: Vec<PartyId>,
        helper: PartyId,
        receiver: PartyId,
        receiver_pk: PublicKey,
    ) -> Result<Session> {
        if sources.len() < 2 {
            return Err(Error::InvalidSession(
                "at least two sources required".into(),
            ));
        }
        if sources.len() > 255 {
            return Err(Error::InvalidSession(format!(
                "{} sources exceed the one-byte source index",
                sources.len()
            )));
        }
        if helper.as_str().eq_ignore_ascii_case(receiver.as_str()) {
            return Err(Error::InvalidSession(
                "helper and receiver must be distinct".into(),
            ));
        }
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source) {
                return Err(Error::InvalidSession(format!(
                    "duplicate source id {source}"
                )));
            }
        }

        Ok(Session {
            id,
            sources,
            helper,
            receiver,
            receiver_pk,
        })
    }

    /// The session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The data sources, in the column order of the final join.
    pub fn sources(&self) -> &[PartyId] {
        &self.sources
    }

    /// The helper's id.
    pub fn helper(&self) -> &PartyId {
        &self.helper
    }

    /// The receiver's id.
    pub fn receiver(&self) -> &PartyId {
        &self.receiver
    }

    /// The receiver's public key.
    pub fn receiver_pk(&self) -> &PublicKey {
        &self.receiver_pk
    }
}
