//! # Multi-party private join (MPPJ)
//!
//! Two or more data sources, one helper and one receiver cooperate so the
//! receiver learns the inner join of the sources' private key–value tables
//! on a shared identifier column and nothing else, while the helper learns
//! neither identifiers nor payloads.
//!
//! The pipeline: each source blinds its identifiers under the receiver's
//! OPRF blinding key and encrypts its payloads under the receiver's
//! encryption key ([`party::DataSource`]); the helper applies a
//! session-scoped OPRF to every blinded identifier, encrypts every payload
//! under a fresh per-row key wrapped in an n-of-n blinded form, and
//! shuffles the pooled rows ([`party::Helper`]); the receiver groups rows
//! by their now-pseudonymous identifier, drops groups missing a source,
//! reassembles the row keys from the sources' hints and materializes the
//! join ([`party::Receiver`]).
//!
//! The protocol assumes honest-but-curious parties and a non-colluding
//! helper. All group arithmetic is over NIST P-256.

#![warn(missing_docs)]

pub mod error;
pub mod group;
pub mod oprf;
pub mod party;
pub mod pke;
pub mod session;
pub mod symmetric;
pub mod table;
pub mod table_utils;

pub use error::Error;
pub use party::{DataSource, Helper, Receiver};
pub use session::{PartyId, Session, SessionId};
pub use table::{EncTable, EncTableWithHint, JoinTable, TablePlain};
