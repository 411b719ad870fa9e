//! The helper role: pseudonymize identifiers and wrap row keys so they
//! only become reconstructible once every source contributed.

use crate::error::{Error, Result};
use crate::group::Scalar;
use crate::oprf::{self, OprfKey};
use crate::party::worker_count;
use crate::pke::{self, Ciphertext, PublicKey};
use crate::session::{PartyId, Session, SessionId};
use crate::symmetric::{self, SymmetricCiphertext};
use crate::table::{EncRow, EncRowWithHint, EncTable, EncTableWithHint};
use crossbeam::channel;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

/// One unit of helper work: an encrypted row tagged with the source it
/// came from.
pub struct ConvertRowTask {
    /// The source-encrypted row.
    pub row: EncRow,
    /// Which source produced it.
    pub source_id: PartyId,
}

/// The helper party in a join session. Its main method is
/// [`Helper::convert`], which turns the sources' encrypted tables into the
/// blinded-and-hinted form the receiver can join. All key material is
/// sampled at construction and lives for one session; a helper can convert
/// any number of batches under that session.
pub struct Helper {
    sid: SessionId,
    source_indices: HashMap<PartyId, usize>,
    rpk: PublicKey,

    conv_k: OprfKey,
    pad_key_shares: Vec<Scalar>,
    pad_key: Scalar,
}

impl Helper {
    /// Create a helper for the given session, sampling its conversion key
    /// and one pad-key share per source.
    pub fn new<RNG: CryptoRng + Rng>(sess: &Session, rng: &mut RNG) -> Helper {
        let source_indices = sess
            .sources()
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        let (pad_key_shares, pad_key) = gen_pad_key_shares(sess.sources().len(), rng);

        Helper {
            sid: *sess.id(),
            source_indices,
            rpk: *sess.receiver_pk(),
            conv_k: oprf::key_gen(rng),
            pad_key_shares,
            pad_key,
        }
    }

    /// Convert the sources' encrypted tables into one shuffled batch for
    /// the receiver.
    pub fn convert(&self, tables: &HashMap<PartyId, EncTable>) -> Result<EncTableWithHint> {
        let (tx, rx) = channel::unbounded();
        for (source_id, table) in tables {
            for row in table {
                tx.send(ConvertRowTask {
                    row: row.clone(),
                    source_id: source_id.clone(),
                })
                .unwrap();
            }
        }
        drop(tx);

        self.convert_stream(rx, None)
    }

    /// Streaming version of [`Helper::convert`]: pull tagged rows from
    /// `tasks` until the producer closes the channel, convert them on
    /// `workers` threads, then shuffle the pooled result once. The input
    /// channel is fully drained even when a row fails; the first error is
    /// returned after the drain.
    pub fn convert_stream(
        &self,
        tasks: channel::Receiver<ConvertRowTask>,
        workers: Option<usize>,
    ) -> Result<EncTableWithHint> {
        if self.pad_key_shares.is_empty() {
            return Err(Error::NoncesNotInitialized);
        }

        let workers = worker_count(workers);
        let converted = Mutex::new(Vec::new());
        let first_err = Mutex::new(None);

        thread::scope(|s| {
            for _ in 0..workers {
                let tasks = tasks.clone();
                let converted = &converted;
                let first_err = &first_err;
                s.spawn(move || {
                    let mut rng = StdRng::from_entropy();
                    while let Ok(task) = tasks.recv() {
                        match self.convert_row(&task.row, &task.source_id, &mut rng) {
                            Ok(row) => converted.lock().unwrap().push(row),
                            Err(e) => {
                                let mut slot = first_err.lock().unwrap();
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                            }
                        }
                    }
                });
            }
        });

        if let Some(e) = first_err.into_inner().unwrap() {
            return Err(e);
        }

        let mut converted = converted.into_inner().unwrap();
        // The shuffle unlinks output position from source and input
        // position, so its RNG must be cryptographically strong.
        converted.shuffle(&mut StdRng::from_entropy());
        Ok(converted)
    }

    /// Convert a single row received from `source_id`.
    pub fn convert_row<RNG: CryptoRng + Rng>(
        &self,
        row: &EncRow,
        source_id: &PartyId,
        rng: &mut RNG,
    ) -> Result<EncRowWithHint> {
        let tindex = *self
            .source_indices
            .get(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;

        // deterministic across sources for the same uid, unlinkable to it
        let cnyme = oprf::eval(&self.conv_k, &self.rpk.bpk, &row.cuid, rng);

        let (cval, cval_key, chint) = self.blind_and_hint(&cnyme, &row.cval, tindex, rng)?;
        Ok(EncRowWithHint {
            cnyme,
            cval,
            cval_key,
            chint,
        })
    }

    /// Encrypt the payload under a fresh row key and wrap that key so it
    /// only opens once hints from all sources are combined.
    fn blind_and_hint<RNG: CryptoRng + Rng>(
        &self,
        cnyme: &Ciphertext,
        cval: &[Ciphertext],
        tindex: usize,
        rng: &mut RNG,
    ) -> Result<(SymmetricCiphertext, Ciphertext, Ciphertext)> {
        let (rp, key) = oprf::random_key_from_point(self.sid.as_bytes(), rng)?;

        let serialized = pke::serialize_ciphertexts(&pke::rerand_vector(&self.rpk.epk, cval, rng))?;
        // the source index rides along so the receiver can place the value
        let mut plaintext = Vec::with_capacity(1 + serialized.len());
        plaintext.push(tindex as u8);
        plaintext.extend_from_slice(&serialized);
        let cval_sym = symmetric::encrypt(&key, &plaintext, rng)?;

        // encryption of nyme^padKey · rp: the row key blinded by the full pad
        let mut cval_key = oprf::eval(&OprfKey(self.pad_key), &self.rpk.bpk, cnyme, rng);
        cval_key.c1 = cval_key.c1.mul(&rp);

        // encryption of nyme^share for this source
        let chint = oprf::eval(
            &OprfKey(self.pad_key_shares[tindex]),
            &self.rpk.bpk,
            cnyme,
            rng,
        );

        Ok((cval_sym, cval_key, chint))
    }
}

/// Sample one pad-key share per source; their sum is the pad key.
fn gen_pad_key_shares<RNG: CryptoRng + Rng>(
    n_sources: usize,
    rng: &mut RNG,
) -> (Vec<Scalar>, Scalar) {
    let mut sum = Scalar::zero();
    let shares = (0..n_sources)
        .map(|_| {
            let share = Scalar::random(rng);
            sum = sum.add(&share);
            share
        })
        .collect();
    (shares, sum)
}
