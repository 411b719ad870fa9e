//! The receiver role: group converted rows by pseudonym, reconstruct row
//! keys from the sources' hints and materialize the join.

use crate::error::{Error, Result};
use crate::group::{self, Point};
use crate::oprf;
use crate::party::worker_count;
use crate::pke::{self, PublicKey, SecretKey};
use crate::session::{PartyId, Session, SessionId};
use crate::symmetric;
use crate::table::{EncRowWithHint, EncTableWithHint, JoinTable};
use crossbeam::channel;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

/// The receiver party in a join session. Its main method is
/// [`Receiver::join_tables`], which extracts the join from the helper's
/// converted batch.
pub struct Receiver {
    sid: SessionId,
    source_ids: Vec<PartyId>,
    sk: SecretKey,
    pk: PublicKey,
}

impl Receiver {
    /// Create a receiver for the given session from its secret key.
    pub fn new(sess: &Session, sk: SecretKey) -> Receiver {
        Receiver {
            sid: *sess.id(),
            source_ids: sess.sources().to_vec(),
            sk,
            pk: *sess.receiver_pk(),
        }
    }

    /// The receiver's public key, as distributed in the session.
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Extract the join from a converted batch.
    pub fn join_tables(&self, table: EncTableWithHint) -> Result<JoinTable> {
        let (tx, rx) = channel::unbounded();
        for row in table {
            tx.send(row).unwrap();
        }
        drop(tx);

        self.join_tables_stream(rx, None)
    }

    /// Streaming version of [`Receiver::join_tables`]: pull converted rows
    /// from `rows` until the producer closes the channel. Two parallel
    /// phases: bucket rows by unblinded pseudonym, then decrypt every full
    /// bucket into one join row. Output row order is unspecified.
    pub fn join_tables_stream(
        &self,
        rows: channel::Receiver<EncRowWithHint>,
        workers: Option<usize>,
    ) -> Result<JoinTable> {
        let workers = worker_count(workers);

        let groups = Mutex::new(HashMap::<Vec<u8>, Vec<EncRowWithHint>>::new());
        thread::scope(|s| {
            for _ in 0..workers {
                let rows = rows.clone();
                let groups = &groups;
                s.spawn(move || {
                    while let Ok(row) = rows.recv() {
                        let pseudonym = oprf::unblind(&self.sk.bsk, &row.cnyme).point_bytes();
                        groups
                            .lock()
                            .unwrap()
                            .entry(pseudonym)
                            .or_default()
                            .push(row);
                    }
                });
            }
        });

        self.intersect_hints(groups.into_inner().unwrap(), workers)
    }

    /// Decrypt every bucket of exactly one row per source; smaller or
    /// larger buckets belong to identifiers missing from some source and
    /// are dropped.
    fn intersect_hints(
        &self,
        groups: HashMap<Vec<u8>, Vec<EncRowWithHint>>,
        workers: usize,
    ) -> Result<JoinTable> {
        let n = self.source_ids.len();
        let join = Mutex::new(JoinTable::new(&self.source_ids));
        let first_err = Mutex::new(None);

        let (tx, rx) = channel::unbounded::<Vec<EncRowWithHint>>();
        thread::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                let join = &join;
                let first_err = &first_err;
                s.spawn(move || {
                    while let Ok(group) = rx.recv() {
                        let res = self
                            .decrypt_group(&group)
                            .and_then(|values| join.lock().unwrap().insert(values));
                        if let Err(e) = res {
                            let mut slot = first_err.lock().unwrap();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                        }
                    }
                });
            }

            for (_, group) in groups {
                if group.len() == n {
                    tx.send(group).unwrap();
                }
            }
            drop(tx);
        });

        if let Some(e) = first_err.into_inner().unwrap() {
            return Err(e);
        }
        Ok(join.into_inner().unwrap())
    }

    /// Reconstruct the blinding mask from the group's hints, recover each
    /// row's key point, and decrypt each payload to its source's value.
    fn decrypt_group(&self, group: &[EncRowWithHint]) -> Result<HashMap<PartyId, String>> {
        let unblinded: Vec<(&[u8], pke::Message, pke::Message)> = group
            .iter()
            .map(|row| {
                (
                    row.cval.as_slice(),
                    oprf::unblind(&self.sk.bsk, &row.cval_key),
                    oprf::unblind(&self.sk.bsk, &row.chint),
                )
            })
            .collect();

        // product of the hint shares: nyme^padKey, the same for every row
        let hints: Vec<Point> = unblinded
            .iter()
            .map(|(_, _, hint)| *hint.as_point())
            .collect();
        let inv_mask = group::mul_batched(&hints).invert();

        let mut out = HashMap::with_capacity(group.len());
        for (cval, blinded_key, _) in &unblinded {
            let key_point = blinded_key.as_point().mul(&inv_mask);
            let key = oprf::key_from_point(&key_point, self.sid.as_bytes())?;

            let plaintext = symmetric::decrypt(&key, cval)?;
            if plaintext.is_empty() {
                return Err(Error::BadEncoding("empty decrypted row payload".into()));
            }

            let index = plaintext[0] as usize;
            if index >= self.source_ids.len() {
                return Err(Error::InvalidSourceIndex {
                    index,
                    sources: self.source_ids.len(),
                });
            }

            let cts = pke::deserialize_ciphertexts(&plaintext[1..])?;
            let data = pke::decrypt_vector(&self.sk.esk, &cts)?;
            let value = String::from_utf8(data)
                .map_err(|_| Error::BadEncoding("row value is not valid UTF-8".into()))?;

            out.insert(self.source_ids[index].clone(), value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::{DataSource, Helper};
    use crate::table::TablePlain;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (Session, Receiver, Helper, DataSource) {
        let mut rng = StdRng::from_entropy();
        let (sk, pk) = pke::key_gen(&mut rng);
        let sess = Session::new(
            vec![PartyId::from("s1"), PartyId::from("s2")],
            PartyId::from("helper"),
            PartyId::from("receiver"),
            pk,
        )
        .unwrap();
        let receiver = Receiver::new(&sess, sk);
        let helper = Helper::new(&sess, &mut rng);
        let source = DataSource::new(&sess);
        (sess, receiver, helper, source)
    }

    #[test]
    fn test_partial_groups_are_dropped() {
        let (_, receiver, helper, source) = setup();

        // "only-s1" appears at one source only and must not survive
        let mut tables = HashMap::new();
        tables.insert(
            PartyId::from("s1"),
            source
                .prepare(&TablePlain::from_rows(&["shared", "only-s1"], &["a", "b"]))
                .unwrap(),
        );
        tables.insert(
            PartyId::from("s2"),
            source
                .prepare(&TablePlain::from_rows(&["shared"], &["c"]))
                .unwrap(),
        );

        let joined = receiver.join_tables(helper.convert(&tables).unwrap()).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows()[0], vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_corrupted_payload_aborts_join() {
        let (_, receiver, helper, source) = setup();

        let mut tables = HashMap::new();
        for id in ["s1", "s2"] {
            tables.insert(
                PartyId::from(id),
                source
                    .prepare(&TablePlain::from_rows(&["shared"], &["v"]))
                    .unwrap(),
            );
        }

        let mut converted = helper.convert(&tables).unwrap();
        let last = converted[0].cval.len() - 1;
        converted[0].cval[last] ^= 1;

        assert!(matches!(
            receiver.join_tables(converted),
            Err(Error::AeadFailure)
        ));
    }
}
