//! The data-source role: encrypt private rows for the helper.

use crate::error::Result;
use crate::oprf;
use crate::party::worker_count;
use crate::pke::{self, Message, PublicKey};
use crate::session::{Session, SessionId};
use crate::table::{EncRow, EncTable, TablePlain, TableRow};
use crossbeam::channel;
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, SeedableRng};
use std::sync::Mutex;
use std::thread;

/// A data source in a join session. Its main method is [`DataSource::prepare`],
/// which maps a plain table to the source-encrypted table shipped to the
/// helper. One instance can prepare any number of tables for its session.
pub struct DataSource {
    sid: SessionId,
    rpk: PublicKey,
}

impl DataSource {
    /// Create a data source for the given session.
    pub fn new(sess: &Session) -> DataSource {
        DataSource {
            sid: *sess.id(),
            rpk: *sess.receiver_pk(),
        }
    }

    /// Encrypt a whole table. Rows are independent and their output order
    /// is unspecified.
    pub fn prepare(&self, table: &TablePlain) -> Result<EncTable> {
        let mut rng = StdRng::from_entropy();
        table
            .iter()
            .map(|(uid, val)| self.process_row(uid, val, &mut rng))
            .collect()
    }

    /// Encrypt a single row: the uid is hashed to the curve and blinded
    /// under the receiver's blinding key, the value embedded and encrypted
    /// under the receiver's encryption key.
    pub fn process_row<RNG: CryptoRng + Rng>(
        &self,
        uid: &str,
        val: &str,
        rng: &mut RNG,
    ) -> Result<EncRow> {
        let cuid = oprf::blind(&self.rpk.bpk, uid.as_bytes(), self.sid.as_bytes(), rng)?;
        let msg = Message::embed(val.as_bytes(), rng)?;
        let cval = vec![pke::encrypt(&self.rpk.epk, &msg, rng)];
        Ok(EncRow { cuid, cval })
    }

    /// Streaming version of [`DataSource::prepare`]: encrypt rows pulled
    /// from `rows` onto `out` until the producer closes its channel. If
    /// the consumer side of `out` goes away, remaining rows are discarded.
    pub fn prepare_stream(
        &self,
        rows: channel::Receiver<TableRow>,
        out: channel::Sender<EncRow>,
        workers: Option<usize>,
    ) -> Result<()> {
        let workers = worker_count(workers);
        let first_err = Mutex::new(None);

        thread::scope(|s| {
            for _ in 0..workers {
                let rows = rows.clone();
                let out = out.clone();
                let first_err = &first_err;
                s.spawn(move || {
                    let mut rng = StdRng::from_entropy();
                    while let Ok(row) = rows.recv() {
                        match self.process_row(&row.uid, &row.val, &mut rng) {
                            Ok(enc) => {
                                if out.send(enc).is_err() {
                                    break;
                                }
                            }
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

        match first_err.into_inner().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pke::MESSAGE_CAPACITY;
    use crate::session::PartyId;

    fn session() -> (Session, crate::pke::SecretKey) {
        let mut rng = StdRng::from_entropy();
        let (sk, pk) = pke::key_gen(&mut rng);
        let sess = Session::new(
            vec![PartyId::from("s1"), PartyId::from("s2")],
            PartyId::from("helper"),
            PartyId::from("receiver"),
            pk,
        )
        .unwrap();
        (sess, sk)
    }

    #[test]
    fn test_prepare_encrypts_every_row() {
        let (sess, sk) = session();
        let ds = DataSource::new(&sess);

        let table = TablePlain::from_rows(&["a", "b", "c"], &["1", "2", "3"]);
        let enc = ds.prepare(&table).unwrap();
        assert_eq!(enc.len(), 3);

        // payloads decrypt back to the table values
        for row in &enc {
            let value = pke::decrypt_vector(&sk.esk, &row.cval).unwrap();
            let value = String::from_utf8(value).unwrap();
            assert!(table.iter().any(|(_, v)| *v == value));
        }
    }

    #[test]
    fn test_process_row_blinds_uid() {
        let (sess, sk) = session();
        let ds = DataSource::new(&sess);
        let mut rng = StdRng::from_entropy();

        let row = ds.process_row("uid-1", "val", &mut rng).unwrap();
        let unblinded = oprf::unblind(&sk.bsk, &row.cuid);
        let expected =
            crate::group::hash_to_point(b"uid-1", sess.id().as_bytes()).unwrap();
        assert_eq!(*unblinded.as_point(), expected);
    }

    #[test]
    fn test_prepare_rejects_oversized_value() {
        let (sess, _) = session();
        let ds = DataSource::new(&sess);

        let long = "x".repeat(MESSAGE_CAPACITY + 1);
        let table = TablePlain::from_rows(&["a"], &[long.as_str()]);
        assert!(matches!(
            ds.prepare(&table),
            Err(Error::ValueTooLong { .. })
        ));
    }

    #[test]
    fn test_prepare_stream() {
        let (sess, _) = session();
        let ds = DataSource::new(&sess);

        let (row_tx, row_rx) = channel::unbounded();
        let (enc_tx, enc_rx) = channel::unbounded();

        for i in 0..16 {
            row_tx
                .send(TableRow {
                    uid: format!("u{i}"),
                    val: format!("v{i}"),
                })
                .unwrap();
        }
        drop(row_tx);

        ds.prepare_stream(row_rx, enc_tx, Some(4)).unwrap();
        assert_eq!(enc_rx.iter().count(), 16);
    }
}
