//! Plain and encrypted table types, the join result, and the plaintext
//! join oracle used to check protocol outputs.

use crate::error::{Error, Result};
use crate::pke::Ciphertext;
use crate::session::PartyId;
use crate::symmetric::SymmetricCiphertext;
use std::collections::HashMap;
use std::fmt;

/// A source's private input: a mapping from uid to value. Uids are unique
/// within a table by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TablePlain(HashMap<String, String>);

impl TablePlain {
    /// An empty table.
    pub fn new() -> TablePlain {
        TablePlain(HashMap::new())
    }

    /// Pair up uids and values into a table, stopping at the shorter
    /// slice. Later duplicates of a uid replace earlier ones.
    pub fn from_rows<U: AsRef<str>, V: AsRef<str>>(uids: &[U], values: &[V]) -> TablePlain {
        let mut table = HashMap::with_capacity(uids.len());
        for (uid, value) in uids.iter().zip(values.iter()) {
            table.insert(uid.as_ref().to_string(), value.as_ref().to_string());
        }
        TablePlain(table)
    }

    /// Insert one row, replacing any previous value for the uid.
    pub fn insert(&mut self, uid: String, value: String) {
        self.0.insert(uid, value);
    }

    /// Look up the value for a uid.
    pub fn get(&self, uid: &str) -> Option<&String> {
        self.0.get(uid)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(uid, value)` rows in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl fmt::Display for TablePlain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UID  Value")?;
        writeln!(f, "---------------------")?;
        for (uid, value) in &self.0 {
            writeln!(f, "{uid} {value}")?;
        }
        Ok(())
    }
}

/// A single plaintext row, used by the streaming source interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    /// The join identifier.
    pub uid: String,
    /// The payload value.
    pub val: String,
}

/// One source row after encryption: the blinded uid and a vector
/// ciphertext of the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncRow {
    /// Encryption of the hashed uid under the receiver's blinding key.
    pub cuid: Ciphertext,
    /// Vector ciphertext of the payload under the receiver's encryption
    /// key. Only single-element vectors are exercised on the wire.
    pub cval: Vec<Ciphertext>,
}

impl EncRow {
    /// Wire encoding `cuid || cval[0]`; only single-element payload
    /// vectors are representable.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.cval.len() != 1 {
            return Err(Error::BadEncoding(format!(
                "wire rows carry exactly one payload ciphertext, got {}",
                self.cval.len()
            )));
        }
        let mut out = self.cuid.to_bytes()?;
        out.extend_from_slice(&self.cval[0].to_bytes()?);
        Ok(out)
    }

    /// Inverse of [`EncRow::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<EncRow> {
        use crate::pke::CIPHERTEXT_LEN;
        if bytes.len() != 2 * CIPHERTEXT_LEN {
            return Err(Error::BadEncoding(format!(
                "wire row must be {} bytes, got {}",
                2 * CIPHERTEXT_LEN,
                bytes.len()
            )));
        }
        Ok(EncRow {
            cuid: Ciphertext::from_bytes(&bytes[..CIPHERTEXT_LEN])?,
            cval: vec![Ciphertext::from_bytes(&bytes[CIPHERTEXT_LEN..])?],
        })
    }
}

/// A source's encrypted table, the helper's input.
pub type EncTable = Vec<EncRow>;

/// One row after helper conversion: the pseudonymized identifier, the
/// AEAD-encrypted payload, the blinded row key and this source's share of
/// the blinding mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncRowWithHint {
    /// Encryption of the pseudonym `H(uid)^convK`.
    pub cnyme: Ciphertext,
    /// AEAD ciphertext of `source_index || serialized payload`.
    pub cval: SymmetricCiphertext,
    /// Encryption of the row-key point blinded by the full pad key.
    pub cval_key: Ciphertext,
    /// Encryption of this source's pad-key share applied to the pseudonym.
    pub chint: Ciphertext,
}

/// The helper's shuffled output, the receiver's input.
pub type EncTableWithHint = Vec<EncRowWithHint>;

/// The receiver's output: one row per identifier present at every source,
/// with columns in the session's source order.
#[derive(Clone, Debug)]
pub struct JoinTable {
    source_ids: Vec<PartyId>,
    values: Vec<Vec<String>>,
}

impl JoinTable {
    /// An empty join table with the given column order.
    pub fn new(source_ids: &[PartyId]) -> JoinTable {
        JoinTable {
            source_ids: source_ids.to_vec(),
            values: Vec::new(),
        }
    }

    /// Append one row given per-source values. Sources missing from the
    /// map leave their column empty.
    pub fn insert(&mut self, values: HashMap<PartyId, String>) -> Result<()> {
        let mut row = vec![String::new(); self.source_ids.len()];
        for (source_id, value) in values {
            let col = self
                .source_ids
                .iter()
                .position(|id| *id == source_id)
                .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;
            row[col] = value;
        }
        self.values.push(row);
        Ok(())
    }

    /// Number of joined rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the join is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The column order.
    pub fn source_ids(&self) -> &[PartyId] {
        &self.source_ids
    }

    /// The joined rows, in unspecified order.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.values
    }

    /// Multiset equality of rows under identical column order. Row order
    /// is unspecified on both sides, so rows are compared by count.
    pub fn equal_contents(&self, other: &JoinTable) -> bool {
        if self.source_ids != other.source_ids || self.values.len() != other.values.len() {
            return false;
        }

        let mut counts: HashMap<&[String], isize> = HashMap::new();
        for row in &self.values {
            *counts.entry(row.as_slice()).or_default() += 1;
        }
        for row in &other.values {
            match counts.get_mut(row.as_slice()) {
                Some(count) => *count -= 1,
                None => return false,
            }
        }
        counts.values().all(|&count| count == 0)
    }
}

impl fmt::Display for JoinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<&str> = self.source_ids.iter().map(|id| id.as_str()).collect();
        writeln!(f, "{}", header.join(","))?;
        for row in &self.values {
            writeln!(f, "{}", row.join(","))?;
        }
        Ok(())
    }
}

/// Plaintext join of the sources' tables: the testing oracle the protocol
/// output must match as a multiset.
pub fn intersect_plain(
    tables: &HashMap<PartyId, TablePlain>,
    sources: &[PartyId],
) -> Result<JoinTable> {
    let mut partial: HashMap<&String, HashMap<PartyId, String>> = HashMap::new();
    for (source_id, table) in tables {
        for (uid, value) in table.iter() {
            partial
                .entry(uid)
                .or_default()
                .insert(source_id.clone(), value.clone());
        }
    }

    let mut joined = JoinTable::new(sources);
    for (_, values) in partial {
        if values.len() == tables.len() {
            joined.insert(values)?;
        }
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<PartyId> {
        names.iter().map(|n| PartyId::from(*n)).collect()
    }

    #[test]
    fn test_from_rows_pairs_and_dedups() {
        let table = TablePlain::from_rows(&["a", "b", "a"], &["1", "2", "3"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a"), Some(&"3".to_string()));
        assert_eq!(table.get("b"), Some(&"2".to_string()));

        let short = TablePlain::from_rows(&["a", "b"], &["1"]);
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn test_intersect_plain() {
        let sources = ids(&["s1", "s2", "s3"]);
        let mut tables = HashMap::new();
        tables.insert(
            sources[0].clone(),
            TablePlain::from_rows(&["a", "b", "d"], &["1", "o", "x"]),
        );
        tables.insert(
            sources[1].clone(),
            TablePlain::from_rows(&["a", "b", "d"], &["2", "o", "y"]),
        );
        tables.insert(
            sources[2].clone(),
            TablePlain::from_rows(&["a", "c", "d"], &["3", "o", "z"]),
        );

        let joined = intersect_plain(&tables, &sources).unwrap();
        assert_eq!(joined.len(), 2);

        let mut expected = JoinTable::new(&sources);
        for row in [["1", "2", "3"], ["x", "y", "z"]] {
            let values: HashMap<PartyId, String> = sources
                .iter()
                .cloned()
                .zip(row.iter().map(|v| v.to_string()))
                .collect();
            expected.insert(values).unwrap();
        }
        assert!(joined.equal_contents(&expected));
    }

    #[test]
    fn test_intersect_plain_disjoint() {
        let sources = ids(&["s1", "s2"]);
        let mut tables = HashMap::new();
        tables.insert(sources[0].clone(), TablePlain::from_rows(&["u"], &["1"]));
        tables.insert(sources[1].clone(), TablePlain::from_rows(&["v"], &["2"]));

        assert!(intersect_plain(&tables, &sources).unwrap().is_empty());
    }

    #[test]
    fn test_insert_unknown_source() {
        let mut joined = JoinTable::new(&ids(&["s1", "s2"]));
        let mut values = HashMap::new();
        values.insert(PartyId::from("s3"), "v".to_string());
        assert!(matches!(
            joined.insert(values),
            Err(Error::UnknownSource(_))
        ));
    }

    #[test]
    fn test_equal_contents_is_multiset() {
        let sources = ids(&["s1", "s2"]);
        let row = |a: &str, b: &str| {
            let mut values = HashMap::new();
            values.insert(sources[0].clone(), a.to_string());
            values.insert(sources[1].clone(), b.to_string());
            values
        };

        let mut left = JoinTable::new(&sources);
        left.insert(row("x", "y")).unwrap();
        left.insert(row("x", "y")).unwrap();
        left.insert(row("p", "q")).unwrap();

        // same rows, different order
        let mut right = JoinTable::new(&sources);
        right.insert(row("p", "q")).unwrap();
        right.insert(row("x", "y")).unwrap();
        right.insert(row("x", "y")).unwrap();
        assert!(left.equal_contents(&right));

        // same row set but different multiplicities
        let mut collapsed = JoinTable::new(&sources);
        collapsed.insert(row("x", "y")).unwrap();
        collapsed.insert(row("p", "q")).unwrap();
        collapsed.insert(row("p", "q")).unwrap();
        assert!(!left.equal_contents(&collapsed));
    }

    #[test]
    fn test_display() {
        let sources = ids(&["s1", "s2"]);
        let mut joined = JoinTable::new(&sources);
        let mut values = HashMap::new();
        values.insert(sources[0].clone(), "a".to_string());
        values.insert(sources[1].clone(), "b".to_string());
        joined.insert(values).unwrap();

        assert_eq!(joined.to_string(), "s1,s2\na,b\n");
    }
}
