//! Utility functions for creating plaintext test tables for the join
//! protocol.

use crate::session::PartyId;
use crate::table::TablePlain;
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Create one test table per source id. Every table contains
/// `intersection_size` shared `join_key_i` rows plus source-specific
/// filler rows up to `n_rows`, so the intersection of the full set is
/// exactly the shared rows.
pub fn gen_test_tables(
    source_ids: &[PartyId],
    n_rows: usize,
    intersection_size: usize,
) -> Result<HashMap<PartyId, TablePlain>> {
    if source_ids.len() <= 1 {
        bail!(
            "source_ids.len() (={}) <= 1 @{}:{}",
            source_ids.len(),
            file!(),
            line!()
        );
    }
    if n_rows < intersection_size {
        bail!(
            "n_rows (={}) < intersection_size (={}) @{}:{}",
            n_rows,
            intersection_size,
            file!(),
            line!()
        );
    }

    let intersection: Vec<String> = (0..intersection_size)
        .map(|i| format!("join_key_{i}"))
        .collect();

    let tables = source_ids
        .iter()
        .map(|source_id| {
            (
                source_id.clone(),
                gen_test_table(source_id, n_rows, &intersection),
            )
        })
        .collect();

    Ok(tables)
}

/// Create one test table: the shared intersection uids first, then
/// source-specific filler uids up to `n_rows`. Values are unique across
/// the table so joined rows are distinguishable.
pub fn gen_test_table(source_id: &PartyId, n_rows: usize, intersection: &[String]) -> TablePlain {
    let mut table = TablePlain::new();
    let mut v = 0usize;

    for uid in intersection {
        table.insert(uid.clone(), format!("value_{v}"));
        v += 1;
    }

    for i in 0..n_rows.saturating_sub(intersection.len()) {
        table.insert(format!("{source_id}_{i}"), format!("non_join_value_{v}"));
        v += 1;
    }

    table
}
