//! The three protocol roles.
//!
//! Data sources encrypt their tables for the receiver and ship them to the
//! helper; the helper pseudonymizes identifiers and wraps per-row payload
//! keys in an n-of-n hinted form; the receiver groups rows by pseudonym
//! and opens exactly the groups every source contributed to.

mod helper;
mod receiver;
mod source;

pub use helper::{ConvertRowTask, Helper};
pub use receiver::Receiver;
pub use source::DataSource;

use std::num::NonZeroUsize;
use std::thread;

/// Resolve a worker-count override; defaults to the available hardware
/// parallelism. A tuning knob, not a correctness parameter.
pub(crate) fn worker_count(workers: Option<usize>) -> usize {
    match workers {
        Some(n) if n > 0 => n,
        _ => thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
    }
}
