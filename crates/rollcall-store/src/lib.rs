//! rollcall-store — Roster and attendance ledger over SQLite.
//!
//! Timestamps are stored as RFC 3339 text. The ledger's core invariant
//! is at most one attendance record per (student, course): an explicit
//! existence check before insert, backed by a UNIQUE index.

mod error;
mod store;

pub use error::StoreError;
pub use store::{MarkOutcome, Store};
