//! Ledger entry construction used by the reconciliation engine

pub mod entry;

pub use entry::*;
