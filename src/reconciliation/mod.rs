//! Manual reconciliation of bank statement lines against ledger move lines

pub mod adjustment;
pub mod balance;
pub mod engine;
pub mod registry;

pub use adjustment::*;
pub use engine::*;
pub use registry::*;
