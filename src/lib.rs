//! # Manual Reconciliation
//!
//! Matching bank statement lines against unreconciled ledger move lines,
//! one user selection at a time.
//!
//! ## Features
//!
//! - **Line registry**: available and selected pools for statement and move lines
//! - **Balance evaluation**: decimal totals compared at a configurable precision
//! - **Decision engine**: cancel, release, split, match, or hand off to an adjustment
//! - **Difference adjustment**: payment and balancing entry for unequal selections
//! - **Storage abstraction**: host ledger behind an async trait, in-memory backend included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manual_reconciliation::{MemoryStorage, ReconciliationEngine, Statement, Move};
//! use chrono::NaiveDate;
//!
//! # async fn run() -> manual_reconciliation::ReconcileResult<()> {
//! let mut engine = ReconciliationEngine::new(MemoryStorage::new());
//! let cutoff = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
//! let mut session = engine.open_session("bank", cutoff).await?;
//!
//! session.select_line::<Statement>("st-1")?;
//! session.select_line::<Move>("ml-1")?;
//! let outcome = engine.reconcile(&mut session).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use ledger::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::*;

// Re-export entry patterns for convenience
pub use ledger::entry::patterns;
