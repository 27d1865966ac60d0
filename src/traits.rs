//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::reconciliation::adjustment::DifferenceAdjustment;
use crate::reconciliation::balance::amounts_equal;
use crate::types::*;

/// Host ledger interface used by the reconciliation engine
///
/// The engine never traverses relations itself: everything it needs is read
/// through these methods as plain records, and every mutation it performs goes
/// through them as well. Implementations back this with PostgreSQL, an ORM,
/// or the in-memory [`MemoryStorage`](crate::utils::MemoryStorage).
///
/// `begin`/`commit`/`rollback` delimit one reconciliation action. The engine
/// always pairs `begin` with exactly one of the other two.
#[async_trait]
pub trait ReconciliationStorage: Send + Sync {
    /// Get a journal by ID
    async fn get_journal(&self, journal_id: &str) -> ReconcileResult<Option<Journal>>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &str) -> ReconcileResult<Option<Account>>;

    /// Get a statement line by ID
    async fn get_statement_line(&self, line_id: &str) -> ReconcileResult<Option<StatementLine>>;

    /// Get a move line by ID
    async fn get_move_line(&self, line_id: &str) -> ReconcileResult<Option<MoveLine>>;

    /// Get a payment by ID
    async fn get_payment(&self, payment_id: &str) -> ReconcileResult<Option<Payment>>;

    /// Get a ledger entry by ID
    async fn get_ledger_entry(&self, entry_id: &str) -> ReconcileResult<Option<LedgerEntry>>;

    /// Statement lines of the journal dated on or before `cutoff` that no move
    /// line is linked to yet
    async fn query_unreconciled_statement_lines(
        &self,
        journal_id: &str,
        cutoff: NaiveDate,
    ) -> ReconcileResult<Vec<StatementLine>>;

    /// Move lines on `account_id` dated on or before `cutoff`, belonging to a
    /// posted entry, with no linked statement line
    async fn query_unreconciled_move_lines(
        &self,
        account_id: &str,
        cutoff: NaiveDate,
    ) -> ReconcileResult<Vec<MoveLine>>;

    /// Whether any move line is linked to the statement line
    async fn is_statement_line_reconciled(&self, statement_line_id: &str) -> ReconcileResult<bool>;

    /// Link a move line to a statement line
    async fn link_statement_to_move(
        &mut self,
        move_line_id: &str,
        statement_line_id: &str,
        statement_id: &str,
    ) -> ReconcileResult<()>;

    /// Record the matched move label and move count on a statement line
    async fn stamp_statement_line(
        &mut self,
        statement_line_id: &str,
        move_name: &str,
        sequence: u32,
    ) -> ReconcileResult<()>;

    /// Change the state of a payment
    async fn set_payment_state(&mut self, payment_id: &str, state: PaymentState)
        -> ReconcileResult<()>;

    /// Set a ledger entry to the cancelled state
    async fn cancel_ledger_entry(&mut self, entry_id: &str) -> ReconcileResult<()>;

    /// Overwrite the balance of an existing move line
    async fn update_move_line_balance(
        &mut self,
        move_line_id: &str,
        balance: &BigDecimal,
    ) -> ReconcileResult<()>;

    /// Append a line to an existing ledger entry, returning the new move line ID
    async fn add_move_line(&mut self, entry_id: &str, line: &LedgerLine) -> ReconcileResult<String>;

    /// Create a payment, returning its ID
    async fn create_payment(&mut self, payment: &Payment) -> ReconcileResult<String>;

    /// Create a draft ledger entry with its lines, returning its ID
    async fn create_ledger_entry(&mut self, entry: &LedgerEntry) -> ReconcileResult<String>;

    /// Post a draft ledger entry
    async fn post_ledger_entry(&mut self, entry_id: &str) -> ReconcileResult<()>;

    /// Start an atomic unit of work
    async fn begin(&mut self) -> ReconcileResult<()>;

    /// Make the current unit of work permanent
    async fn commit(&mut self) -> ReconcileResult<()>;

    /// Discard every mutation since `begin`
    async fn rollback(&mut self) -> ReconcileResult<()>;
}

/// Trait for implementing custom ledger entry validation rules
pub trait EntryValidator: Send + Sync {
    /// Validate an entry before it is handed to storage
    fn validate_entry(&self, entry: &LedgerEntry, precision_digits: u32) -> ReconcileResult<()>;
}

/// Trait for implementing custom adjustment row validation rules
pub trait AdjustmentValidator: Send + Sync {
    /// Validate a single adjustment row
    fn validate_row(&self, row: &DifferenceAdjustment) -> ReconcileResult<()>;
}

/// Default entry validator: at least two lines, no negative amounts, balanced
/// within the configured precision
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, entry: &LedgerEntry, precision_digits: u32) -> ReconcileResult<()> {
        if entry.lines.len() < 2 {
            return Err(ReconcileError::InvalidEntry(
                "Entry must have at least two lines".to_string(),
            ));
        }

        if entry.lines.iter().any(|l| l.amount < BigDecimal::from(0)) {
            return Err(ReconcileError::InvalidEntry(
                "Line amounts cannot be negative".to_string(),
            ));
        }

        let debits = entry.total_debits();
        let credits = entry.total_credits();
        if !amounts_equal(&debits, &credits, precision_digits) {
            return Err(ReconcileError::InvalidEntry(format!(
                "Entry is not balanced: debits = {}, credits = {}",
                debits, credits
            )));
        }

        Ok(())
    }
}

/// Default adjustment validator: only requires an account
pub struct DefaultAdjustmentValidator;

impl AdjustmentValidator for DefaultAdjustmentValidator {
    fn validate_row(&self, row: &DifferenceAdjustment) -> ReconcileResult<()> {
        if row.account_id.trim().is_empty() {
            return Err(ReconcileError::Validation(
                "Adjustment line requires an account".to_string(),
            ));
        }
        Ok(())
    }
}
