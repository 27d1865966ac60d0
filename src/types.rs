//! Core types and data structures for manual reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Account types following standard accounting principles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Bank, Receivables, etc.)
    Asset,
    /// Liabilities - what the business owes
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business (bank fees, write-offs)
    Expense,
}

/// Ledger account referenced by journals and adjustment rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            account_type,
        }
    }
}

/// Types of entries in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

/// Direction of a payment created during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Money received on the bank account
    Inbound,
    /// Money leaving the bank account
    Outbound,
}

impl PaymentDirection {
    /// Positive amounts are inbound, everything else is outbound
    pub fn from_amount(amount: &BigDecimal) -> Self {
        if *amount > BigDecimal::from(0) {
            PaymentDirection::Inbound
        } else {
            PaymentDirection::Outbound
        }
    }

    /// Counterparty role implied by the direction
    pub fn partner_type(self) -> PartnerType {
        match self {
            PaymentDirection::Inbound => PartnerType::Customer,
            PaymentDirection::Outbound => PartnerType::Supplier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Customer,
    Supplier,
}

/// Lifecycle state of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Draft,
    Posted,
    Reconciled,
    Cancelled,
}

/// Lifecycle state of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Draft,
    Posted,
    Cancelled,
}

/// Kind of ledger entry; reconciliation only ever creates miscellaneous entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Entry,
}

/// A payment method configured on a journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub code: String,
}

impl PaymentMethod {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Bank journal the statement lines belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub name: String,
    /// Account holding the journal's unreconciled move lines
    pub default_debit_account_id: String,
    pub default_credit_account_id: String,
    /// Ordered; the first entry is used for inbound adjustment payments
    pub inbound_payment_methods: Vec<PaymentMethod>,
    /// Ordered; the first entry is used for outbound adjustment payments
    pub outbound_payment_methods: Vec<PaymentMethod>,
}

impl Journal {
    /// Create a bank journal that uses a single account for both sides
    pub fn new(id: impl Into<String>, name: impl Into<String>, account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        Self {
            id: id.into(),
            name: name.into(),
            default_debit_account_id: account_id.clone(),
            default_credit_account_id: account_id,
            inbound_payment_methods: Vec::new(),
            outbound_payment_methods: Vec::new(),
        }
    }

    /// First payment method configured for the given direction
    pub fn payment_method_for(&self, direction: PaymentDirection) -> Option<&PaymentMethod> {
        match direction {
            PaymentDirection::Inbound => self.inbound_payment_methods.first(),
            PaymentDirection::Outbound => self.outbound_payment_methods.first(),
        }
    }

    /// Bank-side account for an adjustment of the given signed amount
    pub fn adjustment_account_id(&self, amount: &BigDecimal) -> &str {
        if *amount >= BigDecimal::from(0) {
            &self.default_credit_account_id
        } else {
            &self.default_debit_account_id
        }
    }
}

/// One bank transaction awaiting reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub id: String,
    pub statement_id: String,
    pub journal_id: String,
    pub date: NaiveDate,
    /// Signed amount; positive for money received
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub partner_id: Option<String>,
    pub name: String,
    pub reference: Option<String>,
    pub note: Option<String>,
    /// Label of the move line(s) this statement line was matched with
    pub move_name: Option<String>,
    /// Number of move lines counted at match time
    pub sequence: u32,
}

impl StatementLine {
    /// Create a new statement line
    pub fn new(
        id: impl Into<String>,
        statement_id: impl Into<String>,
        journal_id: impl Into<String>,
        date: NaiveDate,
        amount: BigDecimal,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            statement_id: statement_id.into(),
            journal_id: journal_id.into(),
            date,
            amount,
            currency: None,
            partner_id: None,
            name: name.into(),
            reference: None,
            note: None,
            move_name: None,
            sequence: 0,
        }
    }
}

/// One ledger entry line awaiting reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    pub id: String,
    /// Parent ledger entry
    pub entry_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Debit minus credit
    pub balance: BigDecimal,
    pub currency: Option<String>,
    pub partner_id: Option<String>,
    pub name: String,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub analytic_account_id: Option<String>,
    pub payment_id: Option<String>,
    pub statement_line_id: Option<String>,
    pub statement_id: Option<String>,
}

impl MoveLine {
    /// Create a new unreconciled move line
    pub fn new(
        id: impl Into<String>,
        entry_id: impl Into<String>,
        account_id: impl Into<String>,
        date: NaiveDate,
        balance: BigDecimal,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entry_id: entry_id.into(),
            account_id: account_id.into(),
            date,
            balance,
            currency: None,
            partner_id: None,
            name: name.into(),
            reference: None,
            note: None,
            analytic_account_id: None,
            payment_id: None,
            statement_line_id: None,
            statement_id: None,
        }
    }

    /// Whether the line has already been linked to a statement line
    pub fn is_reconciled(&self) -> bool {
        self.statement_line_id.is_some()
    }
}

/// Payment recording the cash side of a difference adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Assigned by storage on creation
    pub id: String,
    pub payment_method_id: String,
    pub direction: PaymentDirection,
    pub partner_id: Option<String>,
    pub partner_type: PartnerType,
    pub journal_id: String,
    pub date: NaiveDate,
    pub state: PaymentState,
    pub currency: String,
    /// Always non-negative; the sign lives in `direction`
    pub amount: BigDecimal,
    pub communication: Option<String>,
    pub name: String,
}

/// Individual line within a ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub name: String,
    pub partner_id: Option<String>,
    pub account_id: String,
    pub analytic_account_id: Option<String>,
    pub entry_type: EntryType,
    /// Non-negative amount on the `entry_type` side
    pub amount: BigDecimal,
    pub statement_line_id: Option<String>,
    pub statement_id: Option<String>,
    pub payment_id: Option<String>,
}

impl LedgerLine {
    /// Create a new line
    pub fn new(
        name: impl Into<String>,
        account_id: impl Into<String>,
        entry_type: EntryType,
        amount: BigDecimal,
    ) -> Self {
        Self {
            name: name.into(),
            partner_id: None,
            account_id: account_id.into(),
            analytic_account_id: None,
            entry_type,
            amount,
            statement_line_id: None,
            statement_id: None,
            payment_id: None,
        }
    }

    /// Create a debit line
    pub fn debit(name: impl Into<String>, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        Self::new(name, account_id, EntryType::Debit, amount)
    }

    /// Create a credit line
    pub fn credit(name: impl Into<String>, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        Self::new(name, account_id, EntryType::Credit, amount)
    }

    /// Line for a signed balance: debit when positive, credit when negative
    pub fn from_balance(
        name: impl Into<String>,
        account_id: impl Into<String>,
        balance: &BigDecimal,
    ) -> Self {
        if *balance >= BigDecimal::from(0) {
            Self::debit(name, account_id, balance.clone())
        } else {
            Self::credit(name, account_id, balance.abs())
        }
    }

    /// Signed balance of the line (debit minus credit)
    pub fn balance(&self) -> BigDecimal {
        match self.entry_type {
            EntryType::Debit => self.amount.clone(),
            EntryType::Credit => -self.amount.clone(),
        }
    }
}

/// Ledger entry (journal entry) created by reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Assigned by storage on creation
    pub id: String,
    pub kind: EntryKind,
    pub journal_id: String,
    pub currency: String,
    pub date: NaiveDate,
    pub partner_id: Option<String>,
    pub reference: Option<String>,
    pub state: EntryState,
    pub lines: Vec<LedgerLine>,
}

impl LedgerEntry {
    /// Create a new draft entry with no lines
    pub fn new(journal_id: impl Into<String>, currency: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: String::new(),
            kind: EntryKind::Entry,
            journal_id: journal_id.into(),
            currency: currency.into(),
            date,
            partner_id: None,
            reference: None,
            state: EntryState::Draft,
            lines: Vec::new(),
        }
    }

    /// Calculate total debits
    pub fn total_debits(&self) -> BigDecimal {
        self.lines
            .iter()
            .filter(|l| l.entry_type == EntryType::Debit)
            .map(|l| &l.amount)
            .sum()
    }

    /// Calculate total credits
    pub fn total_credits(&self) -> BigDecimal {
        self.lines
            .iter()
            .filter(|l| l.entry_type == EntryType::Credit)
            .map(|l| &l.amount)
            .sum()
    }
}

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Selected move lines do not sum to zero (total {total}); they cannot be cancelled")]
    ImbalancedCancellation { total: BigDecimal },
    #[error("Selected statement lines do not sum to zero (total {total}); they cannot be released")]
    ImbalancedRelease { total: BigDecimal },
    #[error(
        "Statement and move amounts differ at position {position}: statement {statement_amount}, move {move_amount}"
    )]
    PositionMismatch {
        position: usize,
        statement_amount: BigDecimal,
        move_amount: BigDecimal,
    },
    #[error("Cannot pair {statements} statement lines with {moves} move lines")]
    UnpairedSelection { statements: usize, moves: usize },
    #[error("Incomplete selection: {0}")]
    IncompleteSelection(String),
    #[error("There are no adjustment lines")]
    EmptyAdjustment,
    #[error("Adjustment lines total {total} but the difference to resolve is {expected}")]
    AdjustmentMismatch {
        expected: BigDecimal,
        total: BigDecimal,
    },
    #[error("Journal '{journal_id}' has no {direction:?} payment method configured")]
    NoPaymentMethod {
        journal_id: String,
        direction: PaymentDirection,
    },
    #[error("Stale reference: {0}")]
    StaleReference(String),
    #[error("Entry {entry_id} is not in the {pool} pool")]
    NotInPool { pool: &'static str, entry_id: String },
    #[error("Journal not found: {0}")]
    JournalNotFound(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReconcileError {
    /// Whether the error is a validation failure meant to be shown to the user,
    /// as opposed to a caller bug or a storage failure
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            ReconcileError::NotInPool { .. }
                | ReconcileError::InvalidEntry(_)
                | ReconcileError::Config(_)
                | ReconcileError::Storage(_)
        )
    }
}

impl From<config::ConfigError> for ReconcileError {
    fn from(err: config::ConfigError) -> Self {
        ReconcileError::Config(err.to_string())
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_direction_from_sign() {
        assert_eq!(
            PaymentDirection::from_amount(&BigDecimal::from(5)),
            PaymentDirection::Inbound
        );
        assert_eq!(
            PaymentDirection::from_amount(&BigDecimal::from(-5)),
            PaymentDirection::Outbound
        );
        assert_eq!(
            PaymentDirection::Outbound.partner_type(),
            PartnerType::Supplier
        );
    }

    #[test]
    fn test_ledger_line_from_balance() {
        let debit = LedgerLine::from_balance("fee", "bank", &BigDecimal::from(12));
        assert_eq!(debit.entry_type, EntryType::Debit);
        assert_eq!(debit.amount, BigDecimal::from(12));

        let credit = LedgerLine::from_balance("fee", "bank", &BigDecimal::from(-12));
        assert_eq!(credit.entry_type, EntryType::Credit);
        assert_eq!(credit.amount, BigDecimal::from(12));
        assert_eq!(credit.balance(), BigDecimal::from(-12));
    }

    #[test]
    fn test_journal_adjustment_account_by_sign() {
        let mut journal = Journal::new("bank", "Bank", "bank_acc");
        journal.default_debit_account_id = "bank_debit".to_string();
        journal.default_credit_account_id = "bank_credit".to_string();

        assert_eq!(journal.adjustment_account_id(&BigDecimal::from(3)), "bank_credit");
        assert_eq!(journal.adjustment_account_id(&BigDecimal::from(-3)), "bank_debit");
        assert!(journal.payment_method_for(PaymentDirection::Inbound).is_none());
    }

    #[test]
    fn test_error_classification() {
        assert!(ReconcileError::EmptyAdjustment.is_user_facing());
        assert!(!ReconcileError::Storage("down".to_string()).is_user_facing());
    }
}
