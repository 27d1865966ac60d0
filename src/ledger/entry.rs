//! Ledger entry construction

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;

/// Builder for ledger entries produced by reconciliation
#[derive(Debug)]
pub struct LedgerEntryBuilder {
    entry: LedgerEntry,
}

impl LedgerEntryBuilder {
    /// Create a new entry builder
    pub fn new(journal_id: impl Into<String>, currency: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            entry: LedgerEntry::new(journal_id, currency, date),
        }
    }

    /// Set the partner of the entry
    pub fn partner(mut self, partner_id: Option<String>) -> Self {
        self.entry.partner_id = partner_id;
        self
    }

    /// Set the reference of the entry
    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.entry.reference = reference;
        self
    }

    /// Add a debit line
    pub fn debit(self, name: impl Into<String>, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        self.line(LedgerLine::debit(name, account_id, amount))
    }

    /// Add a credit line
    pub fn credit(self, name: impl Into<String>, account_id: impl Into<String>, amount: BigDecimal) -> Self {
        self.line(LedgerLine::credit(name, account_id, amount))
    }

    /// Add a custom line
    pub fn line(mut self, line: LedgerLine) -> Self {
        self.entry.lines.push(line);
        self
    }

    /// Build the entry, checking it balances within `precision_digits`
    pub fn build(self, precision_digits: u32) -> ReconcileResult<LedgerEntry> {
        self.build_with(&DefaultEntryValidator, precision_digits)
    }

    /// Build the entry with a custom validator
    pub fn build_with(
        self,
        validator: &dyn EntryValidator,
        precision_digits: u32,
    ) -> ReconcileResult<LedgerEntry> {
        validator.validate_entry(&self.entry, precision_digits)?;
        Ok(self.entry)
    }
}

/// Common entry patterns used by reconciliation
pub mod patterns {
    use super::*;
    use crate::reconciliation::adjustment::DifferenceAdjustment;

    /// Parameters for the entry resolving a statement/ledger difference
    pub struct BankDifferenceParams<'a> {
        pub journal_id: String,
        pub currency: String,
        pub date: NaiveDate,
        pub partner_id: Option<String>,
        pub reference: Option<String>,
        /// Bank-side account absorbing the difference
        pub bank_account_id: String,
        pub label: String,
        /// Signed difference being resolved
        pub amount: BigDecimal,
        pub statement_line_id: String,
        pub statement_id: String,
        pub payment_id: String,
        pub rows: &'a [DifferenceAdjustment],
    }

    /// Entry with one bank line for the difference and one counterpart line per
    /// adjustment row, every line tagged with the payment and the statement
    pub fn bank_difference_entry(
        params: BankDifferenceParams<'_>,
        validator: &dyn EntryValidator,
        precision_digits: u32,
    ) -> ReconcileResult<LedgerEntry> {
        let tag = |mut line: LedgerLine| {
            line.partner_id = params.partner_id.clone();
            line.statement_line_id = Some(params.statement_line_id.clone());
            line.statement_id = Some(params.statement_id.clone());
            line.payment_id = Some(params.payment_id.clone());
            line
        };

        let mut builder = LedgerEntryBuilder::new(
            params.journal_id.clone(),
            params.currency.clone(),
            params.date,
        )
        .partner(params.partner_id.clone())
        .reference(params.reference.clone())
        .line(tag(LedgerLine::from_balance(
            params.label.clone(),
            params.bank_account_id.clone(),
            &params.amount,
        )));

        for row in params.rows {
            // Rows sit on the opposite side of the bank line
            let mut line =
                LedgerLine::from_balance(row.label.clone(), row.account_id.clone(), &(-row.amount.clone()));
            line.analytic_account_id = row.analytic_account_id.clone();
            builder = builder.line(tag(line));
        }

        builder.build_with(validator, precision_digits)
    }

    /// Balancing line added to a move's entry for one share of a split
    pub fn split_share_line(template: &MoveLine, share: &BigDecimal, statement: &StatementLine) -> LedgerLine {
        let mut line = LedgerLine::from_balance(template.name.clone(), template.account_id.clone(), share);
        line.partner_id = template.partner_id.clone();
        line.payment_id = template.payment_id.clone();
        line.statement_line_id = Some(statement.id.clone());
        line.statement_id = Some(statement.statement_id.clone());
        line
    }
}

#[cfg(test)]
mod tests {
    use super::patterns::*;
    use super::*;
    use crate::reconciliation::adjustment::DifferenceAdjustment;
    use std::str::FromStr;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
    }

    fn params<'a>(amount: &str, rows: &'a [DifferenceAdjustment]) -> BankDifferenceParams<'a> {
        BankDifferenceParams {
            journal_id: "bank".to_string(),
            currency: "USD".to_string(),
            date: date(),
            partner_id: Some("acme".to_string()),
            reference: Some("REF-1".to_string()),
            bank_account_id: "bank_acc".to_string(),
            label: "Statement line".to_string(),
            amount: BigDecimal::from_str(amount).unwrap(),
            statement_line_id: "st1".to_string(),
            statement_id: "stmt".to_string(),
            payment_id: "pay1".to_string(),
            rows,
        }
    }

    #[test]
    fn test_builder_rejects_unbalanced_entry() {
        let result = LedgerEntryBuilder::new("bank", "USD", date())
            .debit("a", "bank_acc", BigDecimal::from(10))
            .credit("b", "fees", BigDecimal::from(4))
            .build(5);
        assert!(matches!(result, Err(ReconcileError::InvalidEntry(_))));
    }

    #[test]
    fn test_positive_difference_debits_bank_and_credits_rows() {
        let rows = vec![
            DifferenceAdjustment::new("income_acc", "Interest", BigDecimal::from(7)),
            DifferenceAdjustment::new("misc_acc", "Rounding", BigDecimal::from(3)),
        ];
        let entry = bank_difference_entry(params("10", &rows), &DefaultEntryValidator, 5).unwrap();

        assert_eq!(entry.lines.len(), 3);
        assert_eq!(entry.lines[0].entry_type, EntryType::Debit);
        assert_eq!(entry.lines[0].account_id, "bank_acc");
        assert_eq!(entry.lines[1].entry_type, EntryType::Credit);
        assert_eq!(entry.lines[1].amount, BigDecimal::from(7));
        assert_eq!(entry.total_debits(), entry.total_credits());
        assert!(entry
            .lines
            .iter()
            .all(|l| l.payment_id.as_deref() == Some("pay1")
                && l.statement_line_id.as_deref() == Some("st1")));
    }

    #[test]
    fn test_negative_difference_credits_bank() {
        let mut row = DifferenceAdjustment::new("fees_acc", "Bank fee", BigDecimal::from(-25));
        row.analytic_account_id = Some("ops".to_string());
        let rows = vec![row];
        let entry = bank_difference_entry(params("-25", &rows), &DefaultEntryValidator, 5).unwrap();

        assert_eq!(entry.lines[0].entry_type, EntryType::Credit);
        assert_eq!(entry.lines[1].entry_type, EntryType::Debit);
        assert_eq!(entry.lines[1].analytic_account_id.as_deref(), Some("ops"));
    }
}
