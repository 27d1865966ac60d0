//! Difference adjustment: resolving a selection that does not balance
//!
//! When `reconcile` finds that the selected statement and move totals differ,
//! it hands back an [`AdjustmentContext`]. The presentation layer turns it into
//! a [`DifferenceAdjustmentForm`], lets the user spread the difference over
//! accounts, and passes the form to
//! [`ReconciliationEngine::finalize`](crate::reconciliation::ReconciliationEngine::finalize),
//! which creates the payment and the balancing entry.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::reconciliation::balance;
use crate::reconciliation::registry::EntryId;
use crate::traits::AdjustmentValidator;
use crate::types::*;

/// One user-specified line absorbing part of the difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceAdjustment {
    pub account_id: String,
    pub analytic_account_id: Option<String>,
    pub label: String,
    /// Signed; positive rows are credited, negative rows debited
    pub amount: BigDecimal,
}

impl DifferenceAdjustment {
    pub fn new(account_id: impl Into<String>, label: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            account_id: account_id.into(),
            analytic_account_id: None,
            label: label.into(),
            amount,
        }
    }

    /// Attach an analytic dimension
    pub fn with_analytic(mut self, analytic_account_id: impl Into<String>) -> Self {
        self.analytic_account_id = Some(analytic_account_id.into());
        self
    }
}

/// A staged line referenced by an adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedLine {
    /// Entry in the session's selected pool
    pub entry_id: EntryId,
    /// Ledger line the entry projects
    pub line_id: String,
}

/// What `reconcile` hands over when the selection needs an adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentContext {
    /// Selected statement total minus selected move total
    pub amount: BigDecimal,
    pub statement_line: StagedLine,
    pub move_lines: Vec<StagedLine>,
}

/// Result of a successful difference adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReceipt {
    pub payment_id: String,
    pub entry_id: String,
    pub posted: bool,
    pub statement_line_id: String,
}

/// Editable set of adjustment rows bound to one context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceAdjustmentForm {
    context: AdjustmentContext,
    rows: Vec<DifferenceAdjustment>,
}

impl DifferenceAdjustmentForm {
    pub fn new(context: AdjustmentContext) -> Self {
        Self {
            context,
            rows: Vec::new(),
        }
    }

    pub fn context(&self) -> &AdjustmentContext {
        &self.context
    }

    /// Outstanding difference the rows must cover
    pub fn amount(&self) -> &BigDecimal {
        &self.context.amount
    }

    pub fn rows(&self) -> &[DifferenceAdjustment] {
        &self.rows
    }

    pub fn add_row(&mut self, row: DifferenceAdjustment) {
        self.rows.push(row);
    }

    /// Add a row for whatever part of the difference is still uncovered
    pub fn add_remaining_row(&mut self, account_id: impl Into<String>, label: impl Into<String>) {
        let remaining = self.remaining();
        self.rows
            .push(DifferenceAdjustment::new(account_id, label, remaining));
    }

    pub fn remove_row(&mut self, index: usize) -> Option<DifferenceAdjustment> {
        if index < self.rows.len() {
            Some(self.rows.remove(index))
        } else {
            None
        }
    }

    pub fn rows_total(&self) -> BigDecimal {
        balance::total(self.rows.iter().map(|r| &r.amount))
    }

    /// Difference not yet covered by the rows
    pub fn remaining(&self) -> BigDecimal {
        &self.context.amount - &self.rows_total()
    }

    /// Check the rows can finalize: at least one, each valid, summing to the
    /// outstanding difference at `digits` decimals
    pub fn validate(&self, validator: &dyn AdjustmentValidator, digits: u32) -> ReconcileResult<()> {
        if self.rows.is_empty() {
            return Err(ReconcileError::EmptyAdjustment);
        }

        for row in &self.rows {
            validator.validate_row(row)?;
        }

        let total = self.rows_total();
        if !balance::amounts_equal(&self.context.amount, &total, digits) {
            return Err(ReconcileError::AdjustmentMismatch {
                expected: self.context.amount.clone(),
                total,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::DefaultAdjustmentValidator;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn form(amount: &str) -> DifferenceAdjustmentForm {
        DifferenceAdjustmentForm::new(AdjustmentContext {
            amount: dec(amount),
            statement_line: StagedLine {
                entry_id: EntryId(1),
                line_id: "st1".to_string(),
            },
            move_lines: Vec::new(),
        })
    }

    #[test]
    fn test_empty_form_is_rejected() {
        let err = form("10").validate(&DefaultAdjustmentValidator, 5).unwrap_err();
        assert!(matches!(err, ReconcileError::EmptyAdjustment));
    }

    #[test]
    fn test_rows_within_tolerance_validate() {
        let mut form = form("10.00");
        form.add_row(DifferenceAdjustment::new("fees", "Fee", dec("9.99999")));
        assert!(form.validate(&DefaultAdjustmentValidator, 5).is_ok());
    }

    #[test]
    fn test_rows_off_by_more_than_tolerance_fail() {
        let mut form = form("10.00");
        form.add_row(DifferenceAdjustment::new("fees", "Fee", dec("9.50")));
        let err = form.validate(&DefaultAdjustmentValidator, 5).unwrap_err();
        assert!(matches!(err, ReconcileError::AdjustmentMismatch { .. }));
    }

    #[test]
    fn test_remaining_prefills_next_row() {
        let mut form = form("-30");
        form.add_row(DifferenceAdjustment::new("fees", "Fee", dec("-12.5")));
        assert_eq!(form.remaining(), dec("-17.5"));

        form.add_remaining_row("misc", "Rest");
        assert_eq!(form.rows()[1].amount, dec("-17.5"));
        assert_eq!(form.remaining(), dec("0"));
        assert!(form.validate(&DefaultAdjustmentValidator, 5).is_ok());
    }

    #[test]
    fn test_remove_row() {
        let mut form = form("5");
        form.add_row(DifferenceAdjustment::new("fees", "Fee", dec("5")).with_analytic("ops"));
        assert!(form.remove_row(3).is_none());
        let removed = form.remove_row(0).unwrap();
        assert_eq!(removed.analytic_account_id.as_deref(), Some("ops"));
        assert!(form.rows().is_empty());
    }

    #[test]
    fn test_row_without_account_is_rejected() {
        let mut form = form("5");
        form.add_row(DifferenceAdjustment::new("  ", "Fee", dec("5")));
        assert!(matches!(
            form.validate(&DefaultAdjustmentValidator, 5),
            Err(ReconcileError::Validation(_))
        ));
    }
}
