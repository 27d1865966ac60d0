//! Validation utilities

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::reconciliation::adjustment::DifferenceAdjustment;
use crate::reconciliation::balance;
use crate::traits::*;
use crate::types::*;

/// Validate that an amount is not zero
pub fn validate_nonzero_amount(amount: &BigDecimal) -> ReconcileResult<()> {
    if *amount == BigDecimal::from(0) {
        Err(ReconcileError::Validation(
            "Amount cannot be zero".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an account ID is valid
pub fn validate_account_id(account_id: &str) -> ReconcileResult<()> {
    if account_id.trim().is_empty() {
        return Err(ReconcileError::Validation(
            "Account ID cannot be empty".to_string(),
        ));
    }

    if account_id.len() > 50 {
        return Err(ReconcileError::Validation(
            "Account ID cannot exceed 50 characters".to_string(),
        ));
    }

    if !account_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ReconcileError::Validation(
            "Account ID can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate an adjustment or ledger line label
pub fn validate_label(label: &str) -> ReconcileResult<()> {
    if label.trim().is_empty() {
        return Err(ReconcileError::Validation(
            "Label cannot be empty".to_string(),
        ));
    }

    if label.len() > 500 {
        return Err(ReconcileError::Validation(
            "Label cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Stricter adjustment row checks: well-formed account, a label, a non-zero amount
pub struct EnhancedAdjustmentValidator;

impl AdjustmentValidator for EnhancedAdjustmentValidator {
    fn validate_row(&self, row: &DifferenceAdjustment) -> ReconcileResult<()> {
        validate_account_id(&row.account_id)?;
        if let Some(analytic) = &row.analytic_account_id {
            validate_account_id(analytic)?;
        }
        validate_label(&row.label)?;
        validate_nonzero_amount(&row.amount)
    }
}

/// Entry validator that also rejects duplicate account/side pairs and unlabeled lines
pub struct EnhancedEntryValidator;

impl EntryValidator for EnhancedEntryValidator {
    fn validate_entry(&self, entry: &LedgerEntry, precision_digits: u32) -> ReconcileResult<()> {
        DefaultEntryValidator.validate_entry(entry, precision_digits)?;

        let mut seen = HashSet::new();
        for line in &entry.lines {
            validate_account_id(&line.account_id)?;
            validate_label(&line.name)?;
            if balance::is_zero(&line.amount, precision_digits) {
                return Err(ReconcileError::InvalidEntry(format!(
                    "Line '{}' on account '{}' has no amount",
                    line.name, line.account_id
                )));
            }
            let key = (
                line.account_id.as_str(),
                line.analytic_account_id.as_deref(),
                line.entry_type,
            );
            if !seen.insert(key) {
                return Err(ReconcileError::InvalidEntry(format!(
                    "Account '{}' appears multiple times on the same side",
                    line.account_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_account_id_rules() {
        assert!(validate_account_id("bank_fees-01").is_ok());
        assert!(validate_account_id("").is_err());
        assert!(validate_account_id("bank fees").is_err());
        assert!(validate_account_id(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_enhanced_row_validation() {
        let validator = EnhancedAdjustmentValidator;
        assert!(validator
            .validate_row(&DifferenceAdjustment::new("fees", "Bank fee", BigDecimal::from(3)))
            .is_ok());
        assert!(validator
            .validate_row(&DifferenceAdjustment::new("fees", "", BigDecimal::from(3)))
            .is_err());
        assert!(validator
            .validate_row(&DifferenceAdjustment::new("fees", "Zero", BigDecimal::from(0)))
            .is_err());
    }

    #[test]
    fn test_enhanced_entry_rejects_duplicate_sides() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut entry = LedgerEntry::new("bank", "USD", date);
        entry.lines = vec![
            LedgerLine::debit("Bank", "bank", BigDecimal::from(10)),
            LedgerLine::credit("Fee", "fees", BigDecimal::from(4)),
            LedgerLine::credit("Fee", "fees", BigDecimal::from(6)),
        ];
        assert!(DefaultEntryValidator.validate_entry(&entry, 5).is_ok());
        assert!(matches!(
            EnhancedEntryValidator.validate_entry(&entry, 5),
            Err(ReconcileError::InvalidEntry(_))
        ));
    }
}
