//! Reconciliation configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{ReconcileError, ReconcileResult};

/// Ordering applied to the available pools when a session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrdering {
    /// Oldest lines first
    #[default]
    Date,
    /// Smallest signed amount first
    Amount,
}

/// Settings for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Decimal digits used when comparing totals
    pub precision_digits: u32,
    /// Decimal places of the ledger currency, used when splitting balances
    pub currency_scale: i64,
    /// Currency used when a line carries none
    pub company_currency: String,
    pub candidate_ordering: CandidateOrdering,
    /// Post adjustment entries right after creating them
    pub post_adjustment_entries: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            precision_digits: 5,
            currency_scale: 2,
            company_currency: "USD".to_string(),
            candidate_ordering: CandidateOrdering::Date,
            post_adjustment_entries: true,
        }
    }
}

impl ReconciliationConfig {
    /// Load configuration from an optional TOML file, then apply
    /// `RECONCILE__*` environment overrides (e.g. `RECONCILE__COMPANY_CURRENCY`)
    pub fn load(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("RECONCILE").separator("__"))
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.precision_digits == 0 || self.precision_digits > 12 {
            return Err(ReconcileError::Config(format!(
                "precision_digits must be between 1 and 12, got {}",
                self.precision_digits
            )));
        }

        if !(0..=6).contains(&self.currency_scale) {
            return Err(ReconcileError::Config(format!(
                "currency_scale must be between 0 and 6, got {}",
                self.currency_scale
            )));
        }

        if self.company_currency.trim().is_empty() {
            return Err(ReconcileError::Config(
                "company_currency cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.precision_digits, 5);
        assert_eq!(config.candidate_ordering, CandidateOrdering::Date);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ReconciliationConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.currency_scale, 2);
        assert!(config.post_adjustment_entries);
    }

    #[test]
    fn test_partial_json_uses_field_defaults() {
        let config: ReconciliationConfig =
            serde_json::from_str(r#"{"company_currency": "EUR", "candidate_ordering": "amount"}"#)
                .unwrap();
        assert_eq!(config.company_currency, "EUR");
        assert_eq!(config.candidate_ordering, CandidateOrdering::Amount);
        assert_eq!(config.precision_digits, 5);
    }

    #[test]
    fn test_validate_rejects_zero_precision() {
        let config = ReconciliationConfig {
            precision_digits: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ReconcileError::Config(_))));
    }
}
