//! Reconciliation decision engine
//!
//! `reconcile` looks at how many statement and move lines are selected and
//! whether their totals agree, picks one of the outcomes below, and applies
//! it to the ledger through [`ReconciliationStorage`]:
//!
//! | selection                              | outcome                          |
//! |----------------------------------------|----------------------------------|
//! | several moves, no statement            | cancel the moves' entries        |
//! | several statements, no move            | release the statements           |
//! | several statements, one move           | split the move across statements |
//! | totals differ                          | hand off to a difference adjustment |
//! | totals agree, one statement            | link every move to it            |
//! | totals agree, N statements and N moves | link pairwise by position        |
//!
//! Each call runs inside one storage transaction against a copy of the
//! session. The caller's session only changes when the whole action succeeded.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ReconciliationConfig;
use crate::ledger::patterns::{self, BankDifferenceParams};
use crate::reconciliation::adjustment::{
    AdjustmentContext, AdjustmentReceipt, DifferenceAdjustmentForm, StagedLine,
};
use crate::reconciliation::balance;
use crate::reconciliation::registry::{Move, ReconciliationSession, SelectionEntry, Statement};
use crate::traits::*;
use crate::types::*;

/// Which action a selection calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    CancelMoves,
    ReleaseStatements,
    SplitMove,
    Adjust,
    MatchOne,
    MatchPairwise,
}

/// A statement line linked to a move line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub statement_line_id: String,
    pub move_line_id: String,
}

/// What a successful `reconcile` did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Parent entries of the selected moves were cancelled
    MovesCancelled { entry_ids: Vec<String> },
    /// Selected statements went back to the available pool
    StatementsReleased { count: usize },
    /// The move was split; one move line per statement, in selection order
    MoveSplit { move_line_ids: Vec<String> },
    Matched { links: Vec<Link> },
    /// The totals differ; finish through a difference adjustment
    AdjustmentRequired(AdjustmentContext),
}

/// Pick the action for a selection. Pure; see the module table.
pub fn decide(
    statements: usize,
    moves: usize,
    statement_total: &BigDecimal,
    move_total: &BigDecimal,
    digits: u32,
) -> ReconcileResult<Decision> {
    if moves > 1 && statements == 0 {
        return if balance::is_zero(move_total, digits) {
            Ok(Decision::CancelMoves)
        } else {
            Err(ReconcileError::ImbalancedCancellation {
                total: move_total.clone(),
            })
        };
    }

    if statements > 1 && moves == 0 {
        return if balance::is_zero(statement_total, digits) {
            Ok(Decision::ReleaseStatements)
        } else {
            Err(ReconcileError::ImbalancedRelease {
                total: statement_total.clone(),
            })
        };
    }

    if statements > 1 && moves == 1 {
        return Ok(Decision::SplitMove);
    }

    if !balance::amounts_equal(statement_total, move_total, digits) {
        if statements == 0 {
            return Err(ReconcileError::IncompleteSelection(
                "a statement line is required to resolve a difference".to_string(),
            ));
        }
        return Ok(Decision::Adjust);
    }

    if statements == 0 || moves == 0 {
        return Err(ReconcileError::IncompleteSelection(
            "select at least one statement line and one move line".to_string(),
        ));
    }

    if statements == 1 {
        return Ok(Decision::MatchOne);
    }

    if statements != moves {
        return Err(ReconcileError::UnpairedSelection { statements, moves });
    }

    Ok(Decision::MatchPairwise)
}

/// Reconciliation engine over a host ledger
pub struct ReconciliationEngine<S: ReconciliationStorage> {
    storage: S,
    config: ReconciliationConfig,
    entry_validator: Box<dyn EntryValidator>,
    adjustment_validator: Box<dyn AdjustmentValidator>,
}

impl<S: ReconciliationStorage> ReconciliationEngine<S> {
    /// Create an engine with the default configuration
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: ReconciliationConfig::default(),
            entry_validator: Box::new(DefaultEntryValidator),
            adjustment_validator: Box::new(DefaultAdjustmentValidator),
        }
    }

    /// Create an engine with a custom configuration
    pub fn with_config(storage: S, config: ReconciliationConfig) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(storage)
        })
    }

    /// Create an engine with custom validators
    pub fn with_validators(
        storage: S,
        config: ReconciliationConfig,
        entry_validator: Box<dyn EntryValidator>,
        adjustment_validator: Box<dyn AdjustmentValidator>,
    ) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            config,
            entry_validator,
            adjustment_validator,
        })
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Open a session with the journal's unreconciled candidates up to `cutoff`
    pub async fn open_session(
        &self,
        journal_id: &str,
        cutoff: NaiveDate,
    ) -> ReconcileResult<ReconciliationSession> {
        let journal = self
            .storage
            .get_journal(journal_id)
            .await?
            .ok_or_else(|| ReconcileError::JournalNotFound(journal_id.to_string()))?;

        let statements = self
            .storage
            .query_unreconciled_statement_lines(&journal.id, cutoff)
            .await?;
        let moves = self
            .storage
            .query_unreconciled_move_lines(&journal.default_debit_account_id, cutoff)
            .await?;

        info!(
            journal_id = %journal.id,
            %cutoff,
            statements = statements.len(),
            moves = moves.len(),
            "opened reconciliation session"
        );

        let mut session = ReconciliationSession::new(journal.id.clone(), cutoff);
        session.load_candidates(
            statements,
            moves,
            &self.config.company_currency,
            self.config.candidate_ordering,
        );
        Ok(session)
    }

    /// Form for resolving the difference reported by `reconcile`
    pub fn adjustment_form(&self, context: AdjustmentContext) -> DifferenceAdjustmentForm {
        DifferenceAdjustmentForm::new(context)
    }

    /// Reconcile the current selection
    pub async fn reconcile(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let statement_total = session.selected_statement_total();
        let move_total = session.selected_move_total();
        let decision = decide(
            session.selected_statements().len(),
            session.selected_moves().len(),
            &statement_total,
            &move_total,
            self.config.precision_digits,
        )?;

        info!(
            ?decision,
            statements = session.selected_statements().len(),
            moves = session.selected_moves().len(),
            %statement_total,
            %move_total,
            "reconciling selection"
        );

        let mut working = session.clone();
        self.storage.begin().await?;
        match self.apply(decision, &mut working).await {
            Ok(outcome) => {
                self.storage.commit().await?;
                *session = working;
                Ok(outcome)
            }
            Err(err) => {
                warn!("Reconciliation failed, rolling back: {}", err);
                if let Err(rollback_err) = self.storage.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Resolve a difference with the rows of `form`: create the payment and
    /// the balancing entry, then drop the consumed selections
    pub async fn finalize(
        &mut self,
        session: &mut ReconciliationSession,
        form: &DifferenceAdjustmentForm,
    ) -> ReconcileResult<AdjustmentReceipt> {
        form.validate(
            self.adjustment_validator.as_ref(),
            self.config.precision_digits,
        )?;

        let mut working = session.clone();
        self.storage.begin().await?;
        match self.apply_adjustment(form, &mut working).await {
            Ok(receipt) => {
                self.storage.commit().await?;
                *session = working;
                info!(
                    payment_id = %receipt.payment_id,
                    entry_id = %receipt.entry_id,
                    "difference adjustment finalized"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!("Difference adjustment failed, rolling back: {}", err);
                if let Err(rollback_err) = self.storage.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &mut self,
        decision: Decision,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        match decision {
            Decision::CancelMoves => self.cancel_moves(session).await,
            Decision::ReleaseStatements => {
                let count = session.release_selected_statements();
                Ok(ReconcileOutcome::StatementsReleased { count })
            }
            Decision::SplitMove => self.split_move(session).await,
            Decision::Adjust => self.start_adjustment(session).await,
            Decision::MatchOne => self.match_one(session).await,
            Decision::MatchPairwise => self.match_pairwise(session).await,
        }
    }

    async fn cancel_moves(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let mut entry_ids: Vec<String> = Vec::new();
        for entry in session.selected_moves().entries() {
            let line = self.fresh_move(entry.line_id()).await?;
            if !entry_ids.contains(&line.entry_id) {
                entry_ids.push(line.entry_id);
            }
        }

        for entry_id in &entry_ids {
            debug!("Cancelling ledger entry {}", entry_id);
            self.storage.cancel_ledger_entry(entry_id).await?;
        }

        session.consume_selected_moves();
        Ok(ReconcileOutcome::MovesCancelled { entry_ids })
    }

    async fn split_move(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let statements = self.fresh_statements(session.selected_statements().entries()).await?;
        let move_entry = session.selected_moves().first().ok_or_else(|| {
            ReconcileError::IncompleteSelection("no move line selected".to_string())
        })?;
        let move_line = self.fresh_move(move_entry.line_id()).await?;

        let shares = balance::split_evenly(
            &move_line.balance,
            statements.len(),
            self.config.currency_scale,
        );
        debug!(
            "Splitting move line {} ({}) into {} shares",
            move_line.id,
            move_line.balance,
            shares.len()
        );

        let mut move_line_ids = Vec::with_capacity(statements.len());
        for (index, (statement, share)) in statements.iter().zip(&shares).enumerate() {
            if index == 0 {
                self.storage
                    .update_move_line_balance(&move_line.id, share)
                    .await?;
                self.storage
                    .link_statement_to_move(&move_line.id, &statement.id, &statement.statement_id)
                    .await?;
                move_line_ids.push(move_line.id.clone());
            } else {
                let line = patterns::split_share_line(&move_line, share, statement);
                let id = self
                    .storage
                    .add_move_line(&move_line.entry_id, &line)
                    .await?;
                move_line_ids.push(id);
            }
            self.storage
                .stamp_statement_line(&statement.id, &move_line.name, 1)
                .await?;
        }

        if let Some(payment_id) = &move_line.payment_id {
            self.storage
                .set_payment_state(payment_id, PaymentState::Reconciled)
                .await?;
        }

        session.consume_selected_statements();
        session.consume_selected_moves();
        Ok(ReconcileOutcome::MoveSplit { move_line_ids })
    }

    async fn start_adjustment(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let statement_entries = session.selected_statements().entries().to_vec();
        let move_entries = session.selected_moves().entries().to_vec();
        let statements = self.fresh_statements(&statement_entries).await?;
        let moves = self.fresh_moves(&move_entries).await?;

        let (first_entry, first_statement) = match (statement_entries.first(), statements.first()) {
            (Some(entry), Some(line)) => (entry, line),
            _ => {
                return Err(ReconcileError::IncompleteSelection(
                    "a statement line is required to resolve a difference".to_string(),
                ))
            }
        };

        // Moves are linked by `finalize`, so an abandoned form leaves them free
        if let Some(first_move) = moves.first() {
            for statement in &statements {
                self.storage
                    .stamp_statement_line(&statement.id, &first_move.name, moves.len() as u32)
                    .await?;
            }
        }

        let amount = session.selected_statement_total() - session.selected_move_total();
        info!(
            "Selection is off by {}; statement line {} needs an adjustment",
            amount, first_statement.id
        );

        Ok(ReconcileOutcome::AdjustmentRequired(AdjustmentContext {
            amount,
            statement_line: StagedLine {
                entry_id: first_entry.id,
                line_id: first_statement.id.clone(),
            },
            move_lines: move_entries
                .iter()
                .map(|e| StagedLine {
                    entry_id: e.id,
                    line_id: e.line_id().to_string(),
                })
                .collect(),
        }))
    }

    async fn match_one(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let statements = self.fresh_statements(session.selected_statements().entries()).await?;
        let moves = self.fresh_moves(session.selected_moves().entries()).await?;
        let statement = statements.first().ok_or_else(|| {
            ReconcileError::IncompleteSelection("no statement line selected".to_string())
        })?;

        let label = moves
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.storage
            .stamp_statement_line(&statement.id, &label, moves.len() as u32)
            .await?;

        let mut links = Vec::with_capacity(moves.len());
        for move_line in &moves {
            links.push(self.link(statement, move_line).await?);
        }

        session.consume_selected_statements();
        session.consume_selected_moves();
        Ok(ReconcileOutcome::Matched { links })
    }

    async fn match_pairwise(
        &mut self,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<ReconcileOutcome> {
        let statements = self.fresh_statements(session.selected_statements().entries()).await?;
        let moves = self.fresh_moves(session.selected_moves().entries()).await?;

        for (index, (statement, move_line)) in statements.iter().zip(&moves).enumerate() {
            if statement.amount != move_line.balance {
                return Err(ReconcileError::PositionMismatch {
                    position: index + 1,
                    statement_amount: statement.amount.clone(),
                    move_amount: move_line.balance.clone(),
                });
            }
        }

        let mut links = Vec::with_capacity(moves.len());
        for (index, (statement, move_line)) in statements.iter().zip(&moves).enumerate() {
            // Count of moves still staged when this pair is reached
            let remaining = (moves.len() - index) as u32;
            self.storage
                .stamp_statement_line(&statement.id, &move_line.name, remaining)
                .await?;
            links.push(self.link(statement, move_line).await?);
        }

        session.consume_selected_statements();
        session.consume_selected_moves();
        Ok(ReconcileOutcome::Matched { links })
    }

    async fn apply_adjustment(
        &mut self,
        form: &DifferenceAdjustmentForm,
        session: &mut ReconciliationSession,
    ) -> ReconcileResult<AdjustmentReceipt> {
        let context = form.context();
        let statement = self.fresh_statement(&context.statement_line.line_id).await?;
        let mut moves = Vec::with_capacity(context.move_lines.len());
        for staged in &context.move_lines {
            moves.push(self.fresh_move(&staged.line_id).await?);
        }
        let journal = self
            .storage
            .get_journal(&statement.journal_id)
            .await?
            .ok_or_else(|| ReconcileError::JournalNotFound(statement.journal_id.clone()))?;

        for row in form.rows() {
            if self.storage.get_account(&row.account_id).await?.is_none() {
                return Err(ReconcileError::AccountNotFound(row.account_id.clone()));
            }
        }

        let currency = statement
            .currency
            .clone()
            .unwrap_or_else(|| self.config.company_currency.clone());
        let direction = PaymentDirection::from_amount(&context.amount);
        let method = journal
            .payment_method_for(direction)
            .ok_or_else(|| ReconcileError::NoPaymentMethod {
                journal_id: journal.id.clone(),
                direction,
            })?;

        let payment = Payment {
            id: String::new(),
            payment_method_id: method.id.clone(),
            direction,
            partner_id: statement.partner_id.clone(),
            partner_type: direction.partner_type(),
            journal_id: journal.id.clone(),
            date: statement.date,
            state: PaymentState::Reconciled,
            currency: currency.clone(),
            amount: context.amount.abs(),
            communication: statement.reference.clone(),
            name: if statement.name.trim().is_empty() {
                format!("Bank Statement {}", statement.date)
            } else {
                statement.name.clone()
            },
        };
        let payment_id = self.storage.create_payment(&payment).await?;
        debug!("Created {:?} payment {} for {}", direction, payment_id, payment.amount);

        let entry = patterns::bank_difference_entry(
            BankDifferenceParams {
                journal_id: journal.id.clone(),
                currency,
                date: statement.date,
                partner_id: statement.partner_id.clone(),
                reference: statement.reference.clone(),
                bank_account_id: journal.adjustment_account_id(&context.amount).to_string(),
                label: statement.name.clone(),
                amount: context.amount.clone(),
                statement_line_id: statement.id.clone(),
                statement_id: statement.statement_id.clone(),
                payment_id: payment_id.clone(),
                rows: form.rows(),
            },
            self.entry_validator.as_ref(),
            self.config.precision_digits,
        )?;
        let entry_id = self.storage.create_ledger_entry(&entry).await?;

        let posted = self.config.post_adjustment_entries;
        if posted {
            self.storage.post_ledger_entry(&entry_id).await?;
        }

        for move_line in &moves {
            self.link(&statement, move_line).await?;
        }

        session.consume_selected::<Statement>(context.statement_line.entry_id)?;
        for staged in &context.move_lines {
            session.consume_selected::<Move>(staged.entry_id)?;
        }

        Ok(AdjustmentReceipt {
            payment_id,
            entry_id,
            posted,
            statement_line_id: statement.id,
        })
    }

    /// Link one move line to a statement line and settle its payment
    async fn link(&mut self, statement: &StatementLine, move_line: &MoveLine) -> ReconcileResult<Link> {
        self.storage
            .link_statement_to_move(&move_line.id, &statement.id, &statement.statement_id)
            .await?;
        if let Some(payment_id) = &move_line.payment_id {
            self.storage
                .set_payment_state(payment_id, PaymentState::Reconciled)
                .await?;
        }
        debug!("Linked move line {} to statement line {}", move_line.id, statement.id);
        Ok(Link {
            statement_line_id: statement.id.clone(),
            move_line_id: move_line.id.clone(),
        })
    }

    async fn fresh_statement(&self, line_id: &str) -> ReconcileResult<StatementLine> {
        let line = self
            .storage
            .get_statement_line(line_id)
            .await?
            .ok_or_else(|| {
                ReconcileError::StaleReference(format!("statement line {} no longer exists", line_id))
            })?;
        if self.storage.is_statement_line_reconciled(line_id).await? {
            return Err(ReconcileError::StaleReference(format!(
                "statement line {} is already reconciled",
                line_id
            )));
        }
        Ok(line)
    }

    async fn fresh_move(&self, line_id: &str) -> ReconcileResult<MoveLine> {
        let line = self.storage.get_move_line(line_id).await?.ok_or_else(|| {
            ReconcileError::StaleReference(format!("move line {} no longer exists", line_id))
        })?;
        if line.is_reconciled() {
            return Err(ReconcileError::StaleReference(format!(
                "move line {} is already reconciled",
                line_id
            )));
        }
        Ok(line)
    }

    async fn fresh_statements(
        &self,
        entries: &[SelectionEntry<Statement>],
    ) -> ReconcileResult<Vec<StatementLine>> {
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            lines.push(self.fresh_statement(entry.line_id()).await?);
        }
        Ok(lines)
    }

    async fn fresh_moves(&self, entries: &[SelectionEntry<Move>]) -> ReconcileResult<Vec<MoveLine>> {
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            lines.push(self.fresh_move(entry.line_id()).await?);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> BigDecimal {
        BigDecimal::from(n)
    }

    #[test]
    fn test_moves_only_summing_to_zero_cancel() {
        assert_eq!(decide(0, 2, &dec(0), &dec(0), 5).unwrap(), Decision::CancelMoves);
    }

    #[test]
    fn test_moves_only_with_total_cannot_cancel() {
        let err = decide(0, 2, &dec(0), &dec(7), 5).unwrap_err();
        assert!(matches!(err, ReconcileError::ImbalancedCancellation { .. }));
    }

    #[test]
    fn test_statements_only() {
        assert_eq!(
            decide(3, 0, &dec(0), &dec(0), 5).unwrap(),
            Decision::ReleaseStatements
        );
        assert!(matches!(
            decide(2, 0, &dec(4), &dec(0), 5),
            Err(ReconcileError::ImbalancedRelease { .. })
        ));
    }

    #[test]
    fn test_many_statements_one_move_split_regardless_of_totals() {
        assert_eq!(decide(3, 1, &dec(60), &dec(60), 5).unwrap(), Decision::SplitMove);
        assert_eq!(decide(2, 1, &dec(60), &dec(10), 5).unwrap(), Decision::SplitMove);
    }

    #[test]
    fn test_unequal_totals_need_adjustment() {
        assert_eq!(decide(1, 1, &dec(100), &dec(90), 5).unwrap(), Decision::Adjust);
        assert_eq!(decide(1, 0, &dec(100), &dec(0), 5).unwrap(), Decision::Adjust);
        assert!(matches!(
            decide(0, 1, &dec(0), &dec(5), 5),
            Err(ReconcileError::IncompleteSelection(_))
        ));
    }

    #[test]
    fn test_equal_totals_match() {
        assert_eq!(decide(1, 1, &dec(5), &dec(5), 5).unwrap(), Decision::MatchOne);
        assert_eq!(decide(1, 3, &dec(5), &dec(5), 5).unwrap(), Decision::MatchOne);
        assert_eq!(decide(3, 3, &dec(60), &dec(60), 5).unwrap(), Decision::MatchPairwise);
        assert!(matches!(
            decide(2, 3, &dec(60), &dec(60), 5),
            Err(ReconcileError::UnpairedSelection {
                statements: 2,
                moves: 3
            })
        ));
    }

    #[test]
    fn test_empty_selection_is_incomplete() {
        assert!(matches!(
            decide(0, 0, &dec(0), &dec(0), 5),
            Err(ReconcileError::IncompleteSelection(_))
        ));
        assert!(matches!(
            decide(0, 1, &dec(0), &dec(0), 5),
            Err(ReconcileError::IncompleteSelection(_))
        ));
    }
}
