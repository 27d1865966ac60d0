//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: LedgerEntry,
    line_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    journals: HashMap<String, Journal>,
    statement_lines: HashMap<String, StatementLine>,
    move_lines: HashMap<String, MoveLine>,
    entries: HashMap<String, StoredEntry>,
    payments: HashMap<String, Payment>,
}

impl MemoryState {
    fn move_line_mut(&mut self, line_id: &str) -> ReconcileResult<&mut MoveLine> {
        self.move_lines
            .get_mut(line_id)
            .ok_or_else(|| ReconcileError::StaleReference(format!("move line {} not found", line_id)))
    }

    fn entry_mut(&mut self, entry_id: &str) -> ReconcileResult<&mut StoredEntry> {
        self.entries
            .get_mut(entry_id)
            .ok_or_else(|| ReconcileError::StaleReference(format!("ledger entry {} not found", entry_id)))
    }

    fn push_line(&mut self, entry_id: &str, line: &LedgerLine) -> ReconcileResult<String> {
        let id = Uuid::new_v4().to_string();
        let stored = self.entry_mut(entry_id)?;
        stored.line_ids.push(id.clone());
        let move_line = MoveLine {
            id: id.clone(),
            entry_id: entry_id.to_string(),
            account_id: line.account_id.clone(),
            date: stored.entry.date,
            balance: line.balance(),
            currency: Some(stored.entry.currency.clone()),
            partner_id: line.partner_id.clone(),
            name: line.name.clone(),
            reference: stored.entry.reference.clone(),
            note: None,
            analytic_account_id: line.analytic_account_id.clone(),
            payment_id: line.payment_id.clone(),
            statement_line_id: line.statement_line_id.clone(),
            statement_id: line.statement_id.clone(),
        };
        self.move_lines.insert(id.clone(), move_line);
        Ok(id)
    }

    fn is_statement_linked(&self, statement_line_id: &str) -> bool {
        self.move_lines
            .values()
            .any(|l| l.statement_line_id.as_deref() == Some(statement_line_id))
    }
}

/// In-memory storage implementation for testing and development
///
/// Transactions are snapshots: `begin` copies the whole state, `rollback`
/// restores the copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    snapshot: Arc<RwLock<Option<MemoryState>>>,
}

fn poisoned() -> ReconcileError {
    ReconcileError::Storage("memory storage lock poisoned".to_string())
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ReconcileResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> ReconcileResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| poisoned())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconcileResult<()> {
        *self.write()? = MemoryState::default();
        *self.snapshot.write().map_err(|_| poisoned())? = None;
        Ok(())
    }

    pub fn insert_account(&self, account: Account) -> ReconcileResult<()> {
        self.write()?.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn insert_journal(&self, journal: Journal) -> ReconcileResult<()> {
        self.write()?.journals.insert(journal.id.clone(), journal);
        Ok(())
    }

    pub fn insert_statement_line(&self, line: StatementLine) -> ReconcileResult<()> {
        self.write()?.statement_lines.insert(line.id.clone(), line);
        Ok(())
    }

    pub fn insert_payment(&self, payment: Payment) -> ReconcileResult<()> {
        self.write()?.payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    /// Store an existing entry together with its move lines. The entry keeps
    /// its ID and state; `lines` are re-parented onto it.
    pub fn insert_ledger_entry(&self, entry: LedgerEntry, lines: Vec<MoveLine>) -> ReconcileResult<()> {
        let mut state = self.write()?;
        let mut line_ids = Vec::with_capacity(lines.len());
        for mut line in lines {
            line.entry_id = entry.id.clone();
            line_ids.push(line.id.clone());
            state.move_lines.insert(line.id.clone(), line);
        }
        let shell = LedgerEntry {
            lines: Vec::new(),
            ..entry
        };
        state.entries.insert(
            shell.id.clone(),
            StoredEntry {
                entry: shell,
                line_ids,
            },
        );
        Ok(())
    }

    /// Move lines of an entry in creation order
    pub fn entry_move_lines(&self, entry_id: &str) -> ReconcileResult<Vec<MoveLine>> {
        let state = self.read()?;
        let stored = state
            .entries
            .get(entry_id)
            .ok_or_else(|| ReconcileError::StaleReference(format!("ledger entry {} not found", entry_id)))?;
        Ok(stored
            .line_ids
            .iter()
            .filter_map(|id| state.move_lines.get(id).cloned())
            .collect())
    }

    /// All payments, in no particular order
    pub fn payments(&self) -> ReconcileResult<Vec<Payment>> {
        Ok(self.read()?.payments.values().cloned().collect())
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> ReconcileResult<bool> {
        Ok(self.snapshot.read().map_err(|_| poisoned())?.is_some())
    }
}

#[async_trait]
impl ReconciliationStorage for MemoryStorage {
    async fn get_journal(&self, journal_id: &str) -> ReconcileResult<Option<Journal>> {
        Ok(self.read()?.journals.get(journal_id).cloned())
    }

    async fn get_account(&self, account_id: &str) -> ReconcileResult<Option<Account>> {
        Ok(self.read()?.accounts.get(account_id).cloned())
    }

    async fn get_statement_line(&self, line_id: &str) -> ReconcileResult<Option<StatementLine>> {
        Ok(self.read()?.statement_lines.get(line_id).cloned())
    }

    async fn get_move_line(&self, line_id: &str) -> ReconcileResult<Option<MoveLine>> {
        Ok(self.read()?.move_lines.get(line_id).cloned())
    }

    async fn get_payment(&self, payment_id: &str) -> ReconcileResult<Option<Payment>> {
        Ok(self.read()?.payments.get(payment_id).cloned())
    }

    async fn get_ledger_entry(&self, entry_id: &str) -> ReconcileResult<Option<LedgerEntry>> {
        let state = self.read()?;
        let Some(stored) = state.entries.get(entry_id) else {
            return Ok(None);
        };

        let mut entry = stored.entry.clone();
        entry.lines = stored
            .line_ids
            .iter()
            .filter_map(|id| state.move_lines.get(id))
            .map(|ml| {
                let mut line = LedgerLine::from_balance(ml.name.clone(), ml.account_id.clone(), &ml.balance);
                line.partner_id = ml.partner_id.clone();
                line.analytic_account_id = ml.analytic_account_id.clone();
                line.statement_line_id = ml.statement_line_id.clone();
                line.statement_id = ml.statement_id.clone();
                line.payment_id = ml.payment_id.clone();
                line
            })
            .collect();
        Ok(Some(entry))
    }

    async fn query_unreconciled_statement_lines(
        &self,
        journal_id: &str,
        cutoff: NaiveDate,
    ) -> ReconcileResult<Vec<StatementLine>> {
        let state = self.read()?;
        let mut lines: Vec<StatementLine> = state
            .statement_lines
            .values()
            .filter(|l| l.journal_id == journal_id && l.date <= cutoff)
            .filter(|l| !state.is_statement_linked(&l.id))
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(lines)
    }

    async fn query_unreconciled_move_lines(
        &self,
        account_id: &str,
        cutoff: NaiveDate,
    ) -> ReconcileResult<Vec<MoveLine>> {
        let state = self.read()?;
        let mut lines: Vec<MoveLine> = state
            .move_lines
            .values()
            .filter(|l| l.account_id == account_id && l.date <= cutoff && !l.is_reconciled())
            .filter(|l| {
                state
                    .entries
                    .get(&l.entry_id)
                    .is_some_and(|e| e.entry.state == EntryState::Posted)
            })
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(lines)
    }

    async fn is_statement_line_reconciled(&self, statement_line_id: &str) -> ReconcileResult<bool> {
        Ok(self.read()?.is_statement_linked(statement_line_id))
    }

    async fn link_statement_to_move(
        &mut self,
        move_line_id: &str,
        statement_line_id: &str,
        statement_id: &str,
    ) -> ReconcileResult<()> {
        let mut state = self.write()?;
        if !state.statement_lines.contains_key(statement_line_id) {
            return Err(ReconcileError::StaleReference(format!(
                "statement line {} not found",
                statement_line_id
            )));
        }

        let line = state.move_line_mut(move_line_id)?;
        if let Some(existing) = &line.statement_line_id {
            return Err(ReconcileError::StaleReference(format!(
                "move line {} is already linked to statement line {}",
                move_line_id, existing
            )));
        }
        line.statement_line_id = Some(statement_line_id.to_string());
        line.statement_id = Some(statement_id.to_string());
        Ok(())
    }

    async fn stamp_statement_line(
        &mut self,
        statement_line_id: &str,
        move_name: &str,
        sequence: u32,
    ) -> ReconcileResult<()> {
        let mut state = self.write()?;
        let line = state
            .statement_lines
            .get_mut(statement_line_id)
            .ok_or_else(|| {
                ReconcileError::StaleReference(format!("statement line {} not found", statement_line_id))
            })?;
        line.move_name = Some(move_name.to_string());
        line.sequence = sequence;
        Ok(())
    }

    async fn set_payment_state(
        &mut self,
        payment_id: &str,
        payment_state: PaymentState,
    ) -> ReconcileResult<()> {
        let mut state = self.write()?;
        let payment = state
            .payments
            .get_mut(payment_id)
            .ok_or_else(|| ReconcileError::StaleReference(format!("payment {} not found", payment_id)))?;
        payment.state = payment_state;
        Ok(())
    }

    async fn cancel_ledger_entry(&mut self, entry_id: &str) -> ReconcileResult<()> {
        let mut state = self.write()?;
        state.entry_mut(entry_id)?.entry.state = EntryState::Cancelled;
        Ok(())
    }

    async fn update_move_line_balance(
        &mut self,
        move_line_id: &str,
        balance: &BigDecimal,
    ) -> ReconcileResult<()> {
        let mut state = self.write()?;
        state.move_line_mut(move_line_id)?.balance = balance.clone();
        Ok(())
    }

    async fn add_move_line(&mut self, entry_id: &str, line: &LedgerLine) -> ReconcileResult<String> {
        self.write()?.push_line(entry_id, line)
    }

    async fn create_payment(&mut self, payment: &Payment) -> ReconcileResult<String> {
        let id = Uuid::new_v4().to_string();
        let stored = Payment {
            id: id.clone(),
            ..payment.clone()
        };
        self.write()?.payments.insert(id.clone(), stored);
        Ok(id)
    }

    async fn create_ledger_entry(&mut self, entry: &LedgerEntry) -> ReconcileResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.write()?;
        state.entries.insert(
            id.clone(),
            StoredEntry {
                entry: LedgerEntry {
                    id: id.clone(),
                    state: EntryState::Draft,
                    lines: Vec::new(),
                    ..entry.clone()
                },
                line_ids: Vec::new(),
            },
        );
        for line in &entry.lines {
            state.push_line(&id, line)?;
        }
        Ok(id)
    }

    async fn post_ledger_entry(&mut self, entry_id: &str) -> ReconcileResult<()> {
        let mut state = self.write()?;
        let stored = state.entry_mut(entry_id)?;
        if stored.entry.state == EntryState::Cancelled {
            return Err(ReconcileError::Storage(format!(
                "cannot post cancelled entry {}",
                entry_id
            )));
        }
        stored.entry.state = EntryState::Posted;
        Ok(())
    }

    async fn begin(&mut self) -> ReconcileResult<()> {
        let current = self.read()?.clone();
        let mut snapshot = self.snapshot.write().map_err(|_| poisoned())?;
        if snapshot.is_some() {
            return Err(ReconcileError::Storage(
                "a transaction is already open".to_string(),
            ));
        }
        *snapshot = Some(current);
        Ok(())
    }

    async fn commit(&mut self) -> ReconcileResult<()> {
        let mut snapshot = self.snapshot.write().map_err(|_| poisoned())?;
        if snapshot.take().is_none() {
            return Err(ReconcileError::Storage("no open transaction".to_string()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> ReconcileResult<()> {
        let saved = self
            .snapshot
            .write()
            .map_err(|_| poisoned())?
            .take()
            .ok_or_else(|| ReconcileError::Storage("no open transaction".to_string()))?;
        *self.write()? = saved;
        Ok(())
    }
}
