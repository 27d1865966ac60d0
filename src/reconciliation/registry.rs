//! Line registry: the available and selected pools of a reconciliation session
//!
//! A session holds four pools. Statement lines and move lines each have an
//! available pool (candidates loaded from the ledger) and a selected pool
//! (the staging area `reconcile` works on). Lines move between the two as the
//! user toggles them; every move creates a fresh [`SelectionEntry`] and
//! recomputes the session difference.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CandidateOrdering;
use crate::reconciliation::balance;
use crate::types::*;

/// Session-local identifier of a selection entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read access shared by statement and move lines
pub trait CandidateLine: Clone + fmt::Debug + Send + Sync {
    fn line_id(&self) -> &str;
    /// Signed amount used in the balance
    fn amount(&self) -> &BigDecimal;
    fn currency(&self) -> Option<&str>;
    fn date(&self) -> NaiveDate;
    fn label(&self) -> &str;
}

impl CandidateLine for StatementLine {
    fn line_id(&self) -> &str {
        &self.id
    }

    fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl CandidateLine for MoveLine {
    fn line_id(&self) -> &str {
        &self.id
    }

    fn amount(&self) -> &BigDecimal {
        &self.balance
    }

    fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// The two kinds of line a session stages
pub trait LineKind: Sized + fmt::Debug + Clone {
    type Line: CandidateLine;

    const AVAILABLE_POOL: &'static str;
    const SELECTED_POOL: &'static str;

    /// (available, selected) pools of this kind
    fn pools(session: &mut ReconciliationSession) -> (&mut Pool<Self>, &mut Pool<Self>);
}

/// Marker for bank statement lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement;

/// Marker for ledger move lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move;

impl LineKind for Statement {
    type Line = StatementLine;

    const AVAILABLE_POOL: &'static str = "available statement";
    const SELECTED_POOL: &'static str = "selected statement";

    fn pools(session: &mut ReconciliationSession) -> (&mut Pool<Self>, &mut Pool<Self>) {
        (
            &mut session.available_statements,
            &mut session.selected_statements,
        )
    }
}

impl LineKind for Move {
    type Line = MoveLine;

    const AVAILABLE_POOL: &'static str = "available move";
    const SELECTED_POOL: &'static str = "selected move";

    fn pools(session: &mut ReconciliationSession) -> (&mut Pool<Self>, &mut Pool<Self>) {
        (&mut session.available_moves, &mut session.selected_moves)
    }
}

/// Projection of a statement or move line into one of the session pools
#[derive(Debug, Clone)]
pub struct SelectionEntry<K: LineKind> {
    pub id: EntryId,
    pub line: K::Line,
    /// Line currency, or the company currency when the line has none
    pub currency: String,
    pub amount: BigDecimal,
}

impl<K: LineKind> SelectionEntry<K> {
    pub fn new(id: EntryId, line: K::Line, company_currency: &str) -> Self {
        let currency = line.currency().unwrap_or(company_currency).to_string();
        let amount = line.amount().clone();
        Self {
            id,
            line,
            currency,
            amount,
        }
    }

    pub fn line_id(&self) -> &str {
        self.line.line_id()
    }

    /// Same line under a new entry ID
    fn reissue(self, id: EntryId) -> Self {
        Self { id, ..self }
    }
}

/// Ordered collection of selection entries of one kind
#[derive(Debug, Clone)]
pub struct Pool<K: LineKind> {
    name: &'static str,
    entries: Vec<SelectionEntry<K>>,
}

impl<K: LineKind> Pool<K> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SelectionEntry<K>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionEntry<K>> {
        self.entries.iter()
    }

    pub fn get(&self, entry_id: EntryId) -> Option<&SelectionEntry<K>> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub fn contains(&self, entry_id: EntryId) -> bool {
        self.get(entry_id).is_some()
    }

    /// Entry projecting the given ledger line, if any
    pub fn find_line(&self, line_id: &str) -> Option<&SelectionEntry<K>> {
        self.entries.iter().find(|e| e.line_id() == line_id)
    }

    pub fn first(&self) -> Option<&SelectionEntry<K>> {
        self.entries.first()
    }

    /// Sum of the entry amounts
    pub fn total(&self) -> BigDecimal {
        balance::total(self.entries.iter().map(|e| &e.amount))
    }

    pub fn add_to_pool(&mut self, entry: SelectionEntry<K>) {
        self.entries.push(entry);
    }

    pub fn remove_from_pool(&mut self, entry_id: EntryId) -> ReconcileResult<SelectionEntry<K>> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| ReconcileError::NotInPool {
                pool: self.name,
                entry_id: entry_id.to_string(),
            })?;
        Ok(self.entries.remove(index))
    }

    /// Swap the whole content of the pool, returning the previous entries
    pub fn replace_pool(&mut self, entries: Vec<SelectionEntry<K>>) -> Vec<SelectionEntry<K>> {
        std::mem::replace(&mut self.entries, entries)
    }

    pub fn sort_by(&mut self, ordering: CandidateOrdering) {
        match ordering {
            CandidateOrdering::Date => self.entries.sort_by_key(|e| e.line.date()),
            CandidateOrdering::Amount => self.entries.sort_by(|a, b| a.amount.cmp(&b.amount)),
        }
    }
}

/// Transient aggregate of one user's reconciliation attempt
#[derive(Debug, Clone)]
pub struct ReconciliationSession {
    journal_id: String,
    cutoff: NaiveDate,
    next_entry_id: u64,
    available_statements: Pool<Statement>,
    available_moves: Pool<Move>,
    selected_statements: Pool<Statement>,
    selected_moves: Pool<Move>,
    difference: BigDecimal,
}

impl ReconciliationSession {
    /// Create an empty session for a journal and cutoff date
    pub fn new(journal_id: impl Into<String>, cutoff: NaiveDate) -> Self {
        Self {
            journal_id: journal_id.into(),
            cutoff,
            next_entry_id: 1,
            available_statements: Pool::new(Statement::AVAILABLE_POOL),
            available_moves: Pool::new(Move::AVAILABLE_POOL),
            selected_statements: Pool::new(Statement::SELECTED_POOL),
            selected_moves: Pool::new(Move::SELECTED_POOL),
            difference: BigDecimal::from(0),
        }
    }

    /// Fill the available pools with candidate lines, replacing what was there
    pub fn load_candidates(
        &mut self,
        statements: Vec<StatementLine>,
        moves: Vec<MoveLine>,
        company_currency: &str,
        ordering: CandidateOrdering,
    ) {
        let statements: Vec<_> = statements
            .into_iter()
            .map(|line| SelectionEntry::<Statement>::new(self.allocate_id(), line, company_currency))
            .collect();
        let moves: Vec<_> = moves
            .into_iter()
            .map(|line| SelectionEntry::<Move>::new(self.allocate_id(), line, company_currency))
            .collect();

        self.available_statements.replace_pool(statements);
        self.available_moves.replace_pool(moves);
        self.available_statements.sort_by(ordering);
        self.available_moves.sort_by(ordering);
    }

    pub fn journal_id(&self) -> &str {
        &self.journal_id
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn available_statements(&self) -> &Pool<Statement> {
        &self.available_statements
    }

    pub fn available_moves(&self) -> &Pool<Move> {
        &self.available_moves
    }

    pub fn selected_statements(&self) -> &Pool<Statement> {
        &self.selected_statements
    }

    pub fn selected_moves(&self) -> &Pool<Move> {
        &self.selected_moves
    }

    /// Selected move total minus selected statement total
    pub fn difference(&self) -> &BigDecimal {
        &self.difference
    }

    pub fn selected_statement_total(&self) -> BigDecimal {
        self.selected_statements.total()
    }

    pub fn selected_move_total(&self) -> BigDecimal {
        self.selected_moves.total()
    }

    /// Whether the selection balances at `digits` decimals
    pub fn is_balanced(&self, digits: u32) -> bool {
        balance::is_zero(&self.difference, digits)
    }

    /// Move the line from the available pool of its kind to the selected one
    pub fn select_line<K: LineKind>(&mut self, line_id: &str) -> ReconcileResult<EntryId> {
        let (available, _) = K::pools(self);
        let entry_id = available
            .find_line(line_id)
            .map(|e| e.id)
            .ok_or_else(|| ReconcileError::NotInPool {
                pool: K::AVAILABLE_POOL,
                entry_id: line_id.to_string(),
            })?;
        self.transfer::<K>(entry_id, true)
    }

    /// Move a selected entry back to the available pool of its kind
    pub fn deselect_line<K: LineKind>(&mut self, entry_id: EntryId) -> ReconcileResult<EntryId> {
        self.transfer::<K>(entry_id, false)
    }

    /// Select an available entry or deselect a selected one
    pub fn toggle_selection<K: LineKind>(&mut self, entry_id: EntryId) -> ReconcileResult<EntryId> {
        let (in_available, in_selected) = {
            let (available, selected) = K::pools(self);
            (available.contains(entry_id), selected.contains(entry_id))
        };
        if in_available {
            self.transfer::<K>(entry_id, true)
        } else if in_selected {
            self.transfer::<K>(entry_id, false)
        } else {
            Err(ReconcileError::NotInPool {
                pool: K::AVAILABLE_POOL,
                entry_id: entry_id.to_string(),
            })
        }
    }

    /// Drop every selected statement entry; the lines are reconciled
    pub(crate) fn consume_selected_statements(&mut self) -> Vec<SelectionEntry<Statement>> {
        let consumed = self.selected_statements.replace_pool(Vec::new());
        self.recompute();
        consumed
    }

    /// Drop every selected move entry; the lines are reconciled or cancelled
    pub(crate) fn consume_selected_moves(&mut self) -> Vec<SelectionEntry<Move>> {
        let consumed = self.selected_moves.replace_pool(Vec::new());
        self.recompute();
        consumed
    }

    /// Drop one selected entry
    pub(crate) fn consume_selected<K: LineKind>(
        &mut self,
        entry_id: EntryId,
    ) -> ReconcileResult<SelectionEntry<K>> {
        let (_, selected) = K::pools(self);
        let entry = selected.remove_from_pool(entry_id)?;
        self.recompute();
        Ok(entry)
    }

    /// Put every selected statement back into the available pool
    pub(crate) fn release_selected_statements(&mut self) -> usize {
        let released = self.selected_statements.replace_pool(Vec::new());
        let count = released.len();
        for entry in released {
            let id = self.allocate_id();
            self.available_statements.add_to_pool(entry.reissue(id));
        }
        self.recompute();
        count
    }

    fn transfer<K: LineKind>(&mut self, entry_id: EntryId, select: bool) -> ReconcileResult<EntryId> {
        let new_id = self.allocate_id();
        let (available, selected) = K::pools(self);
        let (from, to) = if select {
            (available, selected)
        } else {
            (selected, available)
        };
        let entry = from.remove_from_pool(entry_id)?;
        to.add_to_pool(entry.reissue(new_id));
        self.recompute();
        Ok(new_id)
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_entry_id);
        self.next_entry_id += 1;
        id
    }

    fn recompute(&mut self) {
        self.difference = balance::evaluate(
            self.selected_statements.iter().map(|e| &e.amount),
            self.selected_moves.iter().map(|e| &e.amount),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn statement(id: &str, d: u32, amount: &str) -> StatementLine {
        StatementLine::new(id, "stmt", "bank", day(d), BigDecimal::from_str(amount).unwrap(), id)
    }

    fn move_line(id: &str, d: u32, amount: &str) -> MoveLine {
        MoveLine::new(id, "entry", "bank_acc", day(d), BigDecimal::from_str(amount).unwrap(), id)
    }

    fn session() -> ReconciliationSession {
        let mut session = ReconciliationSession::new("bank", day(31));
        session.load_candidates(
            vec![statement("s2", 3, "20"), statement("s1", 1, "15.5")],
            vec![move_line("m1", 2, "15.5"), move_line("m2", 4, "-4")],
            "USD",
            CandidateOrdering::Date,
        );
        session
    }

    fn assert_difference_invariant(session: &ReconciliationSession) {
        let expected = session.selected_moves().total() - session.selected_statements().total();
        assert_eq!(session.difference(), &expected);
    }

    #[test]
    fn test_load_candidates_orders_by_date() {
        let session = session();
        let ids: Vec<_> = session
            .available_statements()
            .iter()
            .map(|e| e.line_id().to_string())
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(session.available_statements().first().unwrap().currency, "USD");
        assert_eq!(session.difference(), &BigDecimal::from(0));
    }

    #[test]
    fn test_load_candidates_orders_by_amount() {
        let mut session = ReconciliationSession::new("bank", day(31));
        session.load_candidates(
            Vec::new(),
            vec![move_line("m1", 1, "15.5"), move_line("m2", 2, "-4")],
            "USD",
            CandidateOrdering::Amount,
        );
        assert_eq!(session.available_moves().first().unwrap().line_id(), "m2");
    }

    #[test]
    fn test_line_currency_wins_over_company_currency() {
        let mut line = statement("s1", 1, "5");
        line.currency = Some("EUR".to_string());
        let entry = SelectionEntry::<Statement>::new(EntryId(9), line, "USD");
        assert_eq!(entry.currency, "EUR");
    }

    #[test]
    fn test_select_and_deselect_keep_difference_current() {
        let mut session = session();

        let s1 = session.select_line::<Statement>("s1").unwrap();
        assert_difference_invariant(&session);
        assert_eq!(session.difference(), &BigDecimal::from_str("-15.5").unwrap());

        session.select_line::<Move>("m1").unwrap();
        assert_difference_invariant(&session);
        assert!(session.is_balanced(5));

        session.select_line::<Move>("m2").unwrap();
        assert_difference_invariant(&session);
        assert_eq!(session.difference(), &BigDecimal::from(-4));

        session.deselect_line::<Statement>(s1).unwrap();
        assert_difference_invariant(&session);
        assert_eq!(session.selected_statements().len(), 0);
        assert_eq!(session.available_statements().len(), 2);
    }

    #[test]
    fn test_toggle_selection_moves_both_ways() {
        let mut session = session();
        let available_id = session.available_moves().first().unwrap().id;

        let selected_id = session.toggle_selection::<Move>(available_id).unwrap();
        assert!(session.selected_moves().contains(selected_id));
        assert!(!session.available_moves().contains(available_id));

        let back_id = session.toggle_selection::<Move>(selected_id).unwrap();
        assert!(session.available_moves().contains(back_id));
        assert!(session.selected_moves().is_empty());
        assert_difference_invariant(&session);
    }

    #[test]
    fn test_unknown_entries_are_rejected() {
        let mut session = session();
        let err = session.select_line::<Statement>("missing").unwrap_err();
        assert!(matches!(err, ReconcileError::NotInPool { .. }));
        assert!(!err.is_user_facing());

        assert!(session.deselect_line::<Move>(EntryId(999)).is_err());
        assert!(session.toggle_selection::<Move>(EntryId(999)).is_err());
    }

    #[test]
    fn test_release_returns_statements_to_available_pool() {
        let mut session = session();
        session.select_line::<Statement>("s1").unwrap();
        session.select_line::<Statement>("s2").unwrap();

        assert_eq!(session.release_selected_statements(), 2);
        assert!(session.selected_statements().is_empty());
        assert_eq!(session.available_statements().len(), 2);
        assert_difference_invariant(&session);
    }

    #[test]
    fn test_pool_replace_and_remove() {
        let mut pool: Pool<Move> = Pool::new("test");
        pool.add_to_pool(SelectionEntry::new(EntryId(1), move_line("m1", 1, "3"), "USD"));
        pool.add_to_pool(SelectionEntry::new(EntryId(2), move_line("m2", 1, "4"), "USD"));
        assert_eq!(pool.total(), BigDecimal::from(7));

        let removed = pool.remove_from_pool(EntryId(1)).unwrap();
        assert_eq!(removed.line_id(), "m1");

        let previous = pool.replace_pool(Vec::new());
        assert_eq!(previous.len(), 1);
        assert!(pool.is_empty());
    }
}
