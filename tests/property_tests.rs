//! Property-based tests for reconciliation invariants
//!
//! - The session difference always equals Σ(selected moves) − Σ(selected statements)
//! - Toggling never loses or duplicates a line
//! - Splitting a balance yields shares that add back up exactly

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use manual_reconciliation::reconciliation::balance;
use manual_reconciliation::{
    CandidateOrdering, EntryId, Move, MoveLine, ReconciliationSession, Statement, StatementLine,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Strategy for signed amounts with two decimals
fn amount_strategy() -> impl Strategy<Value = BigDecimal> {
    (-1_000_000_00i64..1_000_000_00i64).prop_map(|cents| BigDecimal::from(cents) / BigDecimal::from(100))
}

/// Strategy for one toggle: statement or move side, and which line
fn toggle_strategy() -> impl Strategy<Value = (bool, usize)> {
    (any::<bool>(), 0usize..64)
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

fn session_with(statements: &[BigDecimal], moves: &[BigDecimal]) -> ReconciliationSession {
    let statements = statements
        .iter()
        .enumerate()
        .map(|(i, a)| StatementLine::new(format!("st{}", i), "stmt", "bank", date(), a.clone(), "line"))
        .collect();
    let moves = moves
        .iter()
        .enumerate()
        .map(|(i, a)| MoveLine::new(format!("m{}", i), "entry", "bank_acc", date(), a.clone(), "move"))
        .collect();

    let mut session = ReconciliationSession::new("bank", date());
    session.load_candidates(statements, moves, "USD", CandidateOrdering::Amount);
    session
}

fn statement_ids(session: &ReconciliationSession) -> Vec<EntryId> {
    session
        .available_statements()
        .iter()
        .chain(session.selected_statements().iter())
        .map(|e| e.id)
        .collect()
}

fn move_ids(session: &ReconciliationSession) -> Vec<EntryId> {
    session
        .available_moves()
        .iter()
        .chain(session.selected_moves().iter())
        .map(|e| e.id)
        .collect()
}

proptest! {
    #[test]
    fn prop_difference_tracks_selection(
        statements in prop::collection::vec(amount_strategy(), 1..8),
        moves in prop::collection::vec(amount_strategy(), 1..8),
        toggles in prop::collection::vec(toggle_strategy(), 0..40),
    ) {
        let mut session = session_with(&statements, &moves);

        for (statement_side, index) in toggles {
            if statement_side {
                let ids = statement_ids(&session);
                let id = ids[index % ids.len()];
                session.toggle_selection::<Statement>(id).unwrap();
            } else {
                let ids = move_ids(&session);
                let id = ids[index % ids.len()];
                session.toggle_selection::<Move>(id).unwrap();
            }

            let expected = session.selected_move_total() - session.selected_statement_total();
            prop_assert_eq!(session.difference(), &expected);
        }

        prop_assert_eq!(
            session.available_statements().len() + session.selected_statements().len(),
            statements.len()
        );
        prop_assert_eq!(
            session.available_moves().len() + session.selected_moves().len(),
            moves.len()
        );

        let mut lines = HashSet::new();
        for entry in session.available_statements().iter().chain(session.selected_statements().iter()) {
            prop_assert!(lines.insert(entry.line_id().to_string()));
        }

        let mut ids: HashSet<EntryId> = statement_ids(&session).into_iter().collect();
        for id in move_ids(&session) {
            prop_assert!(ids.insert(id), "entry id {} reused", id);
        }
    }

    #[test]
    fn prop_split_shares_sum_exactly(
        total in amount_strategy(),
        parts in 1usize..12,
    ) {
        let shares = balance::split_evenly(&total, parts, 2);
        prop_assert_eq!(shares.len(), parts);

        let sum: BigDecimal = shares.iter().sum();
        prop_assert_eq!(sum, total.clone());

        // Every share but the last is truncated to cents
        for share in &shares[..parts - 1] {
            prop_assert_eq!(share.with_scale(2), share.clone());
        }
    }

    #[test]
    fn prop_comparison_is_symmetric(
        a in amount_strategy(),
        b in amount_strategy(),
    ) {
        prop_assert_eq!(
            balance::compare_amounts(&a, &b, 5),
            balance::compare_amounts(&b, &a, 5).reverse()
        );
        prop_assert!(balance::amounts_equal(&a, &a, 5));
    }
}
