//! Balance evaluation with fixed-point tolerance

use bigdecimal::BigDecimal;
use std::cmp::Ordering;

/// Digits used when no configuration says otherwise
pub const DEFAULT_PRECISION_DIGITS: u32 = 5;

/// Sum of a set of amounts
pub fn total<'a>(amounts: impl IntoIterator<Item = &'a BigDecimal>) -> BigDecimal {
    amounts.into_iter().sum()
}

/// Signed difference between selected move amounts and selected statement amounts
pub fn evaluate<'a>(
    statement_amounts: impl IntoIterator<Item = &'a BigDecimal>,
    move_amounts: impl IntoIterator<Item = &'a BigDecimal>,
) -> BigDecimal {
    total(move_amounts) - total(statement_amounts)
}

/// Smallest difference that is still significant at `digits` decimals
pub fn tolerance(digits: u32) -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(10u64.pow(digits.min(18)))
}

/// Compare two amounts at `digits` decimals.
///
/// Amounts whose difference does not exceed one unit of the last digit compare
/// equal; past that the sign of `a - b` decides.
pub fn compare_amounts(a: &BigDecimal, b: &BigDecimal, digits: u32) -> Ordering {
    let diff = a - b;
    if diff.abs() <= tolerance(digits) {
        Ordering::Equal
    } else if diff > BigDecimal::from(0) {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

pub fn amounts_equal(a: &BigDecimal, b: &BigDecimal, digits: u32) -> bool {
    compare_amounts(a, b, digits) == Ordering::Equal
}

pub fn is_zero(amount: &BigDecimal, digits: u32) -> bool {
    amounts_equal(amount, &BigDecimal::from(0), digits)
}

/// Split `total` into `parts` shares truncated to `scale` decimals.
///
/// The last share takes the remainder so the shares always add back up to
/// `total` exactly.
pub fn split_evenly(total: &BigDecimal, parts: usize, scale: i64) -> Vec<BigDecimal> {
    if parts == 0 {
        return Vec::new();
    }

    let share = (total.clone() / BigDecimal::from(parts as u64)).with_scale(scale);
    let mut shares = vec![share.clone(); parts - 1];
    let allocated = share * BigDecimal::from((parts - 1) as u64);
    shares.push(total - &allocated);
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_evaluate_is_moves_minus_statements() {
        let statements = [dec("10"), dec("20.50")];
        let moves = [dec("35")];
        assert_eq!(evaluate(&statements, &moves), dec("4.50"));
        let none: [BigDecimal; 0] = [];
        assert_eq!(evaluate(&none, &moves), dec("35"));
    }

    #[test]
    fn test_tolerance_matches_digits() {
        assert_eq!(tolerance(5), dec("0.00001"));
        assert_eq!(tolerance(2), dec("0.01"));
    }

    #[test]
    fn test_compare_within_tolerance() {
        assert_eq!(compare_amounts(&dec("10"), &dec("9.99999"), 5), Ordering::Equal);
        assert_eq!(compare_amounts(&dec("10"), &dec("10.000004"), 5), Ordering::Equal);
        assert_eq!(compare_amounts(&dec("10"), &dec("9.5"), 5), Ordering::Greater);
        assert_eq!(compare_amounts(&dec("10"), &dec("10.0001"), 5), Ordering::Less);
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&dec("0.000001"), 5));
        assert!(!is_zero(&dec("-0.01"), 5));
    }

    #[test]
    fn test_split_evenly_exact_division() {
        let shares = split_evenly(&dec("60"), 3, 2);
        assert_eq!(shares, vec![dec("20"), dec("20"), dec("20")]);
    }

    #[test]
    fn test_split_evenly_last_share_takes_remainder() {
        let shares = split_evenly(&dec("100"), 3, 2);
        assert_eq!(shares[0], dec("33.33"));
        assert_eq!(shares[1], dec("33.33"));
        assert_eq!(shares[2], dec("33.34"));
        assert_eq!(total(&shares), dec("100"));

        let negative = split_evenly(&dec("-100"), 3, 2);
        assert_eq!(total(&negative), dec("-100"));
    }

    #[test]
    fn test_split_evenly_zero_parts() {
        assert!(split_evenly(&dec("10"), 0, 2).is_empty());
    }
}
