//! Semantic rounding helpers.
//!
//! Every rounded quantity in the engine goes through [`round_to`]; the aliases
//! fix the granularity for each kind of figure so currency, share counts and
//! percentages round the same way everywhere.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Round half away from zero at `decimals` places. `decimals = 0` is a plain
/// integer round (2.5 -> 3, -2.5 -> -3).
pub fn round_to(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Currency figures round to cents.
pub fn as_currency(value: Decimal) -> Decimal {
    round_to(value, 2)
}

/// Share counts are whole shares.
pub fn as_share_count(value: Decimal) -> Decimal {
    round_to(value, 0)
}

/// A fraction rendered as a percentage with one decimal (0.12345 -> 12.3).
pub fn as_percent(value: Decimal) -> Decimal {
    round_to(value * dec!(100), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(dec!(1.005), 2), dec!(1.01));
        assert_eq!(round_to(dec!(2.5), 0), dec!(3));
        assert_eq!(round_to(dec!(3.5), 0), dec!(4));
        assert_eq!(round_to(dec!(-2.5), 0), dec!(-3));
    }

    #[test]
    fn test_round_below_midpoint() {
        assert_eq!(round_to(dec!(1.0049), 2), dec!(1.00));
        assert_eq!(round_to(dec!(2.499999), 0), dec!(2));
    }

    #[test]
    fn test_round_five_places() {
        assert_eq!(round_to(dec!(2.128564999), 5), dec!(2.12856));
        assert_eq!(round_to(dec!(2.128565), 5), dec!(2.12857));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(as_currency(dec!(150000.005)), dec!(150000.01));
        assert_eq!(as_share_count(dec!(333333.3333)), dec!(333333));
        assert_eq!(as_share_count(dec!(1281276.5)), dec!(1281277));
        assert_eq!(as_percent(dec!(0.77419)), dec!(77.4));
        assert_eq!(as_percent(dec!(0.0005)), dec!(0.1));
    }
}
