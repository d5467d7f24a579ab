use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::error::CapTableError;
use crate::rounding::round_to;
use crate::CapTableResult;

pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;
pub const DEFAULT_DECIMALS: u32 = 5;

/// Fixed-point iteration.
///
/// Applies `step` to the previous guess, rounding every result to `decimals`
/// places, and stops as soon as two consecutive rounded guesses are equal.
/// Rounding before the comparison is what lets a contracting map terminate
/// instead of oscillating in its last digits.
///
/// Errors from `step` are propagated unchanged. Running out of iterations
/// yields [`CapTableError::Convergence`] carrying the budget and last guess.
pub fn iterate<F>(
    mut step: F,
    initial_guess: Decimal,
    max_iterations: u32,
    decimals: u32,
) -> CapTableResult<Decimal>
where
    F: FnMut(Decimal) -> CapTableResult<Decimal>,
{
    let mut last_guess = initial_guess;

    for i in 0..max_iterations {
        let next_guess = round_to(step(last_guess)?, decimals);
        trace!(iteration = i + 1, guess = %next_guess, "fixed-point step");
        if next_guess == last_guess {
            debug!(iterations = i + 1, value = %next_guess, "fixed point reached");
            return Ok(next_guess);
        }
        last_guess = next_guess;
    }

    warn!(max_iterations, last_guess = %last_guess, "fixed point not reached");
    Err(CapTableError::Convergence {
        iterations: max_iterations,
        last_guess,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_converges_on_contraction() {
        // x -> x/2 + 1 has its fixed point at 2
        let result = iterate(|x| Ok(x / dec!(2) + dec!(1)), dec!(0), 1000, 5).unwrap();
        assert_eq!(result, dec!(2));
    }

    #[test]
    fn test_immediate_fixed_point() {
        let mut calls = 0;
        let result = iterate(
            |x| {
                calls += 1;
                Ok(x)
            },
            dec!(3.00000),
            1000,
            5,
        )
        .unwrap();
        assert_eq!(result, dec!(3));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_divergence_reports_budget_and_guess() {
        let err = iterate(|x| Ok(x + dec!(1)), dec!(0), 10, 5).unwrap_err();
        match err {
            CapTableError::Convergence {
                iterations,
                last_guess,
            } => {
                assert_eq!(iterations, 10);
                assert_eq!(last_guess, dec!(10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_oscillation_fails() {
        assert!(iterate(|x| Ok(-x), dec!(1), 50, 5).is_err());
    }

    #[test]
    fn test_step_error_propagates() {
        let err = iterate(
            |_| {
                Err(CapTableError::DivisionByZero {
                    context: "step".into(),
                })
            },
            dec!(1),
            10,
            5,
        )
        .unwrap_err();
        assert!(matches!(err, CapTableError::DivisionByZero { .. }));
    }

    #[test]
    fn test_rounding_granularity_controls_termination() {
        // Coarser rounding settles in fewer steps
        let mut fine = 0;
        iterate(
            |x| {
                fine += 1;
                Ok(x / dec!(2) + dec!(1))
            },
            dec!(0),
            1000,
            8,
        )
        .unwrap();
        let mut coarse = 0;
        iterate(
            |x| {
                coarse += 1;
                Ok(x / dec!(2) + dec!(1))
            },
            dec!(0),
            1000,
            2,
        )
        .unwrap();
        assert!(coarse < fine);
    }
}
