use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CapTableError;
use crate::CapTableResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.20 = 20%). Never as percentages.
pub type Rate = Decimal;

/// Price of a single share.
pub type SharePrice = Decimal;

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// Divide, reporting a zero denominator as an error instead of panicking.
pub fn checked_div(numerator: Decimal, denominator: Decimal, context: &str) -> CapTableResult<Decimal> {
    if denominator.is_zero() {
        return Err(CapTableError::DivisionByZero {
            context: context.to_string(),
        });
    }
    numerator
        .checked_div(denominator)
        .ok_or_else(|| CapTableError::DivisionByZero {
            context: format!("{context} (overflow)"),
        })
}

/// Convert a whole, non-negative share count held as Decimal into u64.
pub fn shares_to_u64(shares: Decimal, context: &str) -> CapTableResult<u64> {
    if shares.is_sign_negative() && !shares.is_zero() {
        return Err(CapTableError::Configuration(format!(
            "{context} is negative ({shares})"
        )));
    }
    shares.trunc().to_u64().ok_or_else(|| {
        CapTableError::Configuration(format!("{context} overflows a share count ({shares})"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checked_div_zero() {
        let err = checked_div(dec!(1), Decimal::ZERO, "unit test").unwrap_err();
        assert!(err.to_string().contains("unit test"));
    }

    #[test]
    fn test_shares_to_u64() {
        assert_eq!(shares_to_u64(dec!(1281277), "notes").unwrap(), 1_281_277);
        assert!(shares_to_u64(dec!(-5), "notes").is_err());
    }

    #[test]
    fn test_envelope_metadata() {
        let out = with_metadata("Test", &serde_json::json!({}), vec![], 7, dec!(1));
        assert_eq!(out.metadata.computation_time_us, 7);
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    }
}
