use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapTableError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Convergence failure: share price did not stabilise after {iterations} iterations (last guess: {last_guess})")]
    Convergence { iterations: u32, last_guess: Decimal },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CapTableError {
    fn from(e: serde_json::Error) -> Self {
        CapTableError::SerializationError(e.to_string())
    }
}
