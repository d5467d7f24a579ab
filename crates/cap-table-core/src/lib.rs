pub mod error;
pub mod interest;
pub mod iterate;
pub mod rounding;
pub mod types;

#[cfg(feature = "financing")]
pub mod financing;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::CapTableError;
pub use types::*;

/// Standard result type for all cap-table operations
pub type CapTableResult<T> = Result<T, CapTableError>;
