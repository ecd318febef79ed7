//! Error types for the credit math library.

use thiserror::Error;

/// Errors that can occur during credit computations.
///
/// Arithmetic variants are invariant violations: callers must propagate them
/// to a reporting sink instead of converting them into a default value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// An intermediate product does not fit in 256 bits
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Installment count outside `[1, max]`
    #[error("Invalid installment count {count}: must be between 1 and {max}")]
    InvalidInstallmentCount { count: usize, max: usize },

    /// Maturity not aligned to the maturity interval
    #[error("Maturity {maturity} is not aligned to the maturity interval")]
    UnalignedMaturity { maturity: u64 },

    /// Rate model parameters that do not describe a curve
    #[error("Invalid rate model parameters: {0}")]
    InvalidRateParameters(&'static str),

    /// A rate was requested for a maturity that is not in the future
    #[error("Maturity {maturity} is not after evaluation time {timestamp}")]
    MaturityNotInFuture { maturity: u64, timestamp: u64 },
}

impl SimError {
    /// Whether this error is an arithmetic invariant violation.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Self::ArithmeticOverflow | Self::DivisionByZero)
    }
}
