//! Error types for chain reads, router quotes and settlement.

use alloy_primitives::U256;
use exa_credit_contracts::ContractError;
use exa_credit_sim::SimError;
use thiserror::Error;

/// High-level grouping of [`ApiError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network or upstream hiccup; retrying later may succeed
    Transient,
    /// Invariant violation; must reach a reporting sink
    Fatal,
    /// Caused by the user's input or decision
    UserAction,
    /// Blocks the current attempt until its inputs change
    Terminal,
    /// Missing or invalid configuration
    Configuration,
}

fn revert_suffix(error_name: &Option<String>) -> String {
    error_name
        .as_deref()
        .map(|name| format!(" with {}", name))
        .unwrap_or_default()
}

/// Errors that can occur when reading, quoting, simulating or executing.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A chain read failed.
    #[error("Market snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// Credit math failed.
    #[error("Computation error: {0}")]
    Computation(#[from] SimError),

    /// Contract binding or provider error.
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    /// The account has nothing to repay at the maturity.
    #[error("No fixed position at maturity {maturity}")]
    NoPosition { maturity: u64 },

    /// No repay amount was selected.
    #[error("Nothing to repay, select an amount")]
    NothingToRepay,

    /// The router returned no usable quote.
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// A contract reverted during simulation or execution.
    #[error("Execution reverted{}: {message}", revert_suffix(.error_name))]
    Reverted {
        error_name: Option<String>,
        message: String,
    },

    /// The swap route's tool reverted; the tool has been denylisted.
    #[error("Route tool {tool} reverted: {reason}")]
    RouteToolReverted { tool: String, reason: String },

    /// The user declined to sign.
    #[error("User rejected the request")]
    UserRejectedSignature,

    /// The funding source cannot cover the route.
    #[error("Insufficient funds: route needs {required}, {available} available")]
    InsufficientLiquidity { required: U256, available: U256 },

    /// Simulation failed for a reason other than the route.
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    /// The submitted transaction failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Inputs changed after the last simulation.
    #[error("Calldata is stale, simulate again before executing")]
    StaleCalldata,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writes need an RPC URL and a private key.
    #[error("Transaction support not configured: set an RPC URL and a private key")]
    TransactionNotConfigured,

    /// The session was closed.
    #[error("Session closed")]
    SessionClosed,
}

impl ApiError {
    /// Classifies the error.
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Request(_)
            | Self::Parse(_)
            | Self::SnapshotUnavailable(_)
            | Self::QuoteUnavailable(_)
            | Self::RouteToolReverted { .. } => ErrorCategory::Transient,
            Self::Computation(e) if e.is_arithmetic() => ErrorCategory::Fatal,
            Self::Computation(SimError::InvalidRateParameters(_)) => ErrorCategory::Terminal,
            Self::Computation(_) => ErrorCategory::UserAction,
            Self::Contract(e) => match e {
                ContractError::RpcConnection(_) | ContractError::CallFailed(_) => {
                    ErrorCategory::Transient
                }
                ContractError::InvalidPrivateKey => ErrorCategory::Configuration,
                _ => ErrorCategory::Terminal,
            },
            Self::UserRejectedSignature
            | Self::InsufficientLiquidity { .. }
            | Self::NoPosition { .. }
            | Self::NothingToRepay => ErrorCategory::UserAction,
            Self::Reverted { .. }
            | Self::SimulationFailed(_)
            | Self::ExecutionFailed(_)
            | Self::StaleCalldata
            | Self::SessionClosed => ErrorCategory::Terminal,
            Self::InvalidConfig(_) | Self::TransactionNotConfigured => ErrorCategory::Configuration,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.error_category() == ErrorCategory::Transient
    }

    /// Whether the error is an invariant violation that must propagate.
    pub fn is_fatal(&self) -> bool {
        self.error_category() == ErrorCategory::Fatal
    }
}

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
