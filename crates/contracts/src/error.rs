//! Error types for the contracts crate.

use thiserror::Error;

/// Errors that can occur when building, decoding or reading contract calls.
#[derive(Debug, Error)]
pub enum ContractError {
    /// RPC connection failed.
    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    /// A read call failed.
    #[error("Call failed: {0}")]
    CallFailed(String),

    /// Invalid private key.
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Proposal type byte outside the known range.
    #[error("Unknown proposal type {0}")]
    UnknownProposalType(u8),

    /// Proposal payload does not match its type.
    #[error("Failed to decode {kind} proposal payload: {reason}")]
    ProposalDecode { kind: &'static str, reason: String },
}

/// Result type alias for contract operations.
pub type Result<T> = std::result::Result<T, ContractError>;
