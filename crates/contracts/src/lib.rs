//! Contract bindings and settlement calldata for fixed-rate credit accounts.
//!
//! This crate provides Solidity bindings for the lending markets, the smart
//! account and its proposal manager, plus pure builders that turn repayment
//! decisions into [`PreparedCall`]s.
//!
//! # Example
//!
//! ```
//! use alloy::primitives::{Address, U256};
//! use exa_credit_contracts::settlement;
//!
//! let account = Address::repeat_byte(0xaa);
//! let usdc_market = Address::repeat_byte(0xbb);
//! let call = settlement::repay_proposal(
//!     account,
//!     usdc_market,
//!     2_419_200_000,
//!     U256::from(100_000_000u64),
//!     U256::from(100_100_000u64),
//! );
//! assert_eq!(call.to, account);
//! ```

pub mod account;
pub mod erc20;
pub mod error;
pub mod market;
pub mod prepared_call;
pub mod proposal;
pub mod provider;
pub mod settlement;

pub use error::{ContractError, Result};
pub use prepared_call::PreparedCall;
pub use proposal::{ProposalPayload, ProposalType, QueuedProposal};
pub use provider::HttpProvider;
pub use settlement::SwapRoute;
