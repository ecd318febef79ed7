//! Chain reads, swap-router quotes and settlement orchestration for
//! fixed-rate credit accounts.
//!
//! The crate turns the pure credit math of `exa-credit-sim` and the calldata
//! builders of `exa-credit-contracts` into a working repayment flow:
//!
//! - [`reader::ChainReader`] reads market snapshots, plugins, balances and
//!   the proposal queue.
//! - [`router::RouterQuoter`] prices swaps; [`LifiRouter`] talks to LI.FI.
//! - [`pipeline::QuotePipeline`] polls the liquidity probe and the firm quote.
//! - [`mode::select_mode`] picks one of five settlement strategies.
//! - [`settlement::Settlement`] simulates and executes a plan through a
//!   [`settlement::ChainWriter`].
//! - [`SettlementSession`] owns all of the above for one position.
//!
//! # Example
//!
//! ```no_run
//! use exa_credit_api::{ExaClient, ExaClientConfig, SettlementConfig, SimulationOutcome};
//! use alloy::primitives::{address, U256};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), exa_credit_api::ApiError> {
//!     let settlement = SettlementConfig::new(
//!         address!("6926B434CCe9b5b7966aE1BfEef6D0A7DCF3A8bb"),
//!         address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
//!     )
//!     .with_exa_plugin(address!("0000000000000000000000000000000000000001"))
//!     .with_proposal_manager(address!("0000000000000000000000000000000000000002"));
//!     let client = ExaClient::with_config(
//!         ExaClientConfig::new()
//!             .with_rpc_url("https://mainnet.optimism.io")
//!             .with_private_key("0x...")
//!             .with_settlement_config(settlement.clone()),
//!     )?;
//!
//!     let account = address!("0000000000000000000000000000000000000003");
//!     let mut session = client.open_session(account, 4_838_400_000).await?;
//!     session.fund_from_market(settlement.debt_market).await?;
//!     session.set_position_assets(U256::from(50_000_000u64)).await?;
//!     if session.simulate().await? == SimulationOutcome::Ready {
//!         let tx_hash = session.execute().await?;
//!         println!("repaid in {tx_hash}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All errors are unified through [`ApiError`], which wraps errors from the contracts and
//! simulation crates. Use [`ApiError::error_category()`] for high-level classification
//! and [`ApiError::is_retryable()`] to determine retry eligibility. Inside a session,
//! non-fatal errors become [`SettlementState`] instead of propagating.

pub mod client;
pub mod config;
pub mod denylist;
pub mod error;
pub mod mode;
pub mod pipeline;
pub mod proposal;
pub mod reader;
pub mod router;
pub mod session;
pub mod settlement;

// Re-export main types at crate root
pub use client::{ExaClient, ExaClientConfig};
pub use config::{RouterConfig, SettlementConfig};
pub use denylist::Denylist;
pub use error::{ApiError, ErrorCategory, Result};
pub use mode::{select_mode, FundingAsset, SettlementMode};
pub use pipeline::{QuoteKind, QuotePipeline, QuoteState};
pub use proposal::{ProposalStatus, ProposalView, RollDebtPreview};
pub use reader::{ChainReader, PendingProposal, RpcChainReader};
pub use router::{LifiRouter, QuoteRequest, RepaymentRoute, RouterQuoter};
pub use session::{RepayPreview, SessionContext, SettlementSession};
pub use settlement::{
    ChainWriter, Failure, RpcChainWriter, SettlementPlan, SettlementState, SimulationOutcome,
};
