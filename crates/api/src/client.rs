//! Unified client over the chain reader, writer and router.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use exa_credit_contracts::provider::{connect, connect_read_only};
use exa_credit_sim::{HyperbolicCurve, InstallmentCalculator, InstallmentPlan, MarketSnapshot};

use crate::config::{RouterConfig, SettlementConfig};
use crate::error::{ApiError, Result};
use crate::proposal::{preview_roll_debt, read_proposals, ProposalView, RollDebtPreview};
use crate::reader::{ChainReader, RpcChainReader};
use crate::router::LifiRouter;
use crate::session::SettlementSession;
use crate::settlement::RpcChainWriter;

/// Configuration for [`ExaClient`].
#[derive(Debug, Clone, Default)]
pub struct ExaClientConfig {
    /// RPC URL for on-chain reads and writes.
    pub rpc_url: Option<String>,
    /// Private key of the account owner, for writes.
    pub private_key: Option<String>,
    pub router: RouterConfig,
    pub settlement: SettlementConfig,
}

impl ExaClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RPC URL.
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// Set the private key.
    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router = config;
        self
    }

    pub fn with_settlement_config(mut self, config: SettlementConfig) -> Self {
        self.settlement = config;
        self
    }
}

/// Entry point for reading credit state and opening repayment sessions.
///
/// Reads need an RPC URL; sessions additionally need a private key.
///
/// ```no_run
/// use exa_credit_api::{ExaClient, ExaClientConfig, SettlementConfig};
/// use alloy::primitives::{address, U256};
///
/// #[tokio::main]
/// async fn main() -> Result<(), exa_credit_api::ApiError> {
///     let settlement = SettlementConfig::new(
///         address!("6926B434CCe9b5b7966aE1BfEef6D0A7DCF3A8bb"),
///         address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
///     );
///     let client = ExaClient::with_config(
///         ExaClientConfig::new()
///             .with_rpc_url("https://mainnet.optimism.io")
///             .with_settlement_config(settlement),
///     )?;
///
///     let plan = client.installments(U256::from(100_000_000u64), None).await?;
///     for option in &plan.installments {
///         let _ = (option.count, option.rate);
///     }
///     Ok(())
/// }
/// ```
pub struct ExaClient {
    config: ExaClientConfig,
    reader: Arc<RpcChainReader>,
    writer: Option<Arc<RpcChainWriter>>,
    router: Arc<LifiRouter>,
    signer: Option<Address>,
}

impl ExaClient {
    /// Create a client with custom configuration.
    ///
    /// If a private key is provided, transaction support is enabled.
    pub fn with_config(config: ExaClientConfig) -> Result<Self> {
        let rpc_url = config
            .rpc_url
            .as_deref()
            .ok_or_else(|| ApiError::InvalidConfig("missing RPC URL".to_string()))?;
        let router = Arc::new(LifiRouter::with_config(config.router.clone())?);

        let (reader, writer, signer) = match &config.private_key {
            Some(private_key) => {
                let (provider, signer) = connect(rpc_url, private_key)?;
                let reader = RpcChainReader::new(provider.clone(), config.settlement.clone());
                let writer = RpcChainWriter::new(provider, signer, config.settlement.clone());
                (reader, Some(Arc::new(writer)), Some(signer))
            }
            None => {
                let provider = connect_read_only(rpc_url)?;
                (RpcChainReader::new(provider, config.settlement.clone()), None, None)
            }
        };

        Ok(Self {
            config,
            reader: Arc::new(reader),
            writer,
            router,
            signer,
        })
    }

    pub fn config(&self) -> &ExaClientConfig {
        &self.config
    }

    pub fn reader(&self) -> &RpcChainReader {
        &self.reader
    }

    /// Check if transaction support is configured.
    pub fn has_transaction_support(&self) -> bool {
        self.writer.is_some()
    }

    /// Get the signer's address if transaction support is configured.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    /// Latest block timestamp.
    pub async fn chain_time(&self) -> Result<u64> {
        self.reader.chain_time().await
    }

    /// Debt market snapshot, with `account`'s positions when given.
    pub async fn debt_market(&self, account: Option<Address>) -> Result<MarketSnapshot> {
        self.reader
            .read_market_snapshot(self.config.settlement.debt_market, account)
            .await
    }

    /// Installment options for borrowing `principal` now.
    ///
    /// All counts when `count` is `None`.
    pub async fn installments(&self, principal: U256, count: Option<usize>) -> Result<InstallmentPlan> {
        let snapshot = self.debt_market(None).await?;
        let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
        let plan = match count {
            Some(count) => calculator.plan(principal, count, snapshot.timestamp)?,
            None => calculator.plan_all(principal, snapshot.timestamp)?,
        };
        Ok(plan)
    }

    /// Pending proposals of `account`.
    pub async fn proposals(&self, account: Address) -> Result<Vec<ProposalView>> {
        let now = self.chain_time().await?;
        read_proposals(
            self.reader.as_ref(),
            account,
            now,
            self.config.settlement.proposal_expiry,
        )
        .await
    }

    /// Cost of rolling `account`'s position at `maturity` forward.
    pub async fn roll_debt_preview(&self, account: Address, maturity: u64) -> Result<RollDebtPreview> {
        let snapshot = self.debt_market(Some(account)).await?;
        preview_roll_debt(self.reader.as_ref(), &snapshot, maturity, snapshot.timestamp).await
    }

    /// Opens a repayment session for `account`'s position at `maturity`.
    pub async fn open_session(&self, account: Address, maturity: u64) -> Result<SettlementSession> {
        let writer = self.writer.clone().ok_or(ApiError::TransactionNotConfigured)?;
        let mut session = SettlementSession::new(
            self.config.settlement.clone(),
            account,
            maturity,
            self.reader.clone(),
            self.router.clone(),
            writer,
        )?;
        session.refresh().await?;
        Ok(session)
    }
}
