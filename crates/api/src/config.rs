//! Client configuration.

use std::time::Duration;

use alloy_primitives::{address, Address};

use crate::error::{ApiError, Result};

/// Default swap router endpoint.
pub const DEFAULT_ROUTER_URL: &str = "https://li.quest";

/// Default integrator identifier sent with every quote.
pub const DEFAULT_INTEGRATOR: &str = "exa_app";

/// Default chain (OP Mainnet).
pub const DEFAULT_CHAIN_ID: u64 = 10;

/// Refetch interval shared by the liquidity probe, the firm quote and the
/// reservoir balance.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// How long a ready proposal stays executable before it is reported expired.
pub const DEFAULT_PROPOSAL_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Flash-loan vault whose debt-asset balance caps a single repayment.
pub const DEFAULT_LIQUIDITY_RESERVOIR: Address = address!("BA12222222228d8Ba445958a75a0704d566BF2C8");

/// Configuration for the swap router client.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Base URL of the quote API.
    pub base_url: String,
    /// Integrator identifier.
    pub integrator: String,
    /// Integrator fee as a fraction.
    pub fee: f64,
    /// Slippage tolerance for indicative quotes.
    pub probe_slippage: f64,
    /// Slippage tolerance for firm quotes.
    pub firm_slippage: f64,
    /// Chain the swaps run on.
    pub chain_id: u64,
    /// Optional API key sent as `x-lifi-api-key`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ROUTER_URL.to_string(),
            integrator: DEFAULT_INTEGRATOR.to_string(),
            fee: 0.0025,
            probe_slippage: 0.02,
            firm_slippage: 0.015,
            chain_id: DEFAULT_CHAIN_ID,
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl RouterConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the integrator identifier.
    pub fn with_integrator(mut self, integrator: impl Into<String>) -> Self {
        self.integrator = integrator.into();
        self
    }

    /// Set the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash, validated.
    pub(crate) fn endpoint(&self, path: &str) -> Result<String> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("router url: {}", e)))?;
        Ok(format!("{}/{}", base.as_str().trim_end_matches('/'), path))
    }
}

/// Deployment addresses and timing for settlement.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Chain id.
    pub chain_id: u64,
    /// Market holding the fixed-rate debt.
    pub debt_market: Address,
    /// Underlying asset of the debt market.
    pub debt_asset: Address,
    /// Latest account plugin; accounts with another plugin use legacy paths.
    pub exa_plugin: Address,
    /// Proposal manager holding the delayed-proposal queue.
    pub proposal_manager: Address,
    /// Account previewer exposing `pendingProposals`.
    pub exa_previewer: Address,
    /// Market previewer exposing `previewBorrowAtMaturity`.
    pub market_previewer: Address,
    /// Auditor for prices.
    pub auditor: Address,
    /// Flash-loan reservoir whose balance caps repayments.
    pub liquidity_reservoir: Address,
    /// Refetch interval for quotes and balances.
    pub poll_interval: Duration,
    /// Grace period after a proposal unlocks.
    pub proposal_expiry: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            debt_market: Address::ZERO,
            debt_asset: Address::ZERO,
            exa_plugin: Address::ZERO,
            proposal_manager: Address::ZERO,
            exa_previewer: Address::ZERO,
            market_previewer: Address::ZERO,
            auditor: Address::ZERO,
            liquidity_reservoir: DEFAULT_LIQUIDITY_RESERVOIR,
            poll_interval: DEFAULT_POLL_INTERVAL,
            proposal_expiry: DEFAULT_PROPOSAL_EXPIRY,
        }
    }
}

impl SettlementConfig {
    /// Create a configuration for the given debt market and asset.
    pub fn new(debt_market: Address, debt_asset: Address) -> Self {
        Self {
            debt_market,
            debt_asset,
            ..Self::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_exa_plugin(mut self, plugin: Address) -> Self {
        self.exa_plugin = plugin;
        self
    }

    pub fn with_proposal_manager(mut self, manager: Address) -> Self {
        self.proposal_manager = manager;
        self
    }

    pub fn with_exa_previewer(mut self, previewer: Address) -> Self {
        self.exa_previewer = previewer;
        self
    }

    pub fn with_market_previewer(mut self, previewer: Address) -> Self {
        self.market_previewer = previewer;
        self
    }

    pub fn with_auditor(mut self, auditor: Address) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn with_liquidity_reservoir(mut self, reservoir: Address) -> Self {
        self.liquidity_reservoir = reservoir;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_proposal_expiry(mut self, expiry: Duration) -> Self {
        self.proposal_expiry = expiry;
        self
    }

    /// Checks that the addresses settlement depends on are set.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("debt market", self.debt_market),
            ("debt asset", self.debt_asset),
            ("exa plugin", self.exa_plugin),
            ("proposal manager", self.proposal_manager),
        ];
        for (name, value) in required {
            if value.is_zero() {
                return Err(ApiError::InvalidConfig(format!("{} address is not set", name)));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(ApiError::InvalidConfig("poll interval must be positive".to_string()));
        }
        Ok(())
    }
}
