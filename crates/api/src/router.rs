//! Swap router quotes.
//!
//! Two kinds of quotes feed a repayment: an *indicative* quote that prices
//! the whole available balance of the funding asset (by input amount), and a
//! *firm* quote for the exact debt amount needed (by output amount) whose
//! calldata is executed. [`LifiRouter`] serves both from the LI.FI quote API.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use exa_credit_contracts::SwapRoute;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::error::{ApiError, Result};

/// Parameters of a quote.
///
/// `amount` is the input amount for indicative quotes and the output amount
/// for firm quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    pub from_token: Address,
    pub to_token: Address,
    pub amount: U256,
    pub from_address: Address,
    pub to_address: Address,
}

/// An executable swap route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepaymentRoute {
    pub from_amount: U256,
    pub to_amount: U256,
    pub call_data: Bytes,
    /// Router tool (exchange or bridge) that executes the swap
    pub tool: String,
    /// Router contract to call
    pub to: Address,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub chain_id: u64,
}

impl RepaymentRoute {
    /// The swap as a call target for settlement builders.
    pub fn as_swap_route(&self) -> SwapRoute {
        SwapRoute {
            to: self.to,
            data: self.call_data.clone(),
            value: self.value,
        }
    }
}

/// Source of swap quotes.
#[async_trait]
pub trait RouterQuoter: Send + Sync {
    /// Prices swapping `request.amount` of the input token.
    async fn quote_indicative(&self, request: &QuoteRequest, deny_exchanges: &[String]) -> Result<RepaymentRoute>;

    /// Executable route producing exactly `request.amount` of the output token.
    async fn quote_firm(&self, request: &QuoteRequest, deny_exchanges: &[String]) -> Result<RepaymentRoute>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiQuote {
    tool: String,
    estimate: LifiEstimate,
    transaction_request: Option<LifiTransactionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiEstimate {
    from_amount: String,
    to_amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiTransactionRequest {
    to: Option<Address>,
    data: Option<Bytes>,
    value: Option<String>,
    gas_limit: Option<String>,
    chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LifiErrorBody {
    message: Option<String>,
}

fn parse_amount(field: &str, value: &str) -> Result<U256> {
    value
        .parse::<U256>()
        .map_err(|e| ApiError::Parse(format!("{} {:?}: {}", field, value, e)))
}

impl LifiQuote {
    fn into_route(self, default_chain_id: u64) -> Result<RepaymentRoute> {
        let tx = self
            .transaction_request
            .ok_or_else(|| ApiError::QuoteUnavailable("missing quote transaction data".to_string()))?;
        let (Some(to), Some(data)) = (tx.to, tx.data) else {
            return Err(ApiError::QuoteUnavailable("missing quote transaction data".to_string()));
        };
        let value = match tx.value.as_deref() {
            Some(v) => parse_amount("value", v)?,
            None => U256::ZERO,
        };
        let gas_limit = match tx.gas_limit.as_deref() {
            Some(v) => Some(parse_amount("gasLimit", v)?.saturating_to::<u64>()),
            None => None,
        };
        Ok(RepaymentRoute {
            from_amount: parse_amount("fromAmount", &self.estimate.from_amount)?,
            to_amount: parse_amount("toAmount", &self.estimate.to_amount)?,
            call_data: data,
            tool: self.tool,
            to,
            value,
            gas_limit,
            chain_id: tx.chain_id.unwrap_or(default_chain_id),
        })
    }
}

/// LI.FI quote API client.
#[derive(Debug, Clone)]
pub struct LifiRouter {
    http_client: Client,
    config: RouterConfig,
}

impl LifiRouter {
    /// Create a router client with custom configuration.
    pub fn with_config(config: RouterConfig) -> Result<Self> {
        config.endpoint("")?;
        let http_client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http_client, config })
    }

    /// Create a router client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RouterConfig::default())
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn query(
        &self,
        request: &QuoteRequest,
        amount_param: &'static str,
        slippage: f64,
        deny_exchanges: &[String],
    ) -> Vec<(&'static str, String)> {
        let chain = self.config.chain_id.to_string();
        let mut query = vec![
            ("fromChain", chain.clone()),
            ("toChain", chain),
            ("fromToken", request.from_token.to_string()),
            ("toToken", request.to_token.to_string()),
            (amount_param, request.amount.to_string()),
            ("fromAddress", request.from_address.to_string()),
            ("toAddress", request.to_address.to_string()),
            ("slippage", slippage.to_string()),
            ("fee", self.config.fee.to_string()),
            ("integrator", self.config.integrator.clone()),
        ];
        query.extend(deny_exchanges.iter().map(|tool| ("denyExchanges", tool.clone())));
        query
    }

    async fn fetch(&self, path: &str, query: Vec<(&'static str, String)>) -> Result<RepaymentRoute> {
        let url = self.config.endpoint(path)?;
        debug!(url = %url, "requesting router quote");

        let mut builder = self.http_client.get(&url).query(&query);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-lifi-api-key", key);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<LifiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            warn!(%status, %message, "router quote failed");
            return Err(ApiError::QuoteUnavailable(format!("{}: {}", status, message)));
        }

        let quote: LifiQuote =
            serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
        quote.into_route(self.config.chain_id)
    }
}

#[async_trait]
impl RouterQuoter for LifiRouter {
    async fn quote_indicative(&self, request: &QuoteRequest, deny_exchanges: &[String]) -> Result<RepaymentRoute> {
        let query = self.query(request, "fromAmount", self.config.probe_slippage, deny_exchanges);
        self.fetch("v1/quote", query).await
    }

    async fn quote_firm(&self, request: &QuoteRequest, deny_exchanges: &[String]) -> Result<RepaymentRoute> {
        let query = self.query(request, "toAmount", self.config.firm_slippage, deny_exchanges);
        self.fetch("v1/quote/toAmount", query).await
    }
}
