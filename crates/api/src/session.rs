//! A repayment session for one fixed position.
//!
//! [`SettlementSession`] owns everything a repayment needs: the chain
//! context, the selected funding asset, the requested amount, both quote
//! polls, the denylist and the settlement state machine. Derived values
//! (mode, caps, max repay, quote requests, the plan) are recomputed from
//! those inputs on every call and never cached.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use exa_credit_sim::capping::{
    apply_slippage, available_for_repayment, liquidity_ceiling, max_repay_input,
};
use exa_credit_sim::{
    discount_or_penalty, fixed_repay_assets, FixedPosition, MarketSnapshot, RepayAdjustment, RepayCap,
    RepaySnapshot, Selection, REPAY_SLIPPAGE,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::SettlementConfig;
use crate::denylist::Denylist;
use crate::error::{ApiError, Result};
use crate::mode::{FundingAsset, SettlementMode};
use crate::pipeline::{QuoteKind, QuotePipeline, QuoteState};
use crate::reader::ChainReader;
use crate::router::{QuoteRequest, RepaymentRoute, RouterQuoter};
use crate::settlement::{
    build_plan, ChainWriter, Failure, PlanInputs, Settlement, SettlementPlan, SettlementState, SimulationOutcome,
};

/// Chain state a session computes against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Debt market, read with the account's positions
    pub debt: MarketSnapshot,
    /// First installed plugin of the account
    pub plugin: Option<Address>,
    /// Debt asset held by the flash-loan reservoir, `None` when uncapped
    pub reservoir_balance: Option<U256>,
    pub now: u64,
}

/// Everything the amount selector shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayPreview {
    pub mode: SettlementMode,
    pub position: FixedPosition,
    /// Face value of the whole position
    pub position_value: U256,
    /// Selected position assets
    pub position_assets: U256,
    /// Assets that settle the selection now
    pub repay_assets: U256,
    /// `repay_assets` padded by the repay slippage
    pub max_repay: U256,
    pub adjustment: RepayAdjustment,
    pub ceiling: U256,
    /// Debt asset the funding source can provide
    pub available: U256,
    pub max_position_assets: U256,
    pub cap: RepayCap,
}

/// Quote requests for the current inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteRequests {
    pub probe: Option<QuoteRequest>,
    pub firm: Option<QuoteRequest>,
}

/// Repayment of the account's position at `maturity`.
pub struct SettlementSession {
    config: SettlementConfig,
    account: Address,
    maturity: u64,
    reader: Arc<dyn ChainReader>,
    pipeline: QuotePipeline,
    denylist: Arc<RwLock<Denylist>>,
    settlement: Settlement,
    context: Option<SessionContext>,
    funding: Option<FundingAsset>,
    position_assets: U256,
    closed: bool,
}

impl SettlementSession {
    /// Starts a session. Quote polls run on the current runtime until the
    /// session is closed or dropped.
    pub fn new(
        config: SettlementConfig,
        account: Address,
        maturity: u64,
        reader: Arc<dyn ChainReader>,
        quoter: Arc<dyn RouterQuoter>,
        writer: Arc<dyn ChainWriter>,
    ) -> Result<Self> {
        config.validate()?;
        let denylist = Arc::new(RwLock::new(Denylist::new()));
        let pipeline = QuotePipeline::spawn(quoter, Arc::clone(&denylist), config.poll_interval);
        Ok(Self {
            config,
            account,
            maturity,
            reader,
            pipeline,
            denylist,
            settlement: Settlement::new(writer),
            context: None,
            funding: None,
            position_assets: U256::ZERO,
            closed: false,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn maturity(&self) -> u64 {
        self.maturity
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn funding(&self) -> Option<&FundingAsset> {
        self.funding.as_ref()
    }

    pub fn position_assets(&self) -> U256 {
        self.position_assets
    }

    pub fn state(&self) -> &SettlementState {
        self.settlement.state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(ApiError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Reads the debt market, plugin and reservoir balance, and refreshes the
    /// funding asset's available amount.
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_open()?;
        let reader = Arc::clone(&self.reader);
        let reservoir = self.config.liquidity_reservoir;
        let (debt, plugin, reservoir_balance) = futures::try_join!(
            reader.read_market_snapshot(self.config.debt_market, Some(self.account)),
            reader.read_installed_plugin(self.account),
            async {
                if reservoir.is_zero() {
                    Ok(None)
                } else {
                    reader.read_token_balance(self.config.debt_asset, reservoir).await.map(Some)
                }
            },
        )?;
        let now = debt.timestamp;

        if let Some(funding) = self.funding.clone() {
            let available = match &funding {
                FundingAsset::Protocol { market, .. } => reader.read_account_deposit(*market, self.account).await?,
                FundingAsset::External { token, .. } => reader.read_token_balance(*token, self.account).await?,
            };
            self.funding = Some(with_available(funding, available));
        }
        self.set_context(SessionContext {
            debt,
            plugin,
            reservoir_balance,
            now,
        })
    }

    /// Replaces the chain context.
    pub fn set_context(&mut self, context: SessionContext) -> Result<()> {
        self.ensure_open()?;
        self.context = Some(context);
        self.update_quotes()
    }

    /// Funds the repayment from the account's deposit in `market`.
    pub async fn fund_from_market(&mut self, market: Address) -> Result<()> {
        self.ensure_open()?;
        let (snapshot, available) = futures::try_join!(
            self.reader.read_market_snapshot(market, None),
            self.reader.read_account_deposit(market, self.account),
        )?;
        self.select_funding(FundingAsset::from_market(&snapshot, available))
    }

    /// Funds the repayment from a token held outside the protocol.
    pub async fn fund_from_token(&mut self, token: Address, decimals: u8, usd_price: U256) -> Result<()> {
        self.ensure_open()?;
        let available = self.reader.read_token_balance(token, self.account).await?;
        self.select_funding(FundingAsset::External {
            token,
            decimals,
            usd_price,
            available,
        })
    }

    pub fn select_funding(&mut self, funding: FundingAsset) -> Result<()> {
        self.ensure_open()?;
        debug!(token = %funding.token(), available = %funding.available(), "funding selected");
        self.funding = Some(funding);
        self.update_quotes()
    }

    fn context_ref(&self) -> Result<&SessionContext> {
        self.context
            .as_ref()
            .ok_or_else(|| ApiError::SnapshotUnavailable("session not refreshed".to_string()))
    }

    fn funding_ref(&self) -> Result<&FundingAsset> {
        self.funding
            .as_ref()
            .ok_or_else(|| ApiError::InvalidConfig("no funding asset selected".to_string()))
    }

    /// Settlement mode for the current funding asset and plugin.
    pub fn mode(&self) -> Result<SettlementMode> {
        let context = self.context_ref()?;
        let funding = self.funding_ref()?;
        let plugin_is_latest = context.plugin == Some(self.config.exa_plugin);
        Ok(SettlementMode::for_asset(funding, self.config.debt_market, plugin_is_latest))
    }

    fn position(&self) -> Result<(FixedPosition, RepaySnapshot)> {
        let context = self.context_ref()?;
        let no_position = ApiError::NoPosition { maturity: self.maturity };
        let position = *context.debt.position(self.maturity).ok_or(no_position)?;
        let repay = RepaySnapshot::from_market(&context.debt, self.maturity)
            .ok_or(ApiError::NoPosition { maturity: self.maturity })?;
        Ok((position, repay))
    }

    /// Assets that settle the selected position assets, padded by slippage.
    pub fn max_repay(&self) -> Result<U256> {
        let (_, repay) = self.position()?;
        let now = self.context_ref()?.now;
        let repay_assets = fixed_repay_assets(&repay, self.position_assets, now)?;
        Ok(apply_slippage(repay_assets, REPAY_SLIPPAGE)?)
    }

    /// Quote requests implied by the current inputs. Only routed modes quote.
    pub fn quote_requests(&self) -> Result<QuoteRequests> {
        if self.context.is_none() || self.funding.is_none() || !self.settlement.simulations_enabled() {
            return Ok(QuoteRequests::default());
        }
        let mode = self.mode()?;
        if !mode.uses_router() {
            return Ok(QuoteRequests::default());
        }
        let funding = self.funding_ref()?;
        let to_address = if mode == SettlementMode::LegacyCrossRepay {
            self.config.exa_plugin
        } else {
            self.account
        };
        let request = |amount: U256| QuoteRequest {
            from_token: funding.token(),
            to_token: self.config.debt_asset,
            amount,
            from_address: self.account,
            to_address,
        };

        let probe = (!funding.available().is_zero()).then(|| request(funding.available()));
        let firm = if self.position_assets.is_zero() {
            None
        } else {
            let max_repay = self.max_repay()?;
            (!max_repay.is_zero()).then(|| request(max_repay))
        };
        Ok(QuoteRequests { probe, firm })
    }

    fn update_quotes(&self) -> Result<()> {
        let requests = match self.quote_requests() {
            Ok(requests) => requests,
            // no position yet, nothing to quote
            Err(ApiError::NoPosition { .. }) => QuoteRequests::default(),
            Err(e) => return Err(e),
        };
        self.pipeline.set_probe(requests.probe);
        self.pipeline.set_firm(requests.firm);
        Ok(())
    }

    async fn current_route(&self, kind: QuoteKind, request: Option<&QuoteRequest>) -> Option<RepaymentRoute> {
        let request = request?;
        let state = match kind {
            QuoteKind::Indicative => self.pipeline.probe(),
            QuoteKind::Firm => self.pipeline.firm(),
        };
        let denylist = self.denylist.read().await;
        state.route_for(request, &denylist).cloned()
    }

    /// Amount selector view of the current inputs.
    pub async fn preview(&self) -> Result<RepayPreview> {
        let context = self.context_ref()?;
        let funding = self.funding_ref()?;
        let mode = self.mode()?;
        let (position, repay) = self.position()?;
        let now = context.now;
        let position_value = position.position_assets();

        let ceiling = match context.reservoir_balance {
            Some(balance) => liquidity_ceiling(balance)?,
            None => U256::MAX,
        };
        let native = funding.market() == Some(self.config.debt_market);
        let available = if native {
            funding.available()
        } else {
            let requests = self.quote_requests()?;
            match self.current_route(QuoteKind::Indicative, requests.probe.as_ref()).await {
                Some(route) => available_for_repayment(route.to_amount)?,
                None => U256::ZERO,
            }
        };
        let max_position_assets = max_repay_input(&repay, ceiling, available, position_value, REPAY_SLIPPAGE, now)?;
        let cap = RepayCap::new(max_position_assets, position_value, ceiling);

        let repay_assets = fixed_repay_assets(&repay, self.position_assets, now)?;
        Ok(RepayPreview {
            mode,
            position,
            position_value,
            position_assets: self.position_assets,
            repay_assets,
            max_repay: apply_slippage(repay_assets, REPAY_SLIPPAGE)?,
            adjustment: discount_or_penalty(repay_assets, self.position_assets)?,
            ceiling,
            available,
            max_position_assets,
            cap,
        })
    }

    /// Selects the position assets to repay, clamped to the current cap.
    pub async fn set_position_assets(&mut self, requested: U256) -> Result<Selection> {
        self.ensure_open()?;
        let cap = self.preview().await?.cap;
        let selection = cap.clamp(requested);
        if selection.amount != self.position_assets {
            debug!(requested = %requested, selected = %selection.amount, "repay amount changed");
        }
        self.position_assets = selection.amount;
        self.update_quotes()?;
        Ok(selection)
    }

    /// The settlement for the current inputs.
    pub async fn plan(&self) -> Result<SettlementPlan> {
        if self.position_assets.is_zero() {
            return Err(ApiError::NothingToRepay);
        }
        let funding = self.funding_ref()?;
        let mode = self.mode()?;
        let preview = self.preview().await?;
        // the cap may have shrunk since the amount was selected
        if self.position_assets > preview.cap.effective_max {
            return Err(ApiError::InsufficientLiquidity {
                required: self.position_assets,
                available: preview.cap.effective_max,
            });
        }
        let route = if mode.uses_router() {
            let requests = self.quote_requests()?;
            self.current_route(QuoteKind::Firm, requests.firm.as_ref()).await
        } else {
            None
        };
        build_plan(&PlanInputs {
            config: &self.config,
            account: self.account,
            mode,
            funding,
            maturity: self.maturity,
            position_assets: self.position_assets,
            max_repay: preview.max_repay,
            route: route.as_ref(),
        })
    }

    /// Simulates the current plan if it changed.
    ///
    /// A route tool revert denylists the tool and asks for fresh quotes; the
    /// next call simulates the new route.
    pub async fn simulate(&mut self) -> Result<SimulationOutcome> {
        self.ensure_open()?;
        if self.position_assets.is_zero() || !self.settlement.simulations_enabled() {
            return Ok(SimulationOutcome::Skipped);
        }
        let plan = match self.plan().await {
            Ok(plan) => plan,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.settlement.block(&e);
                return Ok(SimulationOutcome::Failed(Failure::from(&e)));
            }
        };
        let outcome = self.settlement.simulate(plan).await?;
        if let SimulationOutcome::ToolReverted(tool) = &outcome {
            if self.denylist.write().await.insert(tool.clone()) {
                warn!(%tool, "denylisting router tool");
            }
            self.pipeline.refresh();
        }
        Ok(outcome)
    }

    /// Submits the simulated plan, provided the inputs have not changed.
    pub async fn execute(&mut self) -> Result<B256> {
        self.ensure_open()?;
        let current = self.plan().await?;
        let result = self.settlement.execute(&current).await;
        // quotes stop with simulations
        self.update_quotes()?;
        result
    }

    /// Returns to `Idle` after a finished or failed settlement.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.settlement.reset();
        self.update_quotes()
    }

    pub async fn denylist(&self) -> Denylist {
        self.denylist.read().await.clone()
    }

    /// Waits until a poll publishes a state matching `done`, or `timeout`.
    pub async fn wait_for_quote(
        &self,
        kind: QuoteKind,
        timeout: Duration,
        done: impl FnMut(&QuoteState) -> bool,
    ) -> Result<QuoteState> {
        self.ensure_open()?;
        let mut rx = self.pipeline.subscribe(kind);
        let result = match tokio::time::timeout(timeout, rx.wait_for(done)).await {
            Ok(Ok(state)) => Ok(state.clone()),
            Ok(Err(_)) => Err(ApiError::SessionClosed),
            Err(_) => Err(ApiError::QuoteUnavailable(format!("no {:?} quote after {:?}", kind, timeout))),
        };
        result
    }

    /// Stops the polls. Later calls fail with [`ApiError::SessionClosed`].
    pub fn close(&mut self) {
        if !self.closed {
            info!(account = %self.account, maturity = self.maturity, "closing settlement session");
            self.pipeline.shutdown();
            self.closed = true;
        }
    }
}

fn with_available(funding: FundingAsset, available: U256) -> FundingAsset {
    match funding {
        FundingAsset::Protocol {
            market,
            asset,
            decimals,
            usd_price,
            ..
        } => FundingAsset::Protocol {
            market,
            asset,
            decimals,
            usd_price,
            available,
        },
        FundingAsset::External {
            token,
            decimals,
            usd_price,
            ..
        } => FundingAsset::External {
            token,
            decimals,
            usd_price,
            available,
        },
    }
}
