//! Settlement simulation and execution.
//!
//! A [`SettlementPlan`] is the exact call a repayment submits, together with
//! what its simulation needs. [`Settlement`] drives a plan through
//!
//! ```text
//! Idle -> Simulating -> SimulationFailed | SimulationReady -> Executing -> Succeeded | Failed
//! ```
//!
//! and only ever executes the plan it last simulated successfully.

use std::sync::Arc;

use alloy::network::ReceiptResponse;
use alloy::providers::{PendingTransactionBuilder, Provider};
use alloy::rpc::types::state::{AccountOverride, StateOverride};
use alloy::rpc::types::BlockOverrides;
use alloy::sol_types::{decode_revert_reason, SolError};
use alloy::transports::{RpcError, TransportErrorKind};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use exa_credit_contracts::account::{IExaAccount, IProposalManager};
use exa_credit_contracts::market::IMarket;
use exa_credit_contracts::proposal::{execute_proposal, proposal_storage_overrides};
use exa_credit_contracts::settlement::{self as calls, ExternalRepay};
use exa_credit_contracts::{ContractError, HttpProvider, PreparedCall, ProposalPayload, QueuedProposal};
use exa_credit_sim::capping::{
    cross_repay_max_amount_in, pad_input, ROUTINE_PADDING_DIVISOR, SWAP_SLIPPAGE_DIVISOR,
};
use tracing::{info, warn};

use crate::config::SettlementConfig;
use crate::error::{ApiError, ErrorCategory, Result};
use crate::mode::{FundingAsset, SettlementMode};
use crate::reader::{ChainReader, RpcChainReader};
use crate::router::RepaymentRoute;

/// Revert name that reflects a market condition rather than a bad route.
pub const MARKET_FROZEN: &str = "MarketFrozen";

/// JSON-RPC code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;

/// A proposal to queue before simulating its execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSimulation {
    pub market: Address,
    pub amount: U256,
    pub payload: ProposalPayload,
    /// Contracts the proposal manager must allow the account to call
    pub targets: Vec<Address>,
}

/// Balance a route draws from, checked before submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsCheck {
    pub required: U256,
    pub available: U256,
}

/// The call a repayment submits and how to simulate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub mode: SettlementMode,
    pub account: Address,
    pub call: PreparedCall,
    pub proposal: Option<ProposalSimulation>,
    pub route_tool: Option<String>,
    pub funds: Option<FundsCheck>,
}

/// Inputs of [`build_plan`].
#[derive(Debug, Clone)]
pub struct PlanInputs<'a> {
    pub config: &'a SettlementConfig,
    pub account: Address,
    pub mode: SettlementMode,
    pub funding: &'a FundingAsset,
    pub maturity: u64,
    pub position_assets: U256,
    pub max_repay: U256,
    pub route: Option<&'a RepaymentRoute>,
}

fn require_route<'a>(route: Option<&'a RepaymentRoute>) -> Result<&'a RepaymentRoute> {
    route.ok_or_else(|| ApiError::QuoteUnavailable("no firm route yet".to_string()))
}

/// Builds the settlement for the selected mode.
pub fn build_plan(inputs: &PlanInputs<'_>) -> Result<SettlementPlan> {
    let config = inputs.config;
    let account = inputs.account;
    let route_tool = inputs.route.filter(|_| inputs.mode.uses_router()).map(|r| r.tool.clone());

    let (call, proposal, funds) = match inputs.mode {
        SettlementMode::Repay => {
            let payload = ProposalPayload::RepayAtMaturity {
                maturity: inputs.maturity,
                position_assets: inputs.position_assets,
            };
            let call = calls::repay_proposal(
                account,
                config.debt_market,
                inputs.maturity,
                inputs.position_assets,
                inputs.max_repay,
            );
            let proposal = ProposalSimulation {
                market: config.debt_market,
                amount: inputs.max_repay,
                payload,
                targets: vec![config.debt_asset],
            };
            (call, Some(proposal), None)
        }
        SettlementMode::CrossRepay => {
            let route = require_route(inputs.route)?;
            let market = inputs
                .funding
                .market()
                .ok_or_else(|| ApiError::InvalidConfig("cross repay needs a protocol asset".to_string()))?;
            let max_amount_in = cross_repay_max_amount_in(route.from_amount)?;
            let call = calls::cross_repay_proposal(
                account,
                market,
                max_amount_in,
                inputs.maturity,
                inputs.position_assets,
                inputs.max_repay,
                route.call_data.clone(),
            );
            let proposal = ProposalSimulation {
                market,
                amount: max_amount_in,
                payload: ProposalPayload::CrossRepayAtMaturity {
                    maturity: inputs.maturity,
                    position_assets: inputs.position_assets,
                    max_repay: inputs.max_repay,
                    route: route.call_data.clone(),
                },
                targets: vec![route.to, inputs.funding.token(), config.debt_asset],
            };
            (call, Some(proposal), None)
        }
        SettlementMode::LegacyRepay => (calls::legacy_repay(account, inputs.maturity), None, None),
        SettlementMode::LegacyCrossRepay => {
            let collateral = inputs
                .funding
                .market()
                .ok_or_else(|| ApiError::InvalidConfig("cross repay needs a protocol asset".to_string()))?;
            (calls::legacy_cross_repay(account, inputs.maturity, collateral), None, None)
        }
        SettlementMode::External => {
            let route = require_route(inputs.route)?;
            let swap = route.as_swap_route();
            let call = calls::external_repay(&ExternalRepay {
                account,
                from_asset: inputs.funding.token(),
                swap_allowance: pad_input(route.from_amount, SWAP_SLIPPAGE_DIVISOR)?,
                debt_asset: config.debt_asset,
                debt_market: config.debt_market,
                maturity: inputs.maturity,
                position_assets: inputs.position_assets,
                max_repay: inputs.max_repay,
                repay_allowance: pad_input(inputs.max_repay, ROUTINE_PADDING_DIVISOR)?,
                route: &swap,
            });
            let funds = FundsCheck {
                required: route.from_amount,
                available: inputs.funding.available(),
            };
            (call, None, Some(funds))
        }
    };

    Ok(SettlementPlan {
        mode: inputs.mode,
        account,
        call,
        proposal,
        route_tool,
        funds,
    })
}

/// Name of a known custom error in revert data.
pub fn known_error_name(data: &[u8]) -> Option<&'static str> {
    let selector = data.get(..4)?;
    let known: [([u8; 4], &'static str); 6] = [
        (IMarket::MarketFrozen::SELECTOR, "MarketFrozen"),
        (IMarket::Disagreement::SELECTOR, "Disagreement"),
        (IMarket::InsufficientProtocolLiquidity::SELECTOR, "InsufficientProtocolLiquidity"),
        (IExaAccount::NotNext::SELECTOR, "NotNext"),
        (IExaAccount::NoProposal::SELECTOR, "NoProposal"),
        (IExaAccount::Timelocked::SELECTOR, "Timelocked"),
    ];
    known
        .iter()
        .find(|(s, _)| s.as_slice() == selector)
        .map(|(_, name)| *name)
}

/// Maps a JSON-RPC failure to a revert, a rejection or a transport error.
pub fn classify_rpc_error(err: &RpcError<TransportErrorKind>) -> ApiError {
    if let Some(payload) = err.as_error_resp() {
        if payload.code == USER_REJECTED_CODE {
            return ApiError::UserRejectedSignature;
        }
        if let Some(data) = payload.as_revert_data() {
            let error_name = known_error_name(&data).map(str::to_string);
            let message = decode_revert_reason(&data).unwrap_or_else(|| data.to_string());
            return ApiError::Reverted { error_name, message };
        }
        if payload.message.contains("revert") {
            return ApiError::Reverted {
                error_name: None,
                message: payload.message.to_string(),
            };
        }
    }
    ApiError::Contract(ContractError::RpcConnection(err.to_string()))
}

/// Turns a raw simulation error into what the session acts on.
///
/// A contract-level revert on a routed settlement blames the route's tool,
/// except for `MarketFrozen`. Other reverts block the plan.
pub fn classify_simulation_error(err: ApiError, plan: &SettlementPlan) -> ApiError {
    match err {
        ApiError::Reverted { error_name, message } => match plan.route_tool.as_deref() {
            Some(tool) if plan.mode.uses_router() && error_name.as_deref() != Some(MARKET_FROZEN) => {
                ApiError::RouteToolReverted {
                    tool: tool.to_string(),
                    reason: message,
                }
            }
            _ => ApiError::SimulationFailed(
                ApiError::Reverted { error_name, message }.to_string(),
            ),
        },
        other => other,
    }
}

/// Write access to the chain.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Dry-runs the plan. Reverts surface as [`ApiError::Reverted`].
    async fn simulate(&self, plan: &SettlementPlan) -> Result<()>;

    /// Signs and submits the call.
    async fn execute(&self, call: &PreparedCall) -> Result<B256>;

    /// Waits until the transaction is mined successfully.
    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<()>;
}

/// [`ChainWriter`] over JSON-RPC, signing as the account owner.
#[derive(Clone)]
pub struct RpcChainWriter {
    provider: HttpProvider,
    reader: RpcChainReader,
    owner: Address,
    config: SettlementConfig,
}

impl RpcChainWriter {
    pub fn new(provider: HttpProvider, owner: Address, config: SettlementConfig) -> Self {
        let reader = RpcChainReader::new(provider.clone(), config.clone());
        Self {
            provider,
            reader,
            owner,
            config,
        }
    }

    async fn simulate_proposal(&self, account: Address, proposal: &ProposalSimulation) -> Result<()> {
        let manager = IProposalManager::new(self.config.proposal_manager, self.provider.clone());
        let nonce = manager
            .queueNonces(account)
            .call()
            .await
            .map_err(|e| ContractError::CallFailed(format!("queueNonces: {}", e)))?;
        let (delay, now) = futures::try_join!(self.reader.read_proposal_delay(), self.reader.chain_time())?;

        let writes = proposal_storage_overrides(
            &QueuedProposal {
                account,
                nonce,
                market: proposal.market,
                amount: proposal.amount,
                payload: &proposal.payload,
            },
            self.config.exa_plugin,
            &proposal.targets,
        );
        let mut overrides = StateOverride::default();
        overrides.insert(
            self.config.proposal_manager,
            AccountOverride {
                state_diff: Some(writes.into_iter().collect()),
                ..Default::default()
            },
        );
        let block = BlockOverrides {
            time: Some(now.saturating_add(delay)),
            ..Default::default()
        };

        let execution = execute_proposal(account, nonce);
        self.provider
            .call(execution.to_request(account))
            .overrides(overrides)
            .with_block_overrides(block)
            .await
            .map_err(|e| classify_rpc_error(&e))?;
        Ok(())
    }
}

#[async_trait]
impl ChainWriter for RpcChainWriter {
    async fn simulate(&self, plan: &SettlementPlan) -> Result<()> {
        self.provider
            .call(plan.call.to_request(self.owner))
            .await
            .map_err(|e| classify_rpc_error(&e))?;
        if let Some(proposal) = &plan.proposal {
            self.simulate_proposal(plan.account, proposal).await?;
        }
        Ok(())
    }

    async fn execute(&self, call: &PreparedCall) -> Result<B256> {
        let pending = self
            .provider
            .send_transaction(call.to_request(self.owner))
            .await
            .map_err(|e| classify_rpc_error(&e))?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<()> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(|e| ApiError::ExecutionFailed(e.to_string()))?;
        if receipt.status() {
            Ok(())
        } else {
            Err(ApiError::ExecutionFailed(format!("transaction {} reverted", tx_hash)))
        }
    }
}

/// Why a settlement attempt stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&ApiError> for Failure {
    fn from(err: &ApiError) -> Self {
        Self {
            category: err.error_category(),
            message: err.to_string(),
        }
    }
}

/// Observable settlement state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementState {
    Idle,
    Simulating,
    SimulationFailed(Failure),
    SimulationReady,
    Executing,
    Succeeded { tx_hash: B256 },
    Failed(Failure),
}

impl SettlementState {
    /// Whether only [`Settlement::reset`] leaves this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed(_))
    }
}

/// Result of [`Settlement::simulate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Ready,
    Failed(Failure),
    /// The route's tool reverted and should be denied
    ToolReverted(String),
    /// Nothing changed since the last simulation, or simulations are off
    Skipped,
}

/// Simulate-then-execute state machine for one session.
pub struct Settlement {
    writer: Arc<dyn ChainWriter>,
    state: SettlementState,
    simulated: Option<SettlementPlan>,
    enable_simulations: bool,
}

impl Settlement {
    pub fn new(writer: Arc<dyn ChainWriter>) -> Self {
        Self {
            writer,
            state: SettlementState::Idle,
            simulated: None,
            enable_simulations: true,
        }
    }

    pub fn state(&self) -> &SettlementState {
        &self.state
    }

    pub fn simulations_enabled(&self) -> bool {
        self.enable_simulations
    }

    /// Last plan handed to the simulator.
    pub fn simulated_plan(&self) -> Option<&SettlementPlan> {
        self.simulated.as_ref()
    }

    /// Records that no plan can be built right now.
    pub fn block(&mut self, err: &ApiError) {
        if self.enable_simulations && !self.state.is_terminal() {
            self.simulated = None;
            self.state = SettlementState::SimulationFailed(Failure::from(err));
        }
    }

    /// Simulates `plan` unless it was already simulated.
    ///
    /// Fatal errors propagate; everything else becomes state.
    pub async fn simulate(&mut self, plan: SettlementPlan) -> Result<SimulationOutcome> {
        if !self.enable_simulations || self.state.is_terminal() {
            return Ok(SimulationOutcome::Skipped);
        }
        let settled = matches!(
            self.state,
            SettlementState::SimulationReady | SettlementState::SimulationFailed(_)
        );
        if settled && self.simulated.as_ref() == Some(&plan) {
            return Ok(SimulationOutcome::Skipped);
        }

        self.state = SettlementState::Simulating;
        let result = match plan.funds {
            Some(funds) if funds.required > funds.available => Err(ApiError::InsufficientLiquidity {
                required: funds.required,
                available: funds.available,
            }),
            _ => self.writer.simulate(&plan).await,
        };
        let outcome = match result {
            Ok(()) => {
                info!(mode = %plan.mode, "simulation ready");
                self.state = SettlementState::SimulationReady;
                SimulationOutcome::Ready
            }
            Err(err) => {
                let err = classify_simulation_error(err, &plan);
                if err.is_fatal() {
                    self.state = SettlementState::SimulationFailed(Failure::from(&err));
                    self.simulated = Some(plan);
                    return Err(err);
                }
                warn!(mode = %plan.mode, error = %err, "simulation failed");
                self.state = SettlementState::SimulationFailed(Failure::from(&err));
                match err {
                    ApiError::RouteToolReverted { tool, .. } => SimulationOutcome::ToolReverted(tool),
                    other => SimulationOutcome::Failed(Failure::from(&other)),
                }
            }
        };
        self.simulated = Some(plan);
        Ok(outcome)
    }

    /// Submits the last simulated plan if it still equals `current`.
    ///
    /// The submission runs on its own task, so dropping the returned future
    /// does not cancel it.
    pub async fn execute(&mut self, current: &SettlementPlan) -> Result<B256> {
        if self.state.is_terminal() {
            return Err(ApiError::SimulationFailed("settlement already finished, reset first".to_string()));
        }
        let Some(simulated) = &self.simulated else {
            return Err(ApiError::StaleCalldata);
        };
        if simulated != current {
            return Err(ApiError::StaleCalldata);
        }
        if self.state != SettlementState::SimulationReady {
            return Err(ApiError::SimulationFailed("no successful simulation".to_string()));
        }

        self.enable_simulations = false;
        self.state = SettlementState::Executing;
        info!(mode = %simulated.mode, to = %simulated.call.to, "submitting settlement");

        let writer = Arc::clone(&self.writer);
        let call = simulated.call.clone();
        let task = tokio::spawn(async move {
            let tx_hash = writer.execute(&call).await?;
            writer.wait_for_confirmation(tx_hash).await?;
            Ok::<_, ApiError>(tx_hash)
        });
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(ApiError::ExecutionFailed(e.to_string())),
        };

        match result {
            Ok(tx_hash) => {
                info!(%tx_hash, "settlement confirmed");
                self.state = SettlementState::Succeeded { tx_hash };
                Ok(tx_hash)
            }
            Err(err) => {
                warn!(error = %err, "settlement failed");
                self.state = SettlementState::Failed(Failure::from(&err));
                Err(err)
            }
        }
    }

    /// Leaves any state for `Idle` and re-enables simulations.
    pub fn reset(&mut self) {
        self.state = SettlementState::Idle;
        self.simulated = None;
        self.enable_simulations = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;
    use alloy_primitives::Bytes;
    use exa_credit_contracts::erc20::IERC20;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MATURITY: u64 = 1000 * 2_419_200;

    #[derive(Default)]
    struct FakeWriter {
        simulations: AtomicUsize,
        executions: AtomicUsize,
        simulate_error: Mutex<Option<ApiError>>,
        reject_execution: bool,
    }

    #[async_trait]
    impl ChainWriter for FakeWriter {
        async fn simulate(&self, _plan: &SettlementPlan) -> Result<()> {
            self.simulations.fetch_add(1, Ordering::SeqCst);
            match self.simulate_error.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn execute(&self, _call: &PreparedCall) -> Result<B256> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.reject_execution {
                return Err(ApiError::UserRejectedSignature);
            }
            Ok(B256::repeat_byte(0x77))
        }

        async fn wait_for_confirmation(&self, _tx_hash: B256) -> Result<()> {
            Ok(())
        }
    }

    fn config() -> SettlementConfig {
        SettlementConfig::new(Address::repeat_byte(0x10), Address::repeat_byte(0x11))
            .with_exa_plugin(Address::repeat_byte(0x12))
            .with_proposal_manager(Address::repeat_byte(0x13))
    }

    fn collateral() -> FundingAsset {
        FundingAsset::Protocol {
            market: Address::repeat_byte(0x20),
            asset: Address::repeat_byte(0x21),
            decimals: 18,
            usd_price: U256::ZERO,
            available: U256::from(10_000u64),
        }
    }

    fn make_route(from_amount: u64) -> RepaymentRoute {
        RepaymentRoute {
            from_amount: U256::from(from_amount),
            to_amount: U256::from(1_001u64),
            call_data: Bytes::from(vec![0xab; 8]),
            tool: "odos".to_string(),
            to: Address::repeat_byte(0x55),
            value: U256::ZERO,
            gas_limit: None,
            chain_id: 10,
        }
    }

    fn make_plan(mode: SettlementMode, funding: &FundingAsset, route: Option<&RepaymentRoute>, amount: u64) -> SettlementPlan {
        let config = config();
        build_plan(&PlanInputs {
            config: &config,
            account: Address::repeat_byte(0xaa),
            mode,
            funding,
            maturity: MATURITY,
            position_assets: U256::from(amount),
            max_repay: U256::from(amount + 1),
            route,
        })
        .unwrap()
    }

    #[test]
    fn test_cross_repay_plan_pads_amount_in() {
        let route = make_route(1_000_000);
        let plan = make_plan(SettlementMode::CrossRepay, &collateral(), Some(&route), 1_000);
        let proposal = plan.proposal.unwrap();
        // 1_000_000 * 1.001 + 69
        assert_eq!(proposal.amount, U256::from(1_001_069u64));
        assert_eq!(proposal.market, Address::repeat_byte(0x20));
        assert!(proposal.targets.contains(&route.to));
        assert_eq!(plan.route_tool.as_deref(), Some("odos"));
    }

    #[test]
    fn test_routed_modes_need_a_route() {
        let config = config();
        let funding = collateral();
        let result = build_plan(&PlanInputs {
            config: &config,
            account: Address::repeat_byte(0xaa),
            mode: SettlementMode::External,
            funding: &funding,
            maturity: MATURITY,
            position_assets: U256::from(1u64),
            max_repay: U256::from(2u64),
            route: None,
        });
        assert!(matches!(result, Err(ApiError::QuoteUnavailable(_))));
    }

    #[test]
    fn test_external_plan_pads_approvals() {
        let funding = FundingAsset::External {
            token: Address::repeat_byte(0x30),
            decimals: 18,
            usd_price: U256::ZERO,
            available: U256::from(2_000_000u64),
        };
        let route = make_route(1_000_000);
        let plan = make_plan(SettlementMode::External, &funding, Some(&route), 1_000);
        assert_eq!(plan.funds.as_ref().map(|f| f.required), Some(U256::from(1_000_000u64)));

        let batch: IExaAccount::executeBatchCall = plan.call.decode().unwrap();
        assert_eq!(batch.calls.len(), 4);
        let swap_approval = IERC20::approveCall::abi_decode(&batch.calls[0].data).unwrap();
        // 0.1% on the swap input
        assert_eq!(swap_approval.amount, U256::from(1_001_000u64));
        let repay_approval = IERC20::approveCall::abi_decode(&batch.calls[2].data).unwrap();
        // dust-sized max repay still gets one unit
        assert_eq!(repay_approval.amount, U256::from(1_002u64));
    }

    #[test]
    fn test_native_repay_ignores_route_tool() {
        let route = make_route(5);
        let plan = make_plan(SettlementMode::Repay, &collateral(), Some(&route), 100);
        assert_eq!(plan.route_tool, None);
        assert_eq!(plan.call.to, Address::repeat_byte(0xaa));
    }

    #[test]
    fn test_known_error_name() {
        assert_eq!(known_error_name(&IMarket::MarketFrozen::SELECTOR), Some("MarketFrozen"));
        assert_eq!(known_error_name(&[0, 0, 0, 0]), None);
        assert_eq!(known_error_name(&[1]), None);
    }

    #[test]
    fn test_classify_blames_tool_except_market_frozen() {
        let route = make_route(5);
        let plan = make_plan(SettlementMode::CrossRepay, &collateral(), Some(&route), 100);

        let err = classify_simulation_error(
            ApiError::Reverted {
                error_name: None,
                message: "ZERO_SHARES".into(),
            },
            &plan,
        );
        assert!(matches!(err, ApiError::RouteToolReverted { ref tool, .. } if tool == "odos"));

        let err = classify_simulation_error(
            ApiError::Reverted {
                error_name: Some(MARKET_FROZEN.into()),
                message: String::new(),
            },
            &plan,
        );
        assert!(matches!(err, ApiError::SimulationFailed(_)));

        let err = classify_simulation_error(ApiError::UserRejectedSignature, &plan);
        assert!(matches!(err, ApiError::UserRejectedSignature));
    }

    #[tokio::test]
    async fn test_simulate_then_execute() {
        let writer = Arc::new(FakeWriter::default());
        let mut settlement = Settlement::new(writer.clone());
        let plan = make_plan(SettlementMode::LegacyRepay, &collateral(), None, 100);

        assert_eq!(settlement.simulate(plan.clone()).await.unwrap(), SimulationOutcome::Ready);
        assert_eq!(settlement.simulate(plan.clone()).await.unwrap(), SimulationOutcome::Skipped);
        assert_eq!(writer.simulations.load(Ordering::SeqCst), 1);

        let tx_hash = settlement.execute(&plan).await.unwrap();
        assert_eq!(tx_hash, B256::repeat_byte(0x77));
        assert_eq!(settlement.state(), &SettlementState::Succeeded { tx_hash });
        assert!(!settlement.simulations_enabled());

        // terminal until reset
        assert_eq!(settlement.simulate(plan.clone()).await.unwrap(), SimulationOutcome::Skipped);
        settlement.reset();
        assert_eq!(settlement.state(), &SettlementState::Idle);
        assert!(settlement.simulations_enabled());
    }

    #[tokio::test]
    async fn test_execute_rejects_changed_inputs() {
        let writer = Arc::new(FakeWriter::default());
        let mut settlement = Settlement::new(writer.clone());
        let simulated = make_plan(SettlementMode::LegacyRepay, &collateral(), None, 100);
        settlement.simulate(simulated).await.unwrap();

        let changed = make_plan(SettlementMode::Repay, &collateral(), None, 150);
        assert!(matches!(settlement.execute(&changed).await, Err(ApiError::StaleCalldata)));
        assert_eq!(writer.executions.load(Ordering::SeqCst), 0);
        assert_eq!(settlement.state(), &SettlementState::SimulationReady);
    }

    #[tokio::test]
    async fn test_tool_revert_is_reported_for_denylisting() {
        let writer = Arc::new(FakeWriter::default());
        *writer.simulate_error.lock().unwrap() = Some(ApiError::Reverted {
            error_name: None,
            message: "swap failed".into(),
        });
        let mut settlement = Settlement::new(writer.clone());
        let route = make_route(5);
        let plan = make_plan(SettlementMode::CrossRepay, &collateral(), Some(&route), 100);

        let outcome = settlement.simulate(plan).await.unwrap();
        assert_eq!(outcome, SimulationOutcome::ToolReverted("odos".to_string()));
        assert!(matches!(settlement.state(), SettlementState::SimulationFailed(f) if f.category == ErrorCategory::Transient));

        // a new route re-simulates
        let route = make_route(6);
        let next = make_plan(SettlementMode::CrossRepay, &collateral(), Some(&route), 100);
        assert_eq!(settlement.simulate(next).await.unwrap(), SimulationOutcome::Ready);
    }

    #[tokio::test]
    async fn test_external_route_beyond_balance_fails_without_rpc() {
        let writer = Arc::new(FakeWriter::default());
        let mut settlement = Settlement::new(writer.clone());
        let funding = FundingAsset::External {
            token: Address::repeat_byte(0x30),
            decimals: 18,
            usd_price: U256::ZERO,
            available: U256::from(100u64),
        };
        let route = make_route(101);
        let plan = make_plan(SettlementMode::External, &funding, Some(&route), 100);

        let outcome = settlement.simulate(plan).await.unwrap();
        assert!(matches!(outcome, SimulationOutcome::Failed(f) if f.category == ErrorCategory::UserAction));
        assert_eq!(writer.simulations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_signature_fails_execution() {
        let writer = Arc::new(FakeWriter {
            reject_execution: true,
            ..FakeWriter::default()
        });
        let mut settlement = Settlement::new(writer);
        let plan = make_plan(SettlementMode::LegacyRepay, &collateral(), None, 100);
        settlement.simulate(plan.clone()).await.unwrap();

        assert!(matches!(settlement.execute(&plan).await, Err(ApiError::UserRejectedSignature)));
        assert!(matches!(settlement.state(), SettlementState::Failed(f) if f.category == ErrorCategory::UserAction));
    }

    #[tokio::test]
    async fn test_fatal_errors_propagate() {
        let writer = Arc::new(FakeWriter::default());
        *writer.simulate_error.lock().unwrap() = Some(ApiError::from(exa_credit_sim::SimError::ArithmeticOverflow));
        let mut settlement = Settlement::new(writer);
        let plan = make_plan(SettlementMode::LegacyRepay, &collateral(), None, 100);
        assert!(settlement.simulate(plan).await.unwrap_err().is_fatal());
    }
}
