//! Test helpers: in-memory chain and router fakes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use exa_credit_api::reader::apply_preview_values;
use exa_credit_api::{
    ApiError, ChainReader, ChainWriter, PendingProposal, QuoteRequest, RepaymentRoute, Result, RouterQuoter,
    SettlementConfig, SettlementPlan,
};
use exa_credit_contracts::PreparedCall;
use exa_credit_sim::{FixedPool, FixedPosition, MarketSnapshot, MATURITY_INTERVAL};

pub const MATURITY: u64 = 1000 * MATURITY_INTERVAL;
pub const NOW: u64 = MATURITY - 10 * 86_400;

pub const DEBT_MARKET: Address = Address::repeat_byte(0x10);
pub const USDC: Address = Address::repeat_byte(0x11);
pub const PLUGIN: Address = Address::repeat_byte(0x12);
pub const PROPOSAL_MANAGER: Address = Address::repeat_byte(0x13);
pub const WETH_MARKET: Address = Address::repeat_byte(0x20);
pub const WETH: Address = Address::repeat_byte(0x21);
pub const OP: Address = Address::repeat_byte(0x40);
pub const SWAPPER: Address = Address::repeat_byte(0x55);
pub const ACCOUNT: Address = Address::repeat_byte(0xaa);

pub fn usdc(amount: u64) -> U256 {
    U256::from(amount) * U256::from(1_000_000u64)
}

pub fn settlement_config() -> SettlementConfig {
    SettlementConfig::new(DEBT_MARKET, USDC)
        .with_exa_plugin(PLUGIN)
        .with_proposal_manager(PROPOSAL_MANAGER)
}

/// USDC market where the account owes 100 USDC at `MATURITY`, with no
/// early-repay discount.
pub fn debt_snapshot() -> MarketSnapshot {
    let mut snapshot = MarketSnapshot::new(DEBT_MARKET, USDC, 6);
    snapshot.total_floating_deposit_assets = usdc(1_000_000);
    snapshot.max_future_pools = 3;
    snapshot.fixed_pools.push(FixedPool {
        maturity: MATURITY,
        supplied: usdc(10_000),
        borrowed: usdc(10_000),
        unassigned_earnings: U256::ZERO,
        last_accrual: NOW,
    });
    snapshot.fixed_borrow_positions.push(FixedPosition {
        maturity: MATURITY,
        principal: usdc(99),
        fee: usdc(1),
        preview_value: U256::ZERO,
    });
    snapshot.timestamp = NOW;
    snapshot
}

pub fn weth_snapshot() -> MarketSnapshot {
    let mut snapshot = MarketSnapshot::new(WETH_MARKET, WETH, 18);
    snapshot.timestamp = NOW;
    snapshot
}

/// Chain reader over fixed state.
pub struct FakeReader {
    pub plugin: Option<Address>,
    pub snapshots: HashMap<Address, MarketSnapshot>,
    pub balances: Mutex<HashMap<(Address, Address), U256>>,
    pub deposits: HashMap<(Address, Address), U256>,
    pub proposals: Vec<PendingProposal>,
    pub next_nonce: U256,
}

impl Default for FakeReader {
    fn default() -> Self {
        let mut snapshots = HashMap::new();
        snapshots.insert(DEBT_MARKET, debt_snapshot());
        snapshots.insert(WETH_MARKET, weth_snapshot());
        let mut balances = HashMap::new();
        balances.insert((USDC, exa_credit_api::config::DEFAULT_LIQUIDITY_RESERVOIR), usdc(1_000_000));
        Self {
            plugin: Some(PLUGIN),
            snapshots,
            balances: Mutex::new(balances),
            deposits: HashMap::new(),
            proposals: Vec::new(),
            next_nonce: U256::ZERO,
        }
    }
}

impl FakeReader {
    pub fn with_deposit(mut self, market: Address, amount: U256) -> Self {
        self.deposits.insert((market, ACCOUNT), amount);
        self
    }

    pub fn with_balance(self, token: Address, owner: Address, amount: U256) -> Self {
        self.balances.lock().unwrap().insert((token, owner), amount);
        self
    }

    pub fn with_plugin(mut self, plugin: Option<Address>) -> Self {
        self.plugin = plugin;
        self
    }
}

#[async_trait]
impl ChainReader for FakeReader {
    async fn read_market_snapshot(&self, market: Address, account: Option<Address>) -> Result<MarketSnapshot> {
        let mut snapshot = self
            .snapshots
            .get(&market)
            .cloned()
            .ok_or_else(|| ApiError::SnapshotUnavailable(format!("unknown market {}", market)))?;
        if account.is_none() {
            snapshot.fixed_borrow_positions.clear();
        }
        let now = snapshot.timestamp;
        apply_preview_values(&mut snapshot, now)?;
        Ok(snapshot)
    }

    async fn read_pending_proposals(&self, _account: Address) -> Result<Vec<PendingProposal>> {
        Ok(self.proposals.clone())
    }

    async fn read_installed_plugin(&self, _account: Address) -> Result<Option<Address>> {
        Ok(self.plugin)
    }

    async fn read_token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn read_account_deposit(&self, market: Address, account: Address) -> Result<U256> {
        Ok(self.deposits.get(&(market, account)).copied().unwrap_or_default())
    }

    async fn read_proposal_delay(&self) -> Result<u64> {
        Ok(60)
    }

    async fn read_proposal_nonce(&self, _account: Address) -> Result<U256> {
        Ok(self.next_nonce)
    }

    async fn read_borrow_preview(&self, _market: Address, _maturity: u64, assets: U256) -> Result<U256> {
        Ok(assets)
    }
}

/// Router that prices every swap at a fixed rate and skips denied tools.
pub struct FakeQuoter {
    /// Debt asset an indicative quote yields
    pub indicative_to_amount: U256,
    /// Input a firm quote needs per unit of output
    pub firm_input_per_output: U256,
    pub tools: Vec<&'static str>,
    pub firm_calls: AtomicUsize,
    /// Deny list sent with the latest firm quote
    pub firm_deny: Mutex<Vec<String>>,
}

impl Default for FakeQuoter {
    fn default() -> Self {
        Self {
            indicative_to_amount: usdc(2_000),
            firm_input_per_output: U256::from(1u64),
            tools: vec!["paraswap", "odos", "kyber"],
            firm_calls: AtomicUsize::new(0),
            firm_deny: Mutex::new(Vec::new()),
        }
    }
}

impl FakeQuoter {
    fn route(&self, from_amount: U256, to_amount: U256, deny: &[String]) -> Result<RepaymentRoute> {
        let tool = self
            .tools
            .iter()
            .find(|t| !deny.iter().any(|d| d.as_str() == **t))
            .ok_or_else(|| ApiError::QuoteUnavailable("every tool denied".to_string()))?;
        Ok(RepaymentRoute {
            from_amount,
            to_amount,
            call_data: Bytes::from(tool.as_bytes().to_vec()),
            tool: (*tool).to_string(),
            to: SWAPPER,
            value: U256::ZERO,
            gas_limit: Some(500_000),
            chain_id: 10,
        })
    }
}

#[async_trait]
impl RouterQuoter for FakeQuoter {
    async fn quote_indicative(&self, request: &QuoteRequest, deny: &[String]) -> Result<RepaymentRoute> {
        self.route(request.amount, self.indicative_to_amount, deny)
    }

    async fn quote_firm(&self, request: &QuoteRequest, deny: &[String]) -> Result<RepaymentRoute> {
        self.firm_calls.fetch_add(1, Ordering::SeqCst);
        *self.firm_deny.lock().unwrap() = deny.to_vec();
        self.route(request.amount * self.firm_input_per_output, request.amount, deny)
    }
}

/// Chain writer that records plans and replays scripted simulation errors.
#[derive(Default)]
pub struct FakeWriter {
    pub simulated: Mutex<Vec<SettlementPlan>>,
    pub executed: Mutex<Vec<PreparedCall>>,
    pub simulate_errors: Mutex<VecDeque<ApiError>>,
}

impl FakeWriter {
    pub fn failing_with(errors: Vec<ApiError>) -> Self {
        Self {
            simulate_errors: Mutex::new(errors.into()),
            ..Self::default()
        }
    }

    pub fn simulations(&self) -> usize {
        self.simulated.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainWriter for FakeWriter {
    async fn simulate(&self, plan: &SettlementPlan) -> Result<()> {
        self.simulated.lock().unwrap().push(plan.clone());
        match self.simulate_errors.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn execute(&self, call: &PreparedCall) -> Result<B256> {
        self.executed.lock().unwrap().push(call.clone());
        Ok(B256::repeat_byte(0x42))
    }

    async fn wait_for_confirmation(&self, _tx_hash: B256) -> Result<()> {
        Ok(())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

/// Load a fixture file as a string.
pub fn load_fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to load fixture: {}", path))
}
