//! Settlement call builders.
//!
//! Each builder returns the [`PreparedCall`] the account owner signs. Amounts
//! arrive precomputed (slippage, padding and caps are applied upstream); the
//! builders only choose targets and encode.

use alloy::primitives::{Address, Bytes, U256};

use crate::account::IExaAccount;
use crate::erc20;
use crate::market;
use crate::prepared_call::PreparedCall;
use crate::proposal::{self, ProposalPayload};

/// Full repayment percentage passed to roll-debt proposals.
pub const FULL_PERCENTAGE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// A firm swap route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRoute {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl SwapRoute {
    fn as_call(&self) -> PreparedCall {
        PreparedCall::new(self.to, self.data.clone(), self.value)
    }
}

/// Repay in the debt asset through a delayed proposal.
pub fn repay_proposal(
    account: Address,
    debt_market: Address,
    maturity: u64,
    position_assets: U256,
    max_repay: U256,
) -> PreparedCall {
    proposal::propose(
        account,
        debt_market,
        max_repay,
        &ProposalPayload::RepayAtMaturity {
            maturity,
            position_assets,
        },
    )
}

/// Repay by swapping collateral through a delayed proposal.
///
/// `max_amount_in` is the collateral drawn from `collateral_market`;
/// `route` is the swap calldata that produces `max_repay` of the debt asset.
pub fn cross_repay_proposal(
    account: Address,
    collateral_market: Address,
    max_amount_in: U256,
    maturity: u64,
    position_assets: U256,
    max_repay: U256,
    route: Bytes,
) -> PreparedCall {
    proposal::propose(
        account,
        collateral_market,
        max_amount_in,
        &ProposalPayload::CrossRepayAtMaturity {
            maturity,
            position_assets,
            max_repay,
            route,
        },
    )
}

/// Legacy plugin repayment in the debt asset, called on the account.
pub fn legacy_repay(account: Address, maturity: u64) -> PreparedCall {
    PreparedCall::from_call(
        account,
        &IExaAccount::repayCall {
            maturity: U256::from(maturity),
        },
    )
}

/// Legacy plugin repayment funded by `collateral`, called on the account.
pub fn legacy_cross_repay(account: Address, maturity: u64, collateral: Address) -> PreparedCall {
    PreparedCall::from_call(
        account,
        &IExaAccount::crossRepayCall {
            maturity: U256::from(maturity),
            collateral,
        },
    )
}

/// Inputs for an externally funded repayment.
#[derive(Debug, Clone)]
pub struct ExternalRepay<'a> {
    pub account: Address,
    pub from_asset: Address,
    /// Swap input the router may pull
    pub swap_allowance: U256,
    pub debt_asset: Address,
    pub debt_market: Address,
    pub maturity: u64,
    pub position_assets: U256,
    pub max_repay: U256,
    /// Debt asset the market may pull, at least `max_repay`
    pub repay_allowance: U256,
    pub route: &'a SwapRoute,
}

/// The four calls of an externally funded repayment, in execution order.
pub fn external_repay_calls(params: &ExternalRepay<'_>) -> Vec<PreparedCall> {
    vec![
        erc20::approve(params.from_asset, params.route.to, params.swap_allowance),
        params.route.as_call(),
        erc20::approve(params.debt_asset, params.debt_market, params.repay_allowance),
        market::repay_at_maturity(
            params.debt_market,
            params.maturity,
            params.position_assets,
            params.max_repay,
            params.account,
        ),
    ]
}

/// Wraps calls in a single `account.executeBatch`.
pub fn execute_batch(account: Address, calls: &[PreparedCall]) -> PreparedCall {
    let calls = calls
        .iter()
        .map(|c| IExaAccount::Call {
            target: c.to,
            value: c.value,
            data: c.data.clone(),
        })
        .collect();
    PreparedCall::from_call(account, &IExaAccount::executeBatchCall { calls })
}

/// Externally funded repayment as one batch transaction.
pub fn external_repay(params: &ExternalRepay<'_>) -> PreparedCall {
    execute_batch(params.account, &external_repay_calls(params))
}

/// Repays `repay_maturity` in full and reborrows at `borrow_maturity`.
pub fn roll_debt_proposal(
    account: Address,
    debt_market: Address,
    repay_maturity: u64,
    borrow_maturity: u64,
    max_repay_assets: U256,
) -> PreparedCall {
    proposal::propose(
        account,
        debt_market,
        max_repay_assets,
        &ProposalPayload::RollDebt {
            repay_maturity,
            borrow_maturity,
            max_repay_assets,
            percentage: FULL_PERCENTAGE,
        },
    )
}
