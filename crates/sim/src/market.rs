//! Read-only view of a maturity-based lending market.
//!
//! A [`MarketSnapshot`] is the calculator's only input besides the principal
//! and the clock. It is built once per read by the chain reader and never
//! mutated afterwards; every derived quantity is recomputed from it.
//!
//! Fixed-rate pools mature on a fixed grid: every maturity is a multiple of
//! [`MATURITY_INTERVAL`] (four weeks) counted from the Unix epoch.

use alloy_primitives::{Address, U256};

use crate::error::SimError;
use crate::irm::{fixed_utilization, global_utilization, RateModelParameters};

/// Spacing between consecutive fixed-pool maturities (4 weeks).
pub const MATURITY_INTERVAL: u64 = 2_419_200;

/// Minimum time between a borrow and its first maturity (1 hour).
pub const MIN_BORROW_INTERVAL: u64 = 3_600;

/// Largest installment count offered to borrowers.
pub const MAX_INSTALLMENTS: usize = 12;

/// A fixed-rate pool for one maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedPool {
    /// Maturity timestamp
    pub maturity: u64,
    /// Assets supplied at a fixed rate to this pool
    pub supplied: U256,
    /// Assets borrowed at a fixed rate from this pool
    pub borrowed: U256,
    /// Earnings not yet distributed to suppliers; funds early-repay discounts
    pub unassigned_earnings: U256,
    /// Last time `unassigned_earnings` were accrued
    pub last_accrual: u64,
}

impl FixedPool {
    /// Borrowed assets not covered by fixed supply, backed by floating deposits.
    pub fn backup_supplied(&self) -> U256 {
        self.borrowed.saturating_sub(self.supplied)
    }
}

/// An account's fixed-rate debt at one maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedPosition {
    pub maturity: u64,
    pub principal: U256,
    pub fee: U256,
    /// Amount that settles the whole position right now, including the
    /// early-repay discount or the late-repay penalty
    pub preview_value: U256,
}

impl FixedPosition {
    /// Face value of the position: principal plus fee.
    pub fn position_assets(&self) -> U256 {
        self.principal.saturating_add(self.fee)
    }
}

/// Snapshot of a market at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    /// Market contract address
    pub market: Address,
    /// Underlying asset address
    pub asset: Address,
    /// Total floating deposit assets
    pub total_floating_deposit_assets: U256,
    /// Total floating borrow assets
    pub total_floating_borrow_assets: U256,
    /// Floating assets lent to fixed pools
    pub floating_backup_borrowed: U256,
    /// Floating utilization (WAD)
    pub floating_utilization: U256,
    /// Asset decimals
    pub decimals: u8,
    /// USD price of one whole asset unit (WAD)
    pub usd_price: U256,
    /// Late-repay penalty per second (WAD)
    pub penalty_rate_per_second: U256,
    /// Share of early-repay discounts kept by backup suppliers (WAD)
    pub backup_fee_rate: U256,
    /// Number of fixed pools open for borrowing
    pub max_future_pools: usize,
    pub rate_model_parameters: RateModelParameters,
    /// Open fixed pools, ascending by maturity
    pub fixed_pools: Vec<FixedPool>,
    /// Account's fixed debt, empty when read without an account
    pub fixed_borrow_positions: Vec<FixedPosition>,
    /// Block timestamp of the read
    pub timestamp: u64,
}

impl MarketSnapshot {
    /// Creates an empty snapshot for `market`, useful as a builder base.
    pub fn new(market: Address, asset: Address, decimals: u8) -> Self {
        Self {
            market,
            asset,
            total_floating_deposit_assets: U256::ZERO,
            total_floating_borrow_assets: U256::ZERO,
            floating_backup_borrowed: U256::ZERO,
            floating_utilization: U256::ZERO,
            decimals,
            usd_price: U256::ZERO,
            penalty_rate_per_second: U256::ZERO,
            backup_fee_rate: U256::ZERO,
            max_future_pools: 0,
            rate_model_parameters: RateModelParameters::default(),
            fixed_pools: Vec::new(),
            fixed_borrow_positions: Vec::new(),
            timestamp: 0,
        }
    }

    /// Pool maturing at `maturity`, if open.
    pub fn pool(&self, maturity: u64) -> Option<&FixedPool> {
        self.fixed_pools.iter().find(|p| p.maturity == maturity)
    }

    /// Account position at `maturity`, if any.
    pub fn position(&self, maturity: u64) -> Option<&FixedPosition> {
        self.fixed_borrow_positions.iter().find(|p| p.maturity == maturity)
    }

    /// Pool count handed to the rate model.
    pub fn max_pools(&self) -> usize {
        if self.max_future_pools == 0 {
            self.fixed_pools.len()
        } else {
            self.max_future_pools
        }
    }

    /// Global utilization of the market before any new borrow.
    pub fn global_utilization(&self) -> Result<U256, SimError> {
        global_utilization(
            self.total_floating_deposit_assets,
            self.total_floating_borrow_assets,
            self.floating_backup_borrowed,
        )
    }

    /// Fixed utilization of the pool at `maturity`, or `None` if it is not open.
    pub fn pool_utilization(&self, maturity: u64) -> Option<Result<U256, SimError>> {
        self.pool(maturity)
            .map(|p| fixed_utilization(p.supplied, p.borrowed, self.total_floating_deposit_assets))
    }

    /// Fixed utilizations for `count` consecutive maturities starting at
    /// `first_maturity`. `None` when any of those pools is missing.
    pub fn pool_utilizations(&self, first_maturity: u64, count: usize) -> Option<Result<Vec<U256>, SimError>> {
        (0..count as u64)
            .map(|i| self.pool_utilization(first_maturity + i * MATURITY_INTERVAL))
            .collect::<Option<Result<Vec<_>, _>>>()
    }

    /// Sum of the account's outstanding fixed debt at face value.
    pub fn total_position_assets(&self) -> U256 {
        self.fixed_borrow_positions
            .iter()
            .fold(U256::ZERO, |acc, p| acc.saturating_add(p.position_assets()))
    }

    /// Earliest account position, the one a repay flow settles first.
    pub fn earliest_position(&self) -> Option<&FixedPosition> {
        self.fixed_borrow_positions.iter().min_by_key(|p| p.maturity)
    }
}

/// The maturity immediately after `now`.
pub fn next_maturity(now: u64) -> u64 {
    now - now % MATURITY_INTERVAL + MATURITY_INTERVAL
}

/// First maturity a borrow at `now` can target: the next maturity, or the
/// one after it when the next is less than [`MIN_BORROW_INTERVAL`] away.
pub fn first_borrow_maturity(now: u64) -> u64 {
    let next = next_maturity(now);
    if next - now < MIN_BORROW_INTERVAL {
        next + MATURITY_INTERVAL
    } else {
        next
    }
}

/// Whether `timestamp` lies on the maturity grid.
pub fn is_aligned(timestamp: u64) -> bool {
    timestamp % MATURITY_INTERVAL == 0
}

/// Returns `maturity` if it lies on the maturity grid.
pub fn ensure_aligned(maturity: u64) -> Result<u64, SimError> {
    if is_aligned(maturity) {
        Ok(maturity)
    } else {
        Err(SimError::UnalignedMaturity { maturity })
    }
}
