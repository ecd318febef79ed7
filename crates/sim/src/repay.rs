//! Payoff preview for fixed-rate positions.
//!
//! Repaying before maturity earns a discount funded by the pool's
//! unassigned earnings; repaying after maturity costs a penalty that grows
//! linearly with the time past due.
//!
//! ```text
//! before maturity:
//!     backup   = borrowed - min(supplied, borrowed)
//!     discount = earnings * min(position, backup) / backup * (1 - backup_fee_rate)
//!     repay    = position - discount
//! after maturity:
//!     repay    = position + position * penalty_rate * (now - maturity)
//! ```
//!
//! [`fixed_repay_assets`] maps position assets to the assets needed to
//! settle them now; [`fixed_repay_position`] is its inverse and answers
//! "how much of the position can `assets` settle".

use alloy_primitives::U256;

use crate::error::SimError;
use crate::market::{FixedPool, MarketSnapshot};
use crate::math::{min, mul_div_down, mul_div_up, w_div_down, w_mul_down, SECONDS_PER_YEAR, WAD};

/// Inputs needed to preview a repayment at one maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaySnapshot {
    pub maturity: u64,
    pub pool: FixedPool,
    /// Late-repay penalty per second (WAD)
    pub penalty_rate: U256,
    /// Share of the discount kept by backup suppliers (WAD)
    pub backup_fee_rate: U256,
}

impl RepaySnapshot {
    /// Repay snapshot for `maturity`, or `None` when the market has no pool there.
    pub fn from_market(snapshot: &MarketSnapshot, maturity: u64) -> Option<Self> {
        snapshot.pool(maturity).map(|pool| Self {
            maturity,
            pool: *pool,
            penalty_rate: snapshot.penalty_rate_per_second,
            backup_fee_rate: snapshot.backup_fee_rate,
        })
    }

    /// Pool earnings still unassigned at `now`.
    ///
    /// Earnings accrue to suppliers linearly until maturity, so only the
    /// remaining share can fund a discount.
    fn unassigned_earnings_at(&self, now: u64) -> Result<U256, SimError> {
        let earnings = self.pool.unassigned_earnings;
        if now >= self.maturity {
            return Ok(U256::ZERO);
        }
        if self.pool.last_accrual >= now || self.pool.last_accrual >= self.maturity {
            return Ok(earnings);
        }
        let accrued = mul_div_down(
            earnings,
            U256::from(now - self.pool.last_accrual),
            U256::from(self.maturity - self.pool.last_accrual),
        )?;
        Ok(earnings - accrued)
    }

    /// Largest discount the pool can grant, net of the backup fee.
    fn max_discount(&self, now: u64) -> Result<U256, SimError> {
        let earnings = self.unassigned_earnings_at(now)?;
        w_mul_down(earnings, WAD.saturating_sub(self.backup_fee_rate))
    }

    /// Penalty multiplier `penalty_rate * (now - maturity)` (WAD).
    fn penalty_factor(&self, now: u64) -> Result<U256, SimError> {
        self.penalty_rate
            .checked_mul(U256::from(now - self.maturity))
            .ok_or(SimError::ArithmeticOverflow)
    }
}

/// Assets that settle `position_assets` of the position at `now`.
pub fn fixed_repay_assets(
    snapshot: &RepaySnapshot,
    position_assets: U256,
    now: u64,
) -> Result<U256, SimError> {
    if now >= snapshot.maturity {
        let penalty = w_mul_down(position_assets, snapshot.penalty_factor(now)?)?;
        return position_assets
            .checked_add(penalty)
            .ok_or(SimError::ArithmeticOverflow);
    }

    let backup = snapshot.pool.backup_supplied();
    if backup.is_zero() {
        return Ok(position_assets);
    }
    let discount = mul_div_down(
        snapshot.max_discount(now)?,
        min(position_assets, backup),
        backup,
    )?;
    Ok(position_assets.saturating_sub(discount))
}

/// Position assets that `repay_assets` can settle at `now`.
pub fn fixed_repay_position(
    snapshot: &RepaySnapshot,
    repay_assets: U256,
    now: u64,
) -> Result<U256, SimError> {
    if now >= snapshot.maturity {
        let factor = WAD
            .checked_add(snapshot.penalty_factor(now)?)
            .ok_or(SimError::ArithmeticOverflow)?;
        return w_div_down(repay_assets, factor);
    }

    let backup = snapshot.pool.backup_supplied();
    let max_discount = snapshot.max_discount(now)?;
    if backup.is_zero() || max_discount.is_zero() {
        return Ok(repay_assets);
    }
    // Past the backup threshold the discount no longer grows with the position.
    if max_discount >= backup || repay_assets >= backup - max_discount {
        return repay_assets
            .checked_add(max_discount)
            .ok_or(SimError::ArithmeticOverflow);
    }
    mul_div_down(repay_assets, backup, backup - max_discount)
}

/// Discount or penalty of settling a position now, relative to its face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepayAdjustment {
    /// Paying now saves this share of the position (WAD)
    Discount(U256),
    /// Paying now costs this extra share of the position (WAD)
    Penalty(U256),
    None,
}

impl RepayAdjustment {
    /// Adjustment as a signed fraction for display, positive for discounts.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Discount(ratio) => crate::math::wad_to_f64(*ratio),
            Self::Penalty(ratio) => -crate::math::wad_to_f64(*ratio),
            Self::None => 0.0,
        }
    }
}

/// Compares the payoff `repay_assets` with the face value `position_assets`.
pub fn discount_or_penalty(repay_assets: U256, position_assets: U256) -> Result<RepayAdjustment, SimError> {
    if position_assets.is_zero() {
        return Ok(RepayAdjustment::None);
    }
    let ratio = w_div_down(repay_assets, position_assets)?;
    Ok(match ratio.cmp(&WAD) {
        std::cmp::Ordering::Less => RepayAdjustment::Discount(WAD - ratio),
        std::cmp::Ordering::Greater => RepayAdjustment::Penalty(ratio - WAD),
        std::cmp::Ordering::Equal => RepayAdjustment::None,
    })
}

/// Annual rate (WAD) of rolling a position worth `preview_value` now into a
/// borrow that costs `new_assets` at `maturity`. Zero when the roll is not
/// more expensive than repaying now.
pub fn rollover_rate(new_assets: U256, preview_value: U256, maturity: u64, now: u64) -> Result<U256, SimError> {
    if new_assets <= preview_value || maturity <= now {
        return Ok(U256::ZERO);
    }
    let time_weight = preview_value
        .checked_mul(U256::from(maturity - now))
        .ok_or(SimError::ArithmeticOverflow)?;
    mul_div_up(new_assets - preview_value, WAD * U256::from(SECONDS_PER_YEAR), time_weight)
}
