//! Slippage padding and liquidity caps for repayments.
//!
//! Swap-funded and cross-asset repayments go through a flash-loan reservoir
//! and a router quote, both of which bound how much debt can be settled in a
//! single transaction. This module turns those bounds into the largest
//! position amount the user may select and explains the cap.

use std::fmt;

use alloy_primitives::U256;

use crate::error::SimError;
use crate::math::{min, mul_div_down, w_div_down, w_mul_down, WAD};
use crate::repay::{fixed_repay_position, RepaySnapshot};

/// Padding divisor for routine rounding (1 ppm).
pub const ROUTINE_PADDING_DIVISOR: u64 = 1_000_000;

/// Padding divisor for swap amounts (0.1%).
pub const SWAP_SLIPPAGE_DIVISOR: u64 = 1_000;

/// Max-repay padding for native and cross-asset repayments (1.001).
pub const REPAY_SLIPPAGE: U256 = U256::from_limbs([1_001_000_000_000_000_000, 0, 0, 0]);

/// Max-repay padding for debt rollovers (1.05).
pub const ROLL_DEBT_SLIPPAGE: U256 = U256::from_limbs([1_050_000_000_000_000_000, 0, 0, 0]);

/// Dust added to the cross-repay max amount in.
pub const CROSS_REPAY_DUST: u64 = 69;

/// `amount + max(amount / divisor, 1)`.
pub fn pad_input(amount: U256, divisor: u64) -> Result<U256, SimError> {
    if divisor == 0 {
        return Err(SimError::DivisionByZero);
    }
    let padding = (amount / U256::from(divisor)).max(U256::from(1));
    amount.checked_add(padding).ok_or(SimError::ArithmeticOverflow)
}

/// Pads `amount` by a WAD slippage factor.
pub fn apply_slippage(amount: U256, slippage: U256) -> Result<U256, SimError> {
    w_mul_down(amount, slippage)
}

/// Removes a WAD slippage factor from `amount`.
pub fn remove_slippage(amount: U256, slippage: U256) -> Result<U256, SimError> {
    w_div_down(amount, slippage)
}

/// Usable share (99%) of the flash-loan reservoir balance.
pub fn liquidity_ceiling(reservoir_balance: U256) -> Result<U256, SimError> {
    mul_div_down(reservoir_balance, U256::from(990), U256::from(1000))
}

/// Usable share (97%) of an indicative quote's output.
pub fn available_for_repayment(quoted_to_amount: U256) -> Result<U256, SimError> {
    mul_div_down(quoted_to_amount, U256::from(97), U256::from(100))
}

/// Max amount of collateral a cross repay may pull for a route.
pub fn cross_repay_max_amount_in(route_from_amount: U256) -> Result<U256, SimError> {
    mul_div_down(route_from_amount, REPAY_SLIPPAGE, WAD)?
        .checked_add(U256::from(CROSS_REPAY_DUST))
        .ok_or(SimError::ArithmeticOverflow)
}

/// Largest position amount the available funds can settle.
///
/// `min(fixed_repay_position(min(ceiling, available) / slippage), position_value)`
pub fn max_repay_input(
    repay: &RepaySnapshot,
    ceiling: U256,
    available: U256,
    position_value: U256,
    slippage: U256,
    now: u64,
) -> Result<U256, SimError> {
    if available.is_zero() {
        return Ok(U256::ZERO);
    }
    let spendable = remove_slippage(min(ceiling, available), slippage)?;
    Ok(min(fixed_repay_position(repay, spendable, now)?, position_value))
}

/// Why the repay amount is capped where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepayHint {
    /// The whole debt fits in one payment
    FullRepayment,
    /// The cap comes from the funds available to the user
    MaximumAmount,
    /// The debt exceeds what the reservoir can lend in one transaction
    SplitIntoSmallerPayments,
}

impl fmt::Display for RepayHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullRepayment => write!(f, "full debt repayment"),
            Self::MaximumAmount => write!(f, "maximum amount selected"),
            Self::SplitIntoSmallerPayments => write!(f, "split into smaller payments"),
        }
    }
}

/// Cap on a single repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepayCap {
    pub effective_max: U256,
    pub can_pay_full_debt: bool,
    pub hint: RepayHint,
}

/// A user selection after capping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub amount: U256,
    pub max_reached: bool,
}

impl RepayCap {
    pub fn new(max_repay_input: U256, total_position_repay: U256, ceiling: U256) -> Self {
        let can_pay_full_debt = !total_position_repay.is_zero() && max_repay_input >= total_position_repay;
        let hint = if can_pay_full_debt {
            RepayHint::FullRepayment
        } else if total_position_repay > ceiling {
            RepayHint::SplitIntoSmallerPayments
        } else {
            RepayHint::MaximumAmount
        };
        Self {
            effective_max: min(max_repay_input, total_position_repay),
            can_pay_full_debt,
            hint,
        }
    }

    /// Clamps a requested amount to the cap.
    pub fn clamp(&self, requested: U256) -> Selection {
        Selection {
            amount: min(requested, self.effective_max),
            max_reached: requested >= self.effective_max,
        }
    }
}
