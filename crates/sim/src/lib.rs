//! Fixed-Rate Credit Math
//!
//! This crate holds the pure computations behind fixed-rate, maturity-based
//! borrowing: installment schedules, payoff previews and repayment caps.
//! Nothing here performs I/O; every function is a deterministic function of
//! its inputs.
//!
//! # Overview
//!
//! - [`math`]: WAD fixed-point kernel with overflow and division guards
//! - [`irm`]: the [`RateModel`] contract and the [`HyperbolicCurve`] reference curve
//! - [`market`]: [`MarketSnapshot`] and maturity grid helpers
//! - [`installments`]: [`InstallmentCalculator`] for 1 to 12 installment plans
//! - [`repay`]: early-repay discount and late-repay penalty previews
//! - [`capping`]: slippage padding and liquidity caps for repayments
//!
//! # Example
//!
//! ```rust
//! use exa_credit_sim::{InstallmentCalculator, HyperbolicCurve, MarketSnapshot};
//! use exa_credit_sim::market::{FixedPool, MATURITY_INTERVAL};
//! use alloy_primitives::{Address, U256};
//!
//! let now = 1000 * MATURITY_INTERVAL - 1_576_800;
//! let mut snapshot = MarketSnapshot::new(Address::ZERO, Address::ZERO, 6);
//! snapshot.total_floating_deposit_assets = U256::from(1_000_000_000_000u64);
//! snapshot.fixed_pools = (0..12)
//!     .map(|i| FixedPool { maturity: (1000 + i) * MATURITY_INTERVAL, ..FixedPool::default() })
//!     .collect();
//!
//! let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
//! let plan = calculator.plan(U256::from(100_000_000u64), 3, now).unwrap();
//! let option = &plan.installments[0];
//! assert_eq!(option.payments.as_ref().unwrap().len(), 3);
//! assert!(option.total >= U256::from(100_000_000u64));
//! ```

pub mod capping;
pub mod error;
pub mod installments;
pub mod irm;
pub mod market;
pub mod math;
pub mod repay;

// Re-export commonly used types
pub use error::SimError;

// Math exports
pub use math::{RoundingDirection, SECONDS_PER_YEAR, WAD};

// Market exports
pub use market::{
    first_borrow_maturity, next_maturity, FixedPool, FixedPosition, MarketSnapshot,
    MATURITY_INTERVAL, MAX_INSTALLMENTS, MIN_BORROW_INTERVAL,
};

// IRM exports
pub use irm::{
    FixedRateInput, HyperbolicCurve, InstallmentSplit, RateModel, RateModelParameters, SplitInput,
};

// Installment exports
pub use installments::{InstallmentCalculator, InstallmentOption, InstallmentPlan};

// Repay exports
pub use repay::{
    discount_or_penalty, fixed_repay_assets, fixed_repay_position, rollover_rate, RepayAdjustment,
    RepaySnapshot,
};

// Capping exports
pub use capping::{
    RepayCap, RepayHint, Selection, REPAY_SLIPPAGE, ROLL_DEBT_SLIPPAGE, ROUTINE_PADDING_DIVISOR,
    SWAP_SLIPPAGE_DIVISOR,
};
