//! Installment schedules for fixed-rate borrows.
//!
//! [`InstallmentCalculator`] turns a principal and an installment count into
//! the payment due at each maturity and the effective annual rate. It is a
//! pure function of the snapshot, the principal, the count, the clock and the
//! rate model: the same inputs always produce the same plan.
//!
//! # Example
//!
//! ```rust
//! use exa_credit_sim::installments::InstallmentCalculator;
//! use exa_credit_sim::irm::HyperbolicCurve;
//! use exa_credit_sim::market::MarketSnapshot;
//! use alloy_primitives::{Address, U256};
//!
//! let snapshot = MarketSnapshot::new(Address::ZERO, Address::ZERO, 6);
//! let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
//!
//! // A zero principal never reaches the rate model.
//! let plan = calculator.plan_all(U256::ZERO, 1_700_000_000).unwrap();
//! assert_eq!(plan.installments.len(), 12);
//! assert!(plan.installments.iter().all(|o| o.total.is_zero()));
//! ```

use alloy_primitives::U256;

use crate::error::SimError;
use crate::irm::{implied_rate, utilization_impact, FixedRateInput, RateModel, SplitInput};
use crate::market::{first_borrow_maturity, MarketSnapshot, MAX_INSTALLMENTS};
use crate::math::simple_interest;

/// One row of an installment plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentOption {
    /// Number of installments
    pub count: usize,
    /// Payment due at each maturity, `None` when the count is unavailable
    pub payments: Option<Vec<U256>>,
    /// Effective annual rate (WAD)
    pub rate: U256,
    /// Sum of all payments
    pub total: U256,
}

impl InstallmentOption {
    fn zero(count: usize) -> Self {
        Self {
            count,
            payments: Some(vec![U256::ZERO; count]),
            rate: U256::ZERO,
            total: U256::ZERO,
        }
    }

    fn unavailable(count: usize) -> Self {
        Self {
            count,
            payments: None,
            rate: U256::ZERO,
            total: U256::ZERO,
        }
    }

    /// Whether the market can serve this installment count.
    pub fn is_available(&self) -> bool {
        self.payments.is_some()
    }

    /// Payment due at each maturity when the schedule is flat, i.e. the first one.
    pub fn installment_amount(&self) -> Option<U256> {
        self.payments.as_ref().and_then(|p| p.first().copied())
    }
}

/// Installment options for a principal, anchored at the first borrowable maturity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentPlan {
    pub first_maturity: u64,
    pub installments: Vec<InstallmentOption>,
}

impl InstallmentPlan {
    /// Option for `count` installments.
    pub fn option(&self, count: usize) -> Option<&InstallmentOption> {
        self.installments.iter().find(|o| o.count == count)
    }
}

/// Computes installment plans against one market snapshot.
#[derive(Debug, Clone, Copy)]
pub struct InstallmentCalculator<'a, M> {
    snapshot: &'a MarketSnapshot,
    model: &'a M,
}

impl<'a, M: RateModel> InstallmentCalculator<'a, M> {
    pub fn new(snapshot: &'a MarketSnapshot, model: &'a M) -> Self {
        Self { snapshot, model }
    }

    /// Evaluates every count in `1..=MAX_INSTALLMENTS`.
    pub fn plan_all(&self, principal: U256, now: u64) -> Result<InstallmentPlan, SimError> {
        let first_maturity = first_borrow_maturity(now);
        let installments = (1..=MAX_INSTALLMENTS)
            .map(|count| self.option(principal, count, first_maturity, now))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InstallmentPlan {
            first_maturity,
            installments,
        })
    }

    /// Evaluates a single installment count.
    pub fn plan(&self, principal: U256, count: usize, now: u64) -> Result<InstallmentPlan, SimError> {
        if count == 0 || count > MAX_INSTALLMENTS {
            return Err(SimError::InvalidInstallmentCount {
                count,
                max: MAX_INSTALLMENTS,
            });
        }
        let first_maturity = first_borrow_maturity(now);
        let option = self.option(principal, count, first_maturity, now)?;
        Ok(InstallmentPlan {
            first_maturity,
            installments: vec![option],
        })
    }

    fn option(
        &self,
        principal: U256,
        count: usize,
        first_maturity: u64,
        now: u64,
    ) -> Result<InstallmentOption, SimError> {
        if principal.is_zero() {
            return Ok(InstallmentOption::zero(count));
        }
        let Some(pool_utilizations) = self.snapshot.pool_utilizations(first_maturity, count) else {
            return Ok(InstallmentOption::unavailable(count));
        };
        let pool_utilizations = pool_utilizations?;

        let snapshot = self.snapshot;
        let deposits = snapshot.total_floating_deposit_assets;
        let u_global = snapshot.global_utilization()?;

        if count == 1 {
            let impact = utilization_impact(principal, deposits)?;
            let u_pool = pool_utilizations.first().copied().unwrap_or_default();
            let rate = self.model.fixed_rate(&FixedRateInput {
                maturity: first_maturity,
                max_pools: snapshot.max_pools(),
                u_fixed: u_pool.checked_add(impact).ok_or(SimError::ArithmeticOverflow)?,
                u_floating: snapshot.floating_utilization,
                u_global: u_global.checked_add(impact).ok_or(SimError::ArithmeticOverflow)?,
                parameters: &snapshot.rate_model_parameters,
                now,
            })?;
            let elapsed = first_maturity - now;
            let fee = simple_interest(principal, rate, elapsed)?;
            let payment = principal.checked_add(fee).ok_or(SimError::ArithmeticOverflow)?;
            return Ok(InstallmentOption {
                count,
                payments: Some(vec![payment]),
                rate: implied_rate(principal, payment - principal, elapsed)?,
                total: payment,
            });
        }

        let split = self.model.split_installments(&SplitInput {
            principal,
            deposits,
            first_maturity,
            max_pools: snapshot.max_pools(),
            pool_utilizations: &pool_utilizations,
            u_floating: snapshot.floating_utilization,
            u_global,
            parameters: &snapshot.rate_model_parameters,
            now,
        })?;
        let total = split
            .payments
            .iter()
            .try_fold(U256::ZERO, |acc, p| acc.checked_add(*p))
            .ok_or(SimError::ArithmeticOverflow)?;
        Ok(InstallmentOption {
            count,
            payments: Some(split.payments),
            rate: split.effective_rate,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use alloy_primitives::Address;

    use super::*;
    use crate::irm::{HyperbolicCurve, InstallmentSplit};
    use crate::market::{FixedPool, MATURITY_INTERVAL};
    use crate::math::WAD;

    const FIRST_MATURITY: u64 = 1000 * MATURITY_INTERVAL;
    const NOW: u64 = FIRST_MATURITY - 1_576_800;

    /// Rate model returning a fixed rate and recording the utilizations it saw.
    struct FlatRate {
        rate: U256,
        seen_u_fixed: Cell<U256>,
    }

    impl FlatRate {
        fn new(rate: U256) -> Self {
            Self {
                rate,
                seen_u_fixed: Cell::new(U256::ZERO),
            }
        }
    }

    impl RateModel for FlatRate {
        fn fixed_rate(&self, input: &FixedRateInput<'_>) -> Result<U256, SimError> {
            self.seen_u_fixed.set(input.u_fixed);
            Ok(self.rate)
        }

        fn split_installments(&self, input: &SplitInput<'_>) -> Result<InstallmentSplit, SimError> {
            HyperbolicCurve.split_installments(input)
        }
    }

    struct Unreachable;

    impl RateModel for Unreachable {
        fn fixed_rate(&self, _: &FixedRateInput<'_>) -> Result<U256, SimError> {
            unreachable!("rate model must not be called for a zero principal")
        }

        fn split_installments(&self, _: &SplitInput<'_>) -> Result<InstallmentSplit, SimError> {
            unreachable!("rate model must not be called for a zero principal")
        }
    }

    fn snapshot(deposits: u64, pools: usize) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::new(Address::ZERO, Address::ZERO, 6);
        snapshot.total_floating_deposit_assets = U256::from(deposits);
        snapshot.total_floating_borrow_assets = U256::from(deposits / 2);
        snapshot.floating_utilization = WAD / U256::from(2);
        snapshot.max_future_pools = 12;
        snapshot.fixed_pools = (0..pools as u64)
            .map(|i| FixedPool {
                maturity: FIRST_MATURITY + i * MATURITY_INTERVAL,
                ..FixedPool::default()
            })
            .collect();
        snapshot
    }

    #[test]
    fn test_single_installment_scenario() {
        let snapshot = snapshot(1_000_000_000_000, 1);
        let model = FlatRate::new(WAD / U256::from(10));
        let calculator = InstallmentCalculator::new(&snapshot, &model);

        let plan = calculator.plan(U256::from(100_000_000u64), 1, NOW).unwrap();
        assert_eq!(plan.first_maturity, FIRST_MATURITY);

        let option = &plan.installments[0];
        assert_eq!(option.payments, Some(vec![U256::from(100_500_000u64)]));
        assert_eq!(option.total, U256::from(100_500_000u64));
        assert_eq!(option.rate, WAD / U256::from(10));

        // 100 USDC against 1M USDC of deposits is a 0.01% impact
        assert_eq!(model.seen_u_fixed.get(), WAD / U256::from(10_000));
    }

    #[test]
    fn test_zero_principal_never_calls_model() {
        let snapshot = snapshot(1_000_000_000_000, 12);
        let calculator = InstallmentCalculator::new(&snapshot, &Unreachable);

        let plan = calculator.plan_all(U256::ZERO, NOW).unwrap();
        assert_eq!(plan.installments.len(), MAX_INSTALLMENTS);
        for (i, option) in plan.installments.iter().enumerate() {
            assert_eq!(option.count, i + 1);
            assert_eq!(option.payments, Some(vec![U256::ZERO; i + 1]));
            assert_eq!(option.rate, U256::ZERO);
            assert_eq!(option.total, U256::ZERO);
        }
    }

    #[test]
    fn test_zero_deposits_has_no_impact() {
        let snapshot = snapshot(0, 1);
        let model = FlatRate::new(WAD / U256::from(10));
        let calculator = InstallmentCalculator::new(&snapshot, &model);

        let plan = calculator.plan(U256::from(100_000_000u64), 1, NOW).unwrap();
        assert!(plan.installments[0].is_available());
        assert_eq!(model.seen_u_fixed.get(), U256::ZERO);
    }

    #[test]
    fn test_missing_pool_marks_count_unavailable() {
        let snapshot = snapshot(1_000_000_000_000, 3);
        let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);

        let plan = calculator.plan_all(U256::from(500_000_000u64), NOW).unwrap();
        for option in &plan.installments {
            assert_eq!(option.is_available(), option.count <= 3, "count {}", option.count);
        }
        assert!(plan.option(4).unwrap().payments.is_none());
    }

    #[test]
    fn test_full_coverage_properties() {
        let snapshot = snapshot(1_000_000_000_000, 12);
        let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
        let principal = U256::from(2_500_000_000u64);

        let plan = calculator.plan_all(principal, NOW).unwrap();
        for option in &plan.installments {
            let payments = option.payments.as_ref().unwrap();
            assert_eq!(payments.len(), option.count);
            assert!(option.total >= principal);
            let sum = payments.iter().fold(U256::ZERO, |acc, p| acc + *p);
            assert_eq!(sum, option.total);
        }
    }

    #[test]
    fn test_plan_is_idempotent() {
        let snapshot = snapshot(1_000_000_000_000, 12);
        let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
        let a = calculator.plan_all(U256::from(777_000_000u64), NOW).unwrap();
        let b = calculator.plan_all(U256::from(777_000_000u64), NOW).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_rejects_out_of_range_count() {
        let snapshot = snapshot(1_000_000_000_000, 12);
        let calculator = InstallmentCalculator::new(&snapshot, &HyperbolicCurve);
        for count in [0, MAX_INSTALLMENTS + 1] {
            assert!(matches!(
                calculator.plan(U256::from(1u64), count, NOW),
                Err(SimError::InvalidInstallmentCount { .. })
            ));
        }
    }
}
