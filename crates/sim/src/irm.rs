//! Interest rate model contract and the reference fixed-rate curve.
//!
//! The installment calculator never prices a loan itself. It hands pool
//! utilizations to a [`RateModel`], which owns two operations:
//!
//! - [`RateModel::fixed_rate`]: the annual rate (WAD) for borrowing at a
//!   single maturity given the fixed, floating and global utilizations
//!   after the borrow.
//! - [`RateModel::split_installments`]: how a principal is divided across
//!   consecutive maturities so that every installment payment is (nearly)
//!   equal, plus the blended rate of the whole schedule.
//!
//! # Reference curve
//!
//! [`HyperbolicCurve`] is the deterministic model shipped with the crate.
//! The floating base rate follows a hyperbola in utilization:
//!
//! ```text
//! a    = (natural_rate - min_rate) * (max_u - natural_u) / natural_u
//! base = min_rate + a * u / (max_u - u)         (u < max_u)
//! base = max_rate                               (u >= max_u)
//! ```
//!
//! where `u = max(u_floating, u_global)`. The fixed rate adds a time
//! preference and a spread that grows with the pool's fixed utilization and
//! with the distance to maturity relative to the furthest open pool:
//!
//! ```text
//! horizon  = max_pools * MATURITY_INTERVAL - now % MATURITY_INTERVAL
//! factor   = min(maturity - now, horizon) / horizon
//! rate     = base * (1 + time_preference + spread_factor * min(u_fixed, 1) * factor)
//! ```
//!
//! capped at `max_rate`.
//!
//! # Example
//!
//! ```rust
//! use exa_credit_sim::irm::{global_utilization, fixed_utilization};
//! use exa_credit_sim::WAD;
//! use alloy_primitives::U256;
//!
//! let assets = U256::from(1_000_000u64);
//! // 200k borrowed from a fixed pool with nothing supplied to it
//! let u_fixed = fixed_utilization(U256::ZERO, U256::from(200_000u64), assets).unwrap();
//! assert_eq!(u_fixed, WAD / U256::from(5));
//!
//! let u_global = global_utilization(assets, U256::from(300_000u64), U256::from(200_000u64)).unwrap();
//! assert_eq!(u_global, WAD / U256::from(2));
//! ```

use alloy_primitives::U256;

use crate::error::SimError;
use crate::market::MATURITY_INTERVAL;
use crate::math::{
    max, min, mul_div_down, simple_interest, w_div_down, w_div_up, w_mul_down, w_mul_up,
    SECONDS_PER_YEAR, WAD,
};

/// Maximum rescaling passes when equalizing installment payments.
pub const MAX_SPLIT_ITERATIONS: usize = 64;

/// Parameters of the interest rate model, all WAD-scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateModelParameters {
    /// Floating rate at zero utilization
    pub min_rate: U256,
    /// Floating rate at the natural utilization
    pub natural_rate: U256,
    /// Utilization at which the curve reaches its asymptote
    pub max_utilization: U256,
    /// Utilization at which the floating rate equals `natural_rate`
    pub natural_utilization: U256,
    /// Spread applied per unit of fixed-pool utilization
    pub spread_factor: U256,
    /// Flat premium of fixed borrows over the floating rate
    pub time_preference: U256,
    /// Hard cap on any rate produced by the model
    pub max_rate: U256,
}

impl Default for RateModelParameters {
    fn default() -> Self {
        let percent = WAD / U256::from(100);
        Self {
            min_rate: U256::from(3) * percent,
            natural_rate: U256::from(8) * percent,
            max_utilization: U256::from(110) * percent,
            natural_utilization: U256::from(75) * percent,
            spread_factor: U256::from(20) * percent,
            time_preference: U256::from(1) * percent,
            max_rate: U256::from(1500) * percent,
        }
    }
}

impl RateModelParameters {
    /// Checks that the floating curve is well defined.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.natural_utilization.is_zero() {
            return Err(SimError::InvalidRateParameters("natural utilization is zero"));
        }
        if self.natural_utilization >= self.max_utilization {
            return Err(SimError::InvalidRateParameters(
                "natural utilization must be below max utilization",
            ));
        }
        Ok(())
    }
}

/// Inputs of a single-maturity rate query.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateInput<'a> {
    pub maturity: u64,
    pub max_pools: usize,
    pub u_fixed: U256,
    pub u_floating: U256,
    pub u_global: U256,
    pub parameters: &'a RateModelParameters,
    pub now: u64,
}

/// Inputs of an installment split.
///
/// `pool_utilizations[i]` is the fixed utilization of the pool maturing at
/// `first_maturity + i * MATURITY_INTERVAL`; its length is the installment count.
#[derive(Debug, Clone, Copy)]
pub struct SplitInput<'a> {
    pub principal: U256,
    pub deposits: U256,
    pub first_maturity: u64,
    pub max_pools: usize,
    pub pool_utilizations: &'a [U256],
    pub u_floating: U256,
    pub u_global: U256,
    pub parameters: &'a RateModelParameters,
    pub now: u64,
}

/// Result of an installment split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentSplit {
    /// Principal borrowed at each maturity; sums to the requested principal
    pub amounts: Vec<U256>,
    /// Principal plus fee due at each maturity
    pub payments: Vec<U256>,
    /// Blended annual rate of the schedule (WAD)
    pub effective_rate: U256,
}

/// Pricing of fixed-maturity borrows.
pub trait RateModel {
    /// Annual fixed borrow rate (WAD) at `input.maturity`.
    fn fixed_rate(&self, input: &FixedRateInput<'_>) -> Result<U256, SimError>;

    /// Splits `input.principal` across consecutive maturities.
    fn split_installments(&self, input: &SplitInput<'_>) -> Result<InstallmentSplit, SimError>;
}

/// Floating utilization: `debt / assets`, rounded up. Zero when there are no assets.
pub fn floating_utilization(assets: U256, debt: U256) -> Result<U256, SimError> {
    if assets.is_zero() {
        return Ok(U256::ZERO);
    }
    w_div_up(debt, assets)
}

/// Fixed-pool utilization: the part of the pool borrowed beyond what was
/// supplied to it, relative to the floating deposits backing it.
pub fn fixed_utilization(supplied: U256, borrowed: U256, assets: U256) -> Result<U256, SimError> {
    if assets.is_zero() || borrowed <= supplied {
        return Ok(U256::ZERO);
    }
    w_div_up(borrowed - supplied, assets)
}

/// Global utilization: the share of deposits that is not free liquidity.
pub fn global_utilization(assets: U256, debt: U256, backup_borrowed: U256) -> Result<U256, SimError> {
    if assets.is_zero() {
        return Ok(U256::ZERO);
    }
    let free = assets.saturating_sub(debt).saturating_sub(backup_borrowed);
    Ok(WAD.saturating_sub(w_div_down(free, assets)?))
}

/// Utilization increase caused by borrowing `amount` against `deposits`,
/// rounded up. Zero when there are no deposits.
pub fn utilization_impact(amount: U256, deposits: U256) -> Result<U256, SimError> {
    if deposits.is_zero() {
        return Ok(U256::ZERO);
    }
    w_div_up(amount, deposits)
}

/// Floating rate of the hyperbolic curve at utilization `u`.
///
/// Fails with [`SimError::InvalidRateParameters`] unless
/// `0 < natural_utilization < max_utilization`.
pub fn floating_rate(parameters: &RateModelParameters, u: U256) -> Result<U256, SimError> {
    parameters.validate()?;
    let RateModelParameters {
        min_rate,
        natural_rate,
        max_utilization,
        natural_utilization,
        max_rate,
        ..
    } = *parameters;

    if u >= max_utilization {
        return Ok(max_rate);
    }
    let slope = mul_div_down(
        natural_rate.saturating_sub(min_rate),
        max_utilization - natural_utilization,
        natural_utilization,
    )?;
    let excess = mul_div_down(slope, u, max_utilization - u)?;
    let rate = min_rate.checked_add(excess).ok_or(SimError::ArithmeticOverflow)?;
    Ok(min(rate, max_rate))
}

/// The reference [`RateModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperbolicCurve;

impl HyperbolicCurve {
    /// Prices `amounts[i]` at `first_maturity + i * MATURITY_INTERVAL`.
    ///
    /// Each borrow raises both its own pool's utilization and the running
    /// global utilization seen by every later installment.
    fn price_schedule(&self, input: &SplitInput<'_>, amounts: &[U256]) -> Result<PricedSchedule, SimError> {
        let mut u_global = input.u_global;
        let mut payments = Vec::with_capacity(amounts.len());
        let mut fees = U256::ZERO;
        let mut weighted = U256::ZERO;

        for (i, (&amount, &u_pool)) in amounts.iter().zip(input.pool_utilizations).enumerate() {
            let maturity = input.first_maturity + i as u64 * MATURITY_INTERVAL;
            let elapsed = maturity.saturating_sub(input.now);
            let impact = utilization_impact(amount, input.deposits)?;
            u_global = u_global.checked_add(impact).ok_or(SimError::ArithmeticOverflow)?;

            let rate = self.fixed_rate(&FixedRateInput {
                maturity,
                max_pools: input.max_pools,
                u_fixed: u_pool.checked_add(impact).ok_or(SimError::ArithmeticOverflow)?,
                u_floating: input.u_floating,
                u_global,
                parameters: input.parameters,
                now: input.now,
            })?;
            let fee = simple_interest(amount, rate, elapsed)?;

            fees = fees.checked_add(fee).ok_or(SimError::ArithmeticOverflow)?;
            let time_weight = amount
                .checked_mul(U256::from(elapsed))
                .ok_or(SimError::ArithmeticOverflow)?;
            weighted = weighted.checked_add(time_weight).ok_or(SimError::ArithmeticOverflow)?;
            payments.push(amount.checked_add(fee).ok_or(SimError::ArithmeticOverflow)?);
        }

        Ok(PricedSchedule { payments, fees, weighted })
    }
}

struct PricedSchedule {
    payments: Vec<U256>,
    fees: U256,
    weighted: U256,
}

impl PricedSchedule {
    fn spread(&self) -> U256 {
        let highest = self.payments.iter().copied().max().unwrap_or_default();
        let lowest = self.payments.iter().copied().min().unwrap_or_default();
        highest - lowest
    }
}

impl RateModel for HyperbolicCurve {
    fn fixed_rate(&self, input: &FixedRateInput<'_>) -> Result<U256, SimError> {
        if input.maturity <= input.now {
            return Err(SimError::MaturityNotInFuture {
                maturity: input.maturity,
                timestamp: input.now,
            });
        }
        let parameters = input.parameters;
        let base = floating_rate(parameters, max(input.u_floating, input.u_global))?;

        let pools = input.max_pools.max(1) as u64;
        let horizon = pools * MATURITY_INTERVAL - input.now % MATURITY_INTERVAL;
        let time_to_maturity = (input.maturity - input.now).min(horizon);
        let maturity_factor = mul_div_down(U256::from(time_to_maturity), WAD, U256::from(horizon))?;

        let spread = w_mul_down(
            w_mul_down(parameters.spread_factor, min(input.u_fixed, WAD))?,
            maturity_factor,
        )?;
        let multiplier = WAD
            .checked_add(parameters.time_preference)
            .and_then(|m| m.checked_add(spread))
            .ok_or(SimError::ArithmeticOverflow)?;

        Ok(min(w_mul_up(base, multiplier)?, parameters.max_rate))
    }

    fn split_installments(&self, input: &SplitInput<'_>) -> Result<InstallmentSplit, SimError> {
        let count = input.pool_utilizations.len();
        if count == 0 {
            return Err(SimError::InvalidInstallmentCount {
                count,
                max: crate::market::MAX_INSTALLMENTS,
            });
        }
        let n = U256::from(count);

        let mut amounts = vec![input.principal / n; count];
        if let Some(last) = amounts.last_mut() {
            *last += input.principal % n;
        }

        let tolerance = U256::from(count + 2);
        let mut best: Option<(Vec<U256>, PricedSchedule)> = None;

        for _ in 0..MAX_SPLIT_ITERATIONS {
            let priced = self.price_schedule(input, &amounts)?;
            let spread = priced.spread();
            let improved = best.as_ref().map_or(true, |(_, b)| spread < b.spread());
            let converged = spread <= tolerance;

            let next = if converged { None } else { Some(rescale(&amounts, &priced.payments, input.principal)?) };
            if improved {
                best = Some((amounts.clone(), priced));
            }
            match next {
                Some(rescaled) if rescaled != amounts => amounts = rescaled,
                _ => break,
            }
        }

        let Some((amounts, priced)) = best else {
            return Err(SimError::InvalidInstallmentCount {
                count,
                max: crate::market::MAX_INSTALLMENTS,
            });
        };

        let effective_rate = if priced.weighted.is_zero() {
            U256::ZERO
        } else {
            mul_div_down(priced.fees, WAD * U256::from(SECONDS_PER_YEAR), priced.weighted)?
        };

        Ok(InstallmentSplit {
            amounts,
            payments: priced.payments,
            effective_rate,
        })
    }
}

/// Moves principal from expensive installments to cheap ones so that every
/// payment approaches the mean, then restores the exact principal sum.
fn rescale(amounts: &[U256], payments: &[U256], principal: U256) -> Result<Vec<U256>, SimError> {
    let total: U256 = payments.iter().copied().fold(U256::ZERO, |acc, p| acc.saturating_add(p));
    let mean = total / U256::from(payments.len());

    let mut rescaled = amounts
        .iter()
        .zip(payments)
        .map(|(&amount, &payment)| {
            if payment.is_zero() {
                Ok(amount)
            } else {
                mul_div_down(amount, mean, payment)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sum: U256 = rescaled.iter().copied().fold(U256::ZERO, |acc, a| acc.saturating_add(a));
    // Residual goes to the largest slot, which can always absorb it.
    let largest = rescaled
        .iter()
        .enumerate()
        .max_by_key(|(_, a)| **a)
        .map(|(i, _)| i)
        .unwrap_or_default();
    if let Some(slot) = rescaled.get_mut(largest) {
        *slot = if sum <= principal {
            slot.checked_add(principal - sum).ok_or(SimError::ArithmeticOverflow)?
        } else {
            slot.saturating_sub(sum - principal)
        };
    }
    Ok(rescaled)
}

/// Annualized rate implied by paying `fee` on `principal` over `elapsed` seconds.
pub fn implied_rate(principal: U256, fee: U256, elapsed: u64) -> Result<U256, SimError> {
    let time_weight = principal
        .checked_mul(U256::from(elapsed))
        .ok_or(SimError::ArithmeticOverflow)?;
    mul_div_down(fee, WAD * U256::from(SECONDS_PER_YEAR), time_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent(p: u64) -> U256 {
        WAD * U256::from(p) / U256::from(100)
    }

    // 2_419_200_000 is maturity number 1000; `now` sits 18.25 days before it.
    const FIRST_MATURITY: u64 = 1000 * MATURITY_INTERVAL;
    const NOW: u64 = FIRST_MATURITY - 1_576_800;

    #[test]
    fn test_utilizations() {
        let assets = U256::from(1_000u64);
        assert_eq!(floating_utilization(assets, U256::from(250u64)).unwrap(), percent(25));
        assert_eq!(floating_utilization(U256::ZERO, U256::from(250u64)).unwrap(), U256::ZERO);
        assert_eq!(fixed_utilization(U256::from(500u64), U256::from(100u64), assets).unwrap(), U256::ZERO);
        assert_eq!(
            global_utilization(assets, U256::from(900u64), U256::from(500u64)).unwrap(),
            WAD
        );
        assert_eq!(global_utilization(U256::ZERO, U256::from(1u64), U256::ZERO).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_utilization_impact_rounds_up() {
        let impact = utilization_impact(U256::from(1u64), U256::from(3u64)).unwrap();
        assert_eq!(impact, WAD / U256::from(3) + U256::from(1));
        assert_eq!(utilization_impact(U256::from(1u64), U256::ZERO).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_floating_rate_curve() {
        let params = RateModelParameters::default();
        assert_eq!(floating_rate(&params, U256::ZERO).unwrap(), params.min_rate);
        // two floor divisions lose at most a couple of wei
        let at_natural = floating_rate(&params, params.natural_utilization).unwrap();
        assert!(params.natural_rate - at_natural <= U256::from(2));
        assert_eq!(floating_rate(&params, params.max_utilization).unwrap(), params.max_rate);

        let low = floating_rate(&params, percent(50)).unwrap();
        let high = floating_rate(&params, percent(90)).unwrap();
        assert!(low < params.natural_rate);
        assert!(high > params.natural_rate);
    }

    #[test]
    fn test_floating_rate_rejects_degenerate_curve() {
        let params = RateModelParameters {
            natural_utilization: U256::ZERO,
            ..RateModelParameters::default()
        };
        let result = floating_rate(&params, percent(50));
        assert_eq!(result, Err(SimError::InvalidRateParameters("natural utilization is zero")));
        assert!(!result.unwrap_err().is_arithmetic());

        let params = RateModelParameters {
            natural_utilization: percent(120),
            ..RateModelParameters::default()
        };
        assert!(matches!(
            floating_rate(&params, percent(50)),
            Err(SimError::InvalidRateParameters(_))
        ));
    }

    #[test]
    fn test_fixed_rate_increases_with_fixed_utilization() {
        let params = RateModelParameters::default();
        let input = |u_fixed| FixedRateInput {
            maturity: FIRST_MATURITY,
            max_pools: 6,
            u_fixed,
            u_floating: percent(40),
            u_global: percent(50),
            parameters: &params,
            now: NOW,
        };
        let curve = HyperbolicCurve;
        let unused = curve.fixed_rate(&input(U256::ZERO)).unwrap();
        let busy = curve.fixed_rate(&input(percent(80))).unwrap();
        assert!(busy > unused);
        assert!(unused >= floating_rate(&params, percent(50)).unwrap());
    }

    #[test]
    fn test_fixed_rate_rejects_past_maturity() {
        let params = RateModelParameters::default();
        let result = HyperbolicCurve.fixed_rate(&FixedRateInput {
            maturity: NOW,
            max_pools: 6,
            u_fixed: U256::ZERO,
            u_floating: U256::ZERO,
            u_global: U256::ZERO,
            parameters: &params,
            now: NOW,
        });
        assert!(matches!(result, Err(SimError::MaturityNotInFuture { .. })));
    }

    #[test]
    fn test_split_preserves_principal_and_equalizes_payments() {
        let params = RateModelParameters::default();
        let utilizations = vec![percent(10), percent(5), U256::ZERO, U256::ZERO];
        let principal = U256::from(1_000_000_000u64); // 1000 USDC
        let input = SplitInput {
            principal,
            deposits: U256::from(10_000_000_000_000u64),
            first_maturity: FIRST_MATURITY,
            max_pools: 6,
            pool_utilizations: &utilizations,
            u_floating: percent(40),
            u_global: percent(50),
            parameters: &params,
            now: NOW,
        };

        let split = HyperbolicCurve.split_installments(&input).unwrap();
        assert_eq!(split.amounts.len(), 4);
        assert_eq!(split.payments.len(), 4);

        let sum = split.amounts.iter().fold(U256::ZERO, |acc, a| acc + *a);
        assert_eq!(sum, principal);

        let total = split.payments.iter().fold(U256::ZERO, |acc, p| acc + *p);
        assert!(total >= principal);
        assert!(split.effective_rate > U256::ZERO);

        let highest = split.payments.iter().max().unwrap();
        let lowest = split.payments.iter().min().unwrap();
        // within a hundredth of a percent of each other
        assert!(*highest - *lowest <= total / U256::from(10_000));

        // later maturities accrue for longer, so they borrow less principal
        assert!(split.amounts[0] > split.amounts[3]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let params = RateModelParameters::default();
        let utilizations = vec![U256::ZERO; 3];
        let input = SplitInput {
            principal: U256::from(123_456_789u64),
            deposits: U256::ZERO,
            first_maturity: FIRST_MATURITY,
            max_pools: 6,
            pool_utilizations: &utilizations,
            u_floating: percent(30),
            u_global: percent(30),
            parameters: &params,
            now: NOW,
        };
        let a = HyperbolicCurve.split_installments(&input).unwrap();
        let b = HyperbolicCurve.split_installments(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_empty_schedule() {
        let params = RateModelParameters::default();
        let input = SplitInput {
            principal: U256::from(1u64),
            deposits: U256::from(1u64),
            first_maturity: FIRST_MATURITY,
            max_pools: 6,
            pool_utilizations: &[],
            u_floating: U256::ZERO,
            u_global: U256::ZERO,
            parameters: &params,
            now: NOW,
        };
        assert!(matches!(
            HyperbolicCurve.split_installments(&input),
            Err(SimError::InvalidInstallmentCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_implied_rate() {
        // 0.5 USDC on 100 USDC over 1/20 year is 10%
        let rate = implied_rate(U256::from(100_000_000u64), U256::from(500_000u64), 1_576_800).unwrap();
        assert_eq!(rate, percent(10));
    }
}
