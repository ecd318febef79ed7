//! Fixed-point arithmetic kernel.
//!
//! Every conversion between asset decimals, WAD-scaled ratios and USD values
//! goes through [`mul_div_down`] / [`mul_div_up`]. Both fail instead of
//! wrapping: a product that does not fit in 256 bits is an
//! [`SimError::ArithmeticOverflow`] and a zero denominator is a
//! [`SimError::DivisionByZero`].

use alloy_primitives::U256;

use crate::error::SimError;

/// 1e18, the scale of every ratio and rate in this crate.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Rounding direction for fixed-point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingDirection {
    Up,
    Down,
}

/// `a * b / denominator`, rounded down.
pub fn mul_div_down(a: U256, b: U256, denominator: U256) -> Result<U256, SimError> {
    if denominator.is_zero() {
        return Err(SimError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(SimError::ArithmeticOverflow)?;
    Ok(product / denominator)
}

/// `a * b / denominator`, rounded up.
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256, SimError> {
    if denominator.is_zero() {
        return Err(SimError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(SimError::ArithmeticOverflow)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::from(1))
    }
}

/// `a * b / denominator` with an explicit rounding direction.
pub fn mul_div(
    a: U256,
    b: U256,
    denominator: U256,
    rounding: RoundingDirection,
) -> Result<U256, SimError> {
    match rounding {
        RoundingDirection::Down => mul_div_down(a, b, denominator),
        RoundingDirection::Up => mul_div_up(a, b, denominator),
    }
}

/// `x * y / WAD`, rounded down.
pub fn w_mul_down(x: U256, y: U256) -> Result<U256, SimError> {
    mul_div_down(x, y, WAD)
}

/// `x * y / WAD`, rounded up.
pub fn w_mul_up(x: U256, y: U256) -> Result<U256, SimError> {
    mul_div_up(x, y, WAD)
}

/// `x * WAD / y`, rounded down.
pub fn w_div_down(x: U256, y: U256) -> Result<U256, SimError> {
    mul_div_down(x, WAD, y)
}

/// `x * WAD / y`, rounded up.
pub fn w_div_up(x: U256, y: U256) -> Result<U256, SimError> {
    mul_div_up(x, WAD, y)
}

/// `ceil(x / y)`.
pub fn ceil_div(x: U256, y: U256) -> Result<U256, SimError> {
    mul_div_up(x, U256::from(1), y)
}

/// `x - y`, floored at zero.
pub fn zero_floor_sub(x: U256, y: U256) -> U256 {
    x.saturating_sub(y)
}

/// Returns the smaller of two values.
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// Returns the larger of two values.
pub fn max(a: U256, b: U256) -> U256 {
    if a > b {
        a
    } else {
        b
    }
}

/// `10^decimals`.
pub fn decimals_scale(decimals: u8) -> Result<U256, SimError> {
    U256::from(10)
        .checked_pow(U256::from(decimals))
        .ok_or(SimError::ArithmeticOverflow)
}

/// Converts an amount in `decimals` units to WAD units.
pub fn to_wad(amount: U256, decimals: u8) -> Result<U256, SimError> {
    mul_div_down(amount, WAD, decimals_scale(decimals)?)
}

/// Converts a WAD amount back to `decimals` units, rounding as requested.
pub fn from_wad(amount: U256, decimals: u8, rounding: RoundingDirection) -> Result<U256, SimError> {
    mul_div(amount, decimals_scale(decimals)?, WAD, rounding)
}

/// USD value (WAD) of `amount` asset units priced at `usd_price` (WAD per whole unit).
pub fn to_usd(amount: U256, decimals: u8, usd_price: U256) -> Result<U256, SimError> {
    mul_div_down(amount, usd_price, decimals_scale(decimals)?)
}

/// Simple interest on `amount` at annual `rate` (WAD) over `elapsed` seconds, rounded down.
pub fn simple_interest(amount: U256, rate: U256, elapsed: u64) -> Result<U256, SimError> {
    let scaled = amount.checked_mul(rate).ok_or(SimError::ArithmeticOverflow)?;
    let denominator = WAD
        .checked_mul(U256::from(SECONDS_PER_YEAR))
        .ok_or(SimError::ArithmeticOverflow)?;
    mul_div_down(scaled, U256::from(elapsed), denominator)
}

/// Lossy conversion of a WAD value to `f64`, for display only.
pub fn wad_to_f64(value: U256) -> f64 {
    let whole = value / WAD;
    let fraction = value % WAD;
    whole.saturating_to::<u128>() as f64 + fraction.saturating_to::<u128>() as f64 / 1e18
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        let a = U256::from(10);
        let b = U256::from(10);
        let d = U256::from(3);
        assert_eq!(mul_div_down(a, b, d).unwrap(), U256::from(33));
        assert_eq!(mul_div_up(a, b, d).unwrap(), U256::from(34));
    }

    #[test]
    fn test_mul_div_exact_does_not_round_up() {
        let result = mul_div_up(U256::from(6), U256::from(4), U256::from(8)).unwrap();
        assert_eq!(result, U256::from(3));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            mul_div_down(U256::from(1), U256::from(1), U256::ZERO),
            Err(SimError::DivisionByZero)
        ));
        assert!(matches!(
            mul_div_up(U256::from(1), U256::from(1), U256::ZERO),
            Err(SimError::DivisionByZero)
        ));
    }

    #[test]
    fn test_intermediate_overflow() {
        let result = mul_div_down(U256::MAX, U256::from(2), U256::from(4));
        assert!(matches!(result, Err(SimError::ArithmeticOverflow)));
    }

    #[test]
    fn test_wad_helpers() {
        let half = WAD / U256::from(2);
        assert_eq!(w_mul_down(WAD * U256::from(3), half).unwrap(), WAD * U256::from(3) / U256::from(2));
        assert_eq!(w_div_down(U256::from(1), U256::from(4)).unwrap(), WAD / U256::from(4));
        assert_eq!(w_div_up(U256::from(1), U256::from(3)).unwrap(), WAD / U256::from(3) + U256::from(1));
    }

    #[test]
    fn test_decimal_conversions() {
        let one_usdc = U256::from(1_000_000u64);
        assert_eq!(to_wad(one_usdc, 6).unwrap(), WAD);
        assert_eq!(from_wad(WAD, 6, RoundingDirection::Down).unwrap(), one_usdc);
        assert_eq!(
            from_wad(WAD + U256::from(1), 6, RoundingDirection::Up).unwrap(),
            one_usdc + U256::from(1)
        );
    }

    #[test]
    fn test_to_usd() {
        // 2.5 ETH at $2000
        let amount = U256::from(2_500_000_000_000_000_000u128);
        let price = U256::from(2000) * WAD;
        assert_eq!(to_usd(amount, 18, price).unwrap(), U256::from(5000) * WAD);
    }

    #[test]
    fn test_simple_interest() {
        // 100 USDC at 10% for half a year
        let amount = U256::from(100_000_000u64);
        let rate = WAD / U256::from(10);
        let interest = simple_interest(amount, rate, SECONDS_PER_YEAR / 2).unwrap();
        assert_eq!(interest, U256::from(5_000_000u64));
    }

    #[test]
    fn test_min_max_floor_sub() {
        let a = U256::from(3);
        let b = U256::from(7);
        assert_eq!(min(a, b), a);
        assert_eq!(max(a, b), b);
        assert_eq!(zero_floor_sub(a, b), U256::ZERO);
        assert_eq!(zero_floor_sub(b, a), U256::from(4));
    }

    #[test]
    fn test_wad_to_f64() {
        let value = WAD + WAD / U256::from(4);
        assert!((wad_to_f64(value) - 1.25).abs() < 1e-12);
    }
}
