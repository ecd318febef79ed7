//! Conversions between token base units and human-readable amounts.

use alloy_primitives::utils::format_units;
use alloy_primitives::U256;
use anyhow::{Context, Result};
use exa_credit_sim::math::wad_to_f64;

/// Parse a human-readable amount string to U256 given decimals.
///
/// Digits past `decimals` are truncated.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let (integer_part, fractional_part) = match amount.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (amount, ""),
    };
    if (integer_part.is_empty() && fractional_part.is_empty())
        || !integer_part.chars().chain(fractional_part.chars()).all(|c| c.is_ascii_digit())
    {
        anyhow::bail!("Invalid amount format: {}", amount);
    }

    let decimals = usize::from(decimals);
    let fractional = if fractional_part.len() > decimals {
        &fractional_part[..decimals]
    } else {
        fractional_part
    };
    let fractional_padded = format!("{:0<width$}", fractional, width = decimals);

    let combined = format!("{}{}", integer_part, fractional_padded);
    let combined = combined.trim_start_matches('0');
    if combined.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(combined, 10).with_context(|| format!("Failed to parse amount: {}", amount))
}

/// Base units as a decimal string, trailing zeros trimmed.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    match format_units(amount, decimals) {
        Ok(s) if s.contains('.') => s.trim_end_matches('0').trim_end_matches('.').to_string(),
        Ok(s) => s,
        Err(_) => amount.to_string(),
    }
}

/// A WAD fraction as a percentage.
pub fn format_rate(rate: U256) -> String {
    format!("{:.2}%", wad_to_f64(rate) * 100.0)
}

/// A WAD USD value with thousands suffixes.
pub fn format_usd(value: U256) -> String {
    let v = wad_to_f64(value);
    if v >= 1_000_000.0 {
        format!("${:.2}M", v / 1_000_000.0)
    } else if v >= 1_000.0 {
        format!("${:.2}K", v / 1_000.0)
    } else {
        format!("${:.2}", v)
    }
}
