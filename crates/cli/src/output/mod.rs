//! Output formatting for CLI results.

pub mod detail;
pub mod json;
pub mod table;

use alloy_primitives::U256;

pub use detail::format_repay_detail;
pub use json::{installments_json, proposals_json, repay_json};
pub use table::{format_installments_table, format_proposals_table};

/// Display data of a proposal's market.
#[derive(Debug, Clone, Copy)]
pub struct MarketInfo {
    pub decimals: u8,
    pub usd_price: U256,
}
