//! Settlement mode selection.

use std::fmt;

use alloy_primitives::{Address, U256};
use exa_credit_sim::MarketSnapshot;

/// How a repayment is funded and submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementMode {
    /// Debt asset from the account's own deposit, via proposal
    Repay,
    /// Another deposited asset swapped into the debt asset, via proposal
    CrossRepay,
    /// Debt asset through a legacy plugin
    LegacyRepay,
    /// Another deposited asset through a legacy plugin
    LegacyCrossRepay,
    /// A wallet token swapped and repaid in one batch
    External,
}

/// Picks the settlement mode. Total over all inputs.
pub fn select_mode(is_external: bool, plugin_is_latest: bool, asset_is_native_debt: bool) -> SettlementMode {
    match (is_external, plugin_is_latest, asset_is_native_debt) {
        (true, _, _) => SettlementMode::External,
        (false, true, true) => SettlementMode::Repay,
        (false, true, false) => SettlementMode::CrossRepay,
        (false, false, true) => SettlementMode::LegacyRepay,
        (false, false, false) => SettlementMode::LegacyCrossRepay,
    }
}

impl SettlementMode {
    /// Resolves the mode for a typed funding asset.
    pub fn for_asset(asset: &FundingAsset, debt_market: Address, plugin_is_latest: bool) -> Self {
        let native = matches!(asset, FundingAsset::Protocol { market, .. } if *market == debt_market);
        select_mode(asset.is_external(), plugin_is_latest, native)
    }

    /// Whether the mode needs a swap route.
    pub fn uses_router(&self) -> bool {
        matches!(self, Self::CrossRepay | Self::LegacyCrossRepay | Self::External)
    }

    /// Whether the mode goes through the delayed-proposal queue.
    pub fn uses_proposal(&self) -> bool {
        matches!(self, Self::Repay | Self::CrossRepay)
    }
}

impl fmt::Display for SettlementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Repay => "repay",
            Self::CrossRepay => "cross repay",
            Self::LegacyRepay => "legacy repay",
            Self::LegacyCrossRepay => "legacy cross repay",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Where repayment funds come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingAsset {
    /// A floating deposit in one of the protocol's markets
    Protocol {
        market: Address,
        asset: Address,
        decimals: u8,
        usd_price: U256,
        available: U256,
    },
    /// A token held directly by the account
    External {
        token: Address,
        decimals: u8,
        usd_price: U256,
        available: U256,
    },
}

impl FundingAsset {
    /// Funding from the account's deposit in `snapshot`'s market.
    pub fn from_market(snapshot: &MarketSnapshot, available: U256) -> Self {
        Self::Protocol {
            market: snapshot.market,
            asset: snapshot.asset,
            decimals: snapshot.decimals,
            usd_price: snapshot.usd_price,
            available,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }

    /// Token that leaves the account (the swap's input).
    pub fn token(&self) -> Address {
        match self {
            Self::Protocol { asset, .. } => *asset,
            Self::External { token, .. } => *token,
        }
    }

    /// Amount usable for repayment, in the asset's decimals.
    pub fn available(&self) -> U256 {
        match self {
            Self::Protocol { available, .. } | Self::External { available, .. } => *available,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Self::Protocol { decimals, .. } | Self::External { decimals, .. } => *decimals,
        }
    }

    pub fn usd_price(&self) -> U256 {
        match self {
            Self::Protocol { usd_price, .. } | Self::External { usd_price, .. } => *usd_price,
        }
    }

    /// Market the funds are withdrawn from, for protocol funding.
    pub fn market(&self) -> Option<Address> {
        match self {
            Self::Protocol { market, .. } => Some(*market),
            Self::External { .. } => None,
        }
    }
}
