//! Command implementations.

pub mod installments;
pub mod proposals;
pub mod repay;

use std::time::Duration;

use exa_credit_api::SettlementConfig;

use crate::cli::DeploymentArgs;

pub use installments::run_installments;
pub use proposals::run_proposals;
pub use repay::run_repay;

/// Settlement configuration from the deployment flags.
pub fn settlement_config(args: &DeploymentArgs) -> SettlementConfig {
    let mut config = SettlementConfig::new(args.debt_market.0, args.debt_asset.0)
        .with_proposal_expiry(Duration::from_secs(args.proposal_expiry));
    if let Some(plugin) = args.plugin {
        config = config.with_exa_plugin(plugin.0);
    }
    if let Some(manager) = args.proposal_manager {
        config = config.with_proposal_manager(manager.0);
    }
    if let Some(previewer) = args.previewer {
        config = config.with_exa_previewer(previewer.0);
    }
    if let Some(previewer) = args.market_previewer {
        config = config.with_market_previewer(previewer.0);
    }
    if let Some(auditor) = args.auditor {
        config = config.with_auditor(auditor.0);
    }
    if let Some(reservoir) = args.reservoir {
        config = config.with_liquidity_reservoir(reservoir.0);
    }
    config
}
