//! Proposals command implementation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::Result;
use exa_credit_api::{ChainReader, ExaClient, ExaClientConfig};

use crate::cli::{OutputFormat, ProposalsArgs};
use crate::commands::settlement_config;
use crate::output::{format_proposals_table, proposals_json, MarketInfo};

pub async fn run_proposals(args: &ProposalsArgs, format: OutputFormat) -> Result<()> {
    let client = ExaClient::with_config(
        ExaClientConfig::new()
            .with_rpc_url(&args.deployment.rpc_url)
            .with_settlement_config(settlement_config(&args.deployment)),
    )?;

    let proposals = client.proposals(args.account.0).await?;

    let mut markets = HashMap::new();
    for market in proposals.iter().map(|view| view.proposal.market) {
        if let Entry::Vacant(entry) = markets.entry(market) {
            let snapshot = client.reader().read_market_snapshot(market, None).await?;
            entry.insert(MarketInfo {
                decimals: snapshot.decimals,
                usd_price: snapshot.usd_price,
            });
        }
    }

    match format {
        OutputFormat::Table => {
            println!("{}", format_proposals_table(&proposals, &markets)?);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&proposals_json(&proposals, &markets)?)?;
            println!("{}", json);
        }
    }

    Ok(())
}
