//! Installments command implementation.

use anyhow::Result;
use exa_credit_api::{ExaClient, ExaClientConfig};

use crate::cli::{InstallmentsArgs, OutputFormat};
use crate::commands::settlement_config;
use crate::output::{format_installments_table, installments_json};
use crate::units::parse_amount;

pub async fn run_installments(args: &InstallmentsArgs, format: OutputFormat) -> Result<()> {
    let client = ExaClient::with_config(
        ExaClientConfig::new()
            .with_rpc_url(&args.deployment.rpc_url)
            .with_settlement_config(settlement_config(&args.deployment)),
    )?;

    let decimals = client.debt_market(None).await?.decimals;
    let principal = parse_amount(&args.amount, decimals)?;
    if principal.is_zero() {
        anyhow::bail!("Amount must be greater than zero");
    }
    let plan = client.installments(principal, args.count).await?;

    match format {
        OutputFormat::Table => {
            println!("{}", format_installments_table(&plan, decimals));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&installments_json(&plan, decimals))?;
            println!("{}", json);
        }
    }

    Ok(())
}
