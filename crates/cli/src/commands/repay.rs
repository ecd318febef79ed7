//! Repay command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use exa_credit_api::{
    ExaClient, ExaClientConfig, QuoteKind, RouterConfig, SettlementSession, SimulationOutcome,
};

use crate::cli::{OutputFormat, RepayArgs};
use crate::commands::settlement_config;
use crate::output::{format_repay_detail, repay_json};
use crate::units::parse_amount;

/// Router tools tried before giving up on a repayment.
const MAX_SIMULATION_ATTEMPTS: usize = 3;

fn progress(format: OutputFormat, message: &str) {
    if matches!(format, OutputFormat::Table) {
        println!("{}", message);
    }
}

fn router_config(args: &RepayArgs) -> RouterConfig {
    let mut config = RouterConfig::new();
    if let Some(url) = &args.router_url {
        config = config.with_base_url(url);
    }
    if let Some(key) = &args.router_api_key {
        config = config.with_api_key(key);
    }
    config
}

async fn select_funding(session: &mut SettlementSession, args: &RepayArgs) -> Result<()> {
    match (args.from_market, args.from_token) {
        (_, Some(token)) => {
            let decimals = args.token_decimals.context("--token-decimals is required")?;
            let price = args.token_price.as_deref().context("--token-price is required")?;
            let usd_price = parse_amount(price, 18)?;
            session.fund_from_token(token.0, decimals, usd_price).await?;
        }
        (Some(market), None) => session.fund_from_market(market.0).await?,
        (None, None) => {
            let debt_market = session.config().debt_market;
            session.fund_from_market(debt_market).await?;
        }
    }
    Ok(())
}

/// Simulates until a route settles, replacing reverting router tools.
async fn simulate(session: &mut SettlementSession, timeout: Duration, format: OutputFormat) -> Result<SimulationOutcome> {
    let routed = session.mode()?.uses_router();
    for _ in 0..MAX_SIMULATION_ATTEMPTS {
        if routed {
            progress(format, "Waiting for a firm quote...");
            let amount = session.max_repay()?;
            let denylist = session.denylist().await;
            // the cap is read from the probe route
            session
                .wait_for_quote(QuoteKind::Indicative, timeout, |state| {
                    state.route.as_ref().is_some_and(|r| !denylist.contains(&r.tool))
                })
                .await?;
            session
                .wait_for_quote(QuoteKind::Firm, timeout, |state| {
                    state.request.as_ref().is_some_and(|r| r.amount == amount)
                        && state.route.as_ref().is_some_and(|r| !denylist.contains(&r.tool))
                })
                .await?;
        }

        progress(format, "Simulating...");
        match session.simulate().await? {
            SimulationOutcome::ToolReverted(tool) => {
                progress(format, &format!("Route through {} reverted, requoting...", tool));
            }
            outcome => return Ok(outcome),
        }
    }
    anyhow::bail!("No router tool settled the repayment after {} attempts", MAX_SIMULATION_ATTEMPTS)
}

pub async fn run_repay(args: &RepayArgs, format: OutputFormat) -> Result<()> {
    let config = ExaClientConfig::new()
        .with_rpc_url(&args.deployment.rpc_url)
        .with_private_key(&args.private_key)
        .with_router_config(router_config(args))
        .with_settlement_config(settlement_config(&args.deployment));

    progress(format, "Connecting to RPC...");
    let client = ExaClient::with_config(config)?;
    let timeout = Duration::from_secs(args.quote_timeout);

    progress(format, "Reading position...");
    let mut session = client.open_session(args.account.0, args.maturity).await?;
    select_funding(&mut session, args).await?;

    if session.mode()?.uses_router() {
        progress(format, "Probing swap liquidity...");
        session
            .wait_for_quote(QuoteKind::Indicative, timeout, |state| state.route.is_some())
            .await?;
    }

    let preview = session.preview().await?;
    let decimals = preview_decimals(&session)?;
    let requested = if args.amount.eq_ignore_ascii_case("max") {
        preview.position_value
    } else {
        parse_amount(&args.amount, decimals)?
    };
    let selection = session.set_position_assets(requested).await?;
    if selection.amount.is_zero() {
        anyhow::bail!("Nothing to repay: {}", preview.cap.hint);
    }
    if selection.max_reached && selection.amount < requested {
        progress(format, &format!("Amount capped: {}", preview.cap.hint));
    }

    let outcome = simulate(&mut session, timeout, format).await?;
    let preview = session.preview().await?;

    let tx_hash = match &outcome {
        SimulationOutcome::Ready if args.execute => {
            progress(format, "Submitting transaction...");
            Some(session.execute().await?)
        }
        SimulationOutcome::Ready => None,
        SimulationOutcome::Failed(failure) => {
            anyhow::bail!("Simulation failed ({:?}): {}", failure.category, failure.message)
        }
        SimulationOutcome::ToolReverted(tool) => anyhow::bail!("Route through {} reverted", tool),
        SimulationOutcome::Skipped => anyhow::bail!("Simulation was skipped"),
    };
    session.close();

    match format {
        OutputFormat::Table => {
            println!("{}", format_repay_detail(&preview, decimals, tx_hash));
            if tx_hash.is_none() {
                println!("Simulation succeeded. Pass --execute to submit.");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&repay_json(&preview, decimals, tx_hash))?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn preview_decimals(session: &SettlementSession) -> Result<u8> {
    session
        .context()
        .map(|context| context.debt.decimals)
        .context("Session has no market state")
}
