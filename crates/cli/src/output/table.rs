//! Table formatting for installment options and proposals.

use std::collections::HashMap;

use alloy_primitives::Address;
use anyhow::Result;
use exa_credit_api::ProposalView;
use exa_credit_sim::InstallmentPlan;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use super::MarketInfo;
use crate::units::{format_amount, format_rate, format_usd};

#[derive(Tabled)]
struct InstallmentRow {
    #[tabled(rename = "Installments")]
    count: usize,
    #[tabled(rename = "Payment")]
    payment: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "APR")]
    rate: String,
}

#[derive(Tabled)]
struct ProposalRow {
    #[tabled(rename = "Nonce")]
    nonce: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Market")]
    market: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Value (USD)")]
    value: String,
    #[tabled(rename = "Unlock")]
    unlock: u64,
    #[tabled(rename = "Status")]
    status: String,
}

pub(crate) fn truncate_address(addr: &str) -> String {
    if addr.len() > 10 {
        format!("{}...{}", &addr[..6], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::left()));
    table.to_string()
}

pub fn format_installments_table(plan: &InstallmentPlan, decimals: u8) -> String {
    let rows: Vec<InstallmentRow> = plan
        .installments
        .iter()
        .map(|option| {
            let payment = match option.payments.as_deref() {
                None => "unavailable".to_string(),
                Some([first, rest @ ..]) if rest.iter().all(|p| p == first) => format_amount(*first, decimals),
                Some([first, ..]) => format!("from {}", format_amount(*first, decimals)),
                Some([]) => "-".to_string(),
            };
            let available = option.payments.is_some();
            InstallmentRow {
                count: option.count,
                payment,
                total: if available {
                    format_amount(option.total, decimals)
                } else {
                    "-".to_string()
                },
                rate: if available {
                    format_rate(option.rate)
                } else {
                    "-".to_string()
                },
            }
        })
        .collect();

    format!("First maturity: {}\n{}", plan.first_maturity, render(rows))
}

pub fn format_proposals_table(proposals: &[ProposalView], markets: &HashMap<Address, MarketInfo>) -> Result<String> {
    if proposals.is_empty() {
        return Ok("No pending proposals.".to_string());
    }

    let rows = proposals
        .iter()
        .map(|view| {
            let market = view.proposal.market;
            let (amount, value) = match markets.get(&market) {
                Some(info) => (
                    format_amount(view.proposal.amount, info.decimals),
                    format_usd(view.usd_value(info.decimals, info.usd_price)?),
                ),
                None => (view.proposal.amount.to_string(), "-".to_string()),
            };
            Ok(ProposalRow {
                nonce: view.proposal.nonce.to_string(),
                kind: view.label().to_string(),
                market: truncate_address(&market.to_string()),
                amount,
                value,
                unlock: view.proposal.unlock,
                status: view.status.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(render(rows))
}
