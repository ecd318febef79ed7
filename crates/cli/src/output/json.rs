//! JSON output. Amounts are strings in base units.

use std::collections::HashMap;

use alloy_primitives::{Address, B256};
use anyhow::Result;
use exa_credit_api::{ProposalView, RepayPreview};
use exa_credit_sim::InstallmentPlan;
use serde_json::{json, Value};

use super::detail::format_adjustment;
use super::MarketInfo;
use crate::units::format_amount;

pub fn installments_json(plan: &InstallmentPlan, decimals: u8) -> Value {
    let installments: Vec<Value> = plan
        .installments
        .iter()
        .map(|option| {
            json!({
                "count": option.count,
                "payments": option
                    .payments
                    .as_ref()
                    .map(|payments| payments.iter().map(ToString::to_string).collect::<Vec<_>>()),
                "total": option.total.to_string(),
                "rate": option.rate.to_string(),
            })
        })
        .collect();
    json!({
        "decimals": decimals,
        "firstMaturity": plan.first_maturity,
        "installments": installments,
    })
}

pub fn proposals_json(proposals: &[ProposalView], markets: &HashMap<Address, MarketInfo>) -> Result<Value> {
    let proposals = proposals
        .iter()
        .map(|view| {
            let usd_value = match markets.get(&view.proposal.market) {
                Some(info) => Some(view.usd_value(info.decimals, info.usd_price)?.to_string()),
                None => None,
            };
            Ok(json!({
                "nonce": view.proposal.nonce.to_string(),
                "type": view.label(),
                "market": view.proposal.market.to_string(),
                "amount": view.proposal.amount.to_string(),
                "usdValue": usd_value,
                "timestamp": view.proposal.timestamp,
                "unlock": view.proposal.unlock,
                "status": view.status.to_string(),
            }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(proposals))
}

pub fn repay_json(preview: &RepayPreview, decimals: u8, tx_hash: Option<B256>) -> Value {
    json!({
        "maturity": preview.position.maturity,
        "mode": preview.mode.to_string(),
        "positionValue": preview.position_value.to_string(),
        "positionAssets": preview.position_assets.to_string(),
        "repayAssets": preview.repay_assets.to_string(),
        "maxRepay": preview.max_repay.to_string(),
        "formattedRepay": format_amount(preview.repay_assets, decimals),
        "adjustment": format_adjustment(&preview.adjustment),
        "available": preview.available.to_string(),
        "maxPositionAssets": preview.cap.effective_max.to_string(),
        "canPayFullDebt": preview.cap.can_pay_full_debt,
        "hint": preview.cap.hint.to_string(),
        "txHash": tx_hash.map(|hash| format!("{:#x}", hash)),
    })
}
