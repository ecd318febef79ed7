//! Detailed output formatting for a repayment.

use alloy_primitives::B256;
use colored::Colorize;
use exa_credit_api::RepayPreview;
use exa_credit_sim::RepayAdjustment;

use crate::units::{format_amount, format_rate};

pub(crate) fn format_adjustment(adjustment: &RepayAdjustment) -> String {
    match adjustment {
        RepayAdjustment::Discount(share) => format!("{} discount", format_rate(*share)),
        RepayAdjustment::Penalty(share) => format!("{} penalty", format_rate(*share)),
        RepayAdjustment::None => "-".to_string(),
    }
}

pub fn format_repay_detail(preview: &RepayPreview, decimals: u8, tx_hash: Option<B256>) -> String {
    let amount = |value| format_amount(value, decimals);
    let mut output = String::new();

    output.push_str(&format!("{}\n", "=".repeat(60)));
    output.push_str(&format!("{}\n", format!("Repay at maturity {}", preview.position.maturity).bold()));
    output.push_str(&format!("{}\n\n", "=".repeat(60)));

    output.push_str(&format!("{}\n", "Position".cyan().bold()));
    output.push_str(&format!("  Principal:   {}\n", amount(preview.position.principal)));
    output.push_str(&format!("  Fee:         {}\n", amount(preview.position.fee)));
    output.push_str(&format!("  Total:       {}\n\n", amount(preview.position_value)));

    output.push_str(&format!("{}\n", "Repayment".cyan().bold()));
    output.push_str(&format!("  Mode:        {}\n", preview.mode));
    output.push_str(&format!("  Selected:    {}\n", amount(preview.position_assets)));
    output.push_str(&format!("  Pays now:    {}\n", amount(preview.repay_assets)));
    output.push_str(&format!("  Max repay:   {}\n", amount(preview.max_repay)));
    output.push_str(&format!("  Adjustment:  {}\n\n", format_adjustment(&preview.adjustment)));

    output.push_str(&format!("{}\n", "Limits".cyan().bold()));
    output.push_str(&format!("  Available:   {}\n", amount(preview.available)));
    output.push_str(&format!("  Max payable: {}\n", amount(preview.cap.effective_max)));
    output.push_str(&format!("  Hint:        {}\n", preview.cap.hint));

    if let Some(hash) = tx_hash {
        output.push('\n');
        output.push_str(&format!("{}\n", "Transaction confirmed!".green().bold()));
        output.push_str(&format!("  Tx Hash:     {:#x}\n", hash));
    }

    output
}
