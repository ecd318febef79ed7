//! Delayed proposals: status, decoding and debt rollover.

use std::fmt;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use exa_credit_contracts::settlement::roll_debt_proposal;
use exa_credit_contracts::{PreparedCall, ProposalPayload, ProposalType};
use exa_credit_sim::capping::apply_slippage;
use exa_credit_sim::math::to_usd;
use exa_credit_sim::{next_maturity, rollover_rate, MarketSnapshot, MATURITY_INTERVAL, ROLL_DEBT_SLIPPAGE};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::reader::{ChainReader, PendingProposal};

/// Where a proposal is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    /// No proposal queued
    None,
    /// Queued, waiting for the delay
    Pending,
    /// Delay elapsed, executable
    Ready,
    /// Already executed
    Executed,
    /// Never executed within the expiry window
    Expired,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Executed => "executed",
            Self::Expired => "expired",
        };
        write!(f, "{}", status)
    }
}

/// Status of `proposal` at `now`, given the account's next executable nonce.
pub fn proposal_status(
    proposal: Option<&PendingProposal>,
    next_nonce: U256,
    now: u64,
    expiry: Duration,
) -> ProposalStatus {
    let Some(proposal) = proposal else {
        return ProposalStatus::None;
    };
    if proposal.nonce < next_nonce {
        ProposalStatus::Executed
    } else if now < proposal.unlock {
        ProposalStatus::Pending
    } else if now >= proposal.unlock.saturating_add(expiry.as_secs()) {
        ProposalStatus::Expired
    } else {
        ProposalStatus::Ready
    }
}

/// A pending proposal with its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalView {
    pub proposal: PendingProposal,
    /// `None` for type bytes this client does not know
    pub proposal_type: Option<ProposalType>,
    /// `None` when the data does not decode as its type
    pub payload: Option<ProposalPayload>,
    pub status: ProposalStatus,
}

impl ProposalView {
    pub fn new(proposal: PendingProposal, next_nonce: U256, now: u64, expiry: Duration) -> Self {
        let status = proposal_status(Some(&proposal), next_nonce, now, expiry);
        let proposal_type = ProposalType::try_from(proposal.proposal_type).ok();
        let payload = proposal_type.and_then(|kind| match ProposalPayload::decode(kind, &proposal.data) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(nonce = %proposal.nonce, error = %e, "undecodable proposal payload");
                None
            }
        });
        Self {
            proposal,
            proposal_type,
            payload,
            status,
        }
    }

    pub fn label(&self) -> &'static str {
        self.proposal_type.map_or("Unknown", |kind| kind.label())
    }

    /// USD value (WAD) of the proposal amount.
    pub fn usd_value(&self, decimals: u8, usd_price: U256) -> Result<U256> {
        Ok(to_usd(self.proposal.amount, decimals, usd_price)?)
    }
}

/// The account's pending proposals, in nonce order.
pub async fn read_proposals(
    reader: &dyn ChainReader,
    account: Address,
    now: u64,
    expiry: Duration,
) -> Result<Vec<ProposalView>> {
    let (pending, next_nonce) = futures::try_join!(
        reader.read_pending_proposals(account),
        reader.read_proposal_nonce(account),
    )?;
    let mut views: Vec<ProposalView> = pending
        .into_iter()
        .map(|p| ProposalView::new(p, next_nonce, now, expiry))
        .collect();
    views.sort_by_key(|v| v.proposal.nonce);
    Ok(views)
}

/// Maturity a rollover of `repay_maturity` borrows at.
///
/// Overdue positions roll into the next open maturity, others one
/// interval past their own.
pub fn borrow_maturity_for(repay_maturity: u64, now: u64) -> u64 {
    if repay_maturity < now {
        next_maturity(now)
    } else {
        repay_maturity + MATURITY_INTERVAL
    }
}

/// Cost of rolling a position into a later maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollDebtPreview {
    pub repay_maturity: u64,
    pub borrow_maturity: u64,
    /// Payoff of the position now
    pub preview_value: U256,
    /// `preview_value` padded by the rollover slippage
    pub max_repay_assets: U256,
    /// Owed at `borrow_maturity` after the roll
    pub new_assets: U256,
    /// Annual rate of the roll (WAD)
    pub rate: U256,
}

/// Previews rolling the account's position at `repay_maturity`.
///
/// `snapshot` must be read with the account.
pub async fn preview_roll_debt(
    reader: &dyn ChainReader,
    snapshot: &MarketSnapshot,
    repay_maturity: u64,
    now: u64,
) -> Result<RollDebtPreview> {
    let position = snapshot
        .position(repay_maturity)
        .ok_or(ApiError::NoPosition { maturity: repay_maturity })?;
    let borrow_maturity = borrow_maturity_for(repay_maturity, now);
    let preview_value = position.preview_value;
    let new_assets = reader
        .read_borrow_preview(snapshot.market, borrow_maturity, preview_value)
        .await?;
    Ok(RollDebtPreview {
        repay_maturity,
        borrow_maturity,
        preview_value,
        max_repay_assets: apply_slippage(preview_value, ROLL_DEBT_SLIPPAGE)?,
        new_assets,
        rate: rollover_rate(new_assets, preview_value, borrow_maturity, now)?,
    })
}

/// Proposal that executes `preview`.
pub fn roll_debt_call(account: Address, debt_market: Address, preview: &RollDebtPreview) -> PreparedCall {
    roll_debt_proposal(
        account,
        debt_market,
        preview.repay_maturity,
        preview.borrow_maturity,
        preview.max_repay_assets,
    )
}
