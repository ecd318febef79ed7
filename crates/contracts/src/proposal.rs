//! Delayed-proposal codec.
//!
//! Account operations that move funds are first `propose`d with an encoded
//! payload and executed once the proposal manager's delay has elapsed. This
//! module encodes and decodes those payloads and computes the storage
//! overrides that let a proposal's execution be simulated before it exists
//! on-chain.
//!
//! # Storage layout
//!
//! | Slot | Content |
//! |------|---------|
//! | `keccak(account, 2)` | `allowlist[target]` (keyed by target, not account) |
//! | `keccak(account, 3)` | `nonces[account]` |
//! | `keccak(account, 4)` | `queueNonces[account]` |
//! | `keccak(nonce, keccak(account, 5))` | `proposals[account][nonce]` (5 words) |
//!
//! A proposal occupies `amount`, `market`, `timestamp`, `proposalType` and
//! `data` in consecutive slots; `data` follows Solidity's long `bytes`
//! layout (length word `2 * len + 1`, contents at `keccak(slot)`).

use std::fmt;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolValue;

use crate::account::IExaAccount;
use crate::error::{ContractError, Result};
use crate::prepared_call::PreparedCall;

sol! {
    struct BorrowAtMaturityData {
        uint256 maturity;
        uint256 maxAssets;
        address receiver;
    }

    struct CrossRepayData {
        uint256 maturity;
        uint256 positionAssets;
        uint256 maxRepay;
        bytes route;
    }

    struct RepayData {
        uint256 maturity;
        uint256 positionAssets;
    }

    struct RollDebtData {
        uint256 repayMaturity;
        uint256 borrowMaturity;
        uint256 maxRepayAssets;
        uint256 percentage;
    }

    struct SwapData {
        address assetOut;
        uint256 minAmountOut;
        bytes route;
    }
}

/// Kind of a delayed proposal, matching the on-chain enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProposalType {
    None = 0,
    BorrowAtMaturity = 1,
    CrossRepayAtMaturity = 2,
    Redeem = 3,
    RepayAtMaturity = 4,
    RollDebt = 5,
    Swap = 6,
    Withdraw = 7,
}

impl TryFrom<u8> for ProposalType {
    type Error = ContractError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::BorrowAtMaturity,
            2 => Self::CrossRepayAtMaturity,
            3 => Self::Redeem,
            4 => Self::RepayAtMaturity,
            5 => Self::RollDebt,
            6 => Self::Swap,
            7 => Self::Withdraw,
            other => return Err(ContractError::UnknownProposalType(other)),
        })
    }
}

impl ProposalType {
    /// Short human label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "Unknown",
            Self::BorrowAtMaturity => "Protocol borrow",
            Self::CrossRepayAtMaturity | Self::RepayAtMaturity => "Debt payment",
            Self::Redeem | Self::Withdraw => "Sending to",
            Self::RollDebt => "Debt rollover",
            Self::Swap => "Swapping",
        }
    }

    /// Whether this proposal settles fixed-rate debt.
    pub fn is_repayment(&self) -> bool {
        matches!(self, Self::RepayAtMaturity | Self::CrossRepayAtMaturity)
    }
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Decoded proposal payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalPayload {
    BorrowAtMaturity {
        maturity: u64,
        max_assets: U256,
        receiver: Address,
    },
    CrossRepayAtMaturity {
        maturity: u64,
        position_assets: U256,
        max_repay: U256,
        route: Bytes,
    },
    Redeem {
        receiver: Address,
    },
    RepayAtMaturity {
        maturity: u64,
        position_assets: U256,
    },
    RollDebt {
        repay_maturity: u64,
        borrow_maturity: u64,
        max_repay_assets: U256,
        percentage: U256,
    },
    Swap {
        asset_out: Address,
        min_amount_out: U256,
        route: Bytes,
    },
    Withdraw {
        receiver: Address,
    },
}

fn maturity_from(value: U256) -> u64 {
    value.saturating_to()
}

fn decode_error(kind: &'static str) -> impl FnOnce(alloy::sol_types::Error) -> ContractError {
    move |e| ContractError::ProposalDecode {
        kind,
        reason: e.to_string(),
    }
}

impl ProposalPayload {
    /// The on-chain type of this payload.
    pub fn proposal_type(&self) -> ProposalType {
        match self {
            Self::BorrowAtMaturity { .. } => ProposalType::BorrowAtMaturity,
            Self::CrossRepayAtMaturity { .. } => ProposalType::CrossRepayAtMaturity,
            Self::Redeem { .. } => ProposalType::Redeem,
            Self::RepayAtMaturity { .. } => ProposalType::RepayAtMaturity,
            Self::RollDebt { .. } => ProposalType::RollDebt,
            Self::Swap { .. } => ProposalType::Swap,
            Self::Withdraw { .. } => ProposalType::Withdraw,
        }
    }

    /// ABI-encodes the payload as the `data` argument of `propose`.
    pub fn encode(&self) -> Bytes {
        let encoded = match self {
            Self::BorrowAtMaturity {
                maturity,
                max_assets,
                receiver,
            } => BorrowAtMaturityData {
                maturity: U256::from(*maturity),
                maxAssets: *max_assets,
                receiver: *receiver,
            }
            .abi_encode(),
            Self::CrossRepayAtMaturity {
                maturity,
                position_assets,
                max_repay,
                route,
            } => CrossRepayData {
                maturity: U256::from(*maturity),
                positionAssets: *position_assets,
                maxRepay: *max_repay,
                route: route.clone(),
            }
            .abi_encode(),
            Self::RepayAtMaturity {
                maturity,
                position_assets,
            } => RepayData {
                maturity: U256::from(*maturity),
                positionAssets: *position_assets,
            }
            .abi_encode(),
            Self::RollDebt {
                repay_maturity,
                borrow_maturity,
                max_repay_assets,
                percentage,
            } => RollDebtData {
                repayMaturity: U256::from(*repay_maturity),
                borrowMaturity: U256::from(*borrow_maturity),
                maxRepayAssets: *max_repay_assets,
                percentage: *percentage,
            }
            .abi_encode(),
            Self::Swap {
                asset_out,
                min_amount_out,
                route,
            } => SwapData {
                assetOut: *asset_out,
                minAmountOut: *min_amount_out,
                route: route.clone(),
            }
            .abi_encode(),
            Self::Redeem { receiver } | Self::Withdraw { receiver } => receiver.abi_encode(),
        };
        encoded.into()
    }

    /// Decodes `data` according to `proposal_type`.
    pub fn decode(proposal_type: ProposalType, data: &[u8]) -> Result<Self> {
        Ok(match proposal_type {
            ProposalType::None => return Err(ContractError::UnknownProposalType(0)),
            ProposalType::BorrowAtMaturity => {
                let d = BorrowAtMaturityData::abi_decode(data).map_err(decode_error("BorrowAtMaturity"))?;
                Self::BorrowAtMaturity {
                    maturity: maturity_from(d.maturity),
                    max_assets: d.maxAssets,
                    receiver: d.receiver,
                }
            }
            ProposalType::CrossRepayAtMaturity => {
                let d = CrossRepayData::abi_decode(data).map_err(decode_error("CrossRepayAtMaturity"))?;
                Self::CrossRepayAtMaturity {
                    maturity: maturity_from(d.maturity),
                    position_assets: d.positionAssets,
                    max_repay: d.maxRepay,
                    route: d.route,
                }
            }
            ProposalType::RepayAtMaturity => {
                let d = RepayData::abi_decode(data).map_err(decode_error("RepayAtMaturity"))?;
                Self::RepayAtMaturity {
                    maturity: maturity_from(d.maturity),
                    position_assets: d.positionAssets,
                }
            }
            ProposalType::RollDebt => {
                let d = RollDebtData::abi_decode(data).map_err(decode_error("RollDebt"))?;
                Self::RollDebt {
                    repay_maturity: maturity_from(d.repayMaturity),
                    borrow_maturity: maturity_from(d.borrowMaturity),
                    max_repay_assets: d.maxRepayAssets,
                    percentage: d.percentage,
                }
            }
            ProposalType::Swap => {
                let d = SwapData::abi_decode(data).map_err(decode_error("Swap"))?;
                Self::Swap {
                    asset_out: d.assetOut,
                    min_amount_out: d.minAmountOut,
                    route: d.route,
                }
            }
            ProposalType::Redeem => Self::Redeem {
                receiver: Address::abi_decode(data).map_err(decode_error("Redeem"))?,
            },
            ProposalType::Withdraw => Self::Withdraw {
                receiver: Address::abi_decode(data).map_err(decode_error("Withdraw"))?,
            },
        })
    }

    /// Maturity this payload settles or rolls, if any.
    pub fn maturity(&self) -> Option<u64> {
        match self {
            Self::BorrowAtMaturity { maturity, .. }
            | Self::CrossRepayAtMaturity { maturity, .. }
            | Self::RepayAtMaturity { maturity, .. } => Some(*maturity),
            Self::RollDebt { repay_maturity, .. } => Some(*repay_maturity),
            _ => None,
        }
    }
}

/// `account.propose(market, amount, type, payload)`.
pub fn propose(account: Address, market: Address, amount: U256, payload: &ProposalPayload) -> PreparedCall {
    PreparedCall::from_call(
        account,
        &IExaAccount::proposeCall {
            market,
            amount,
            proposalType: payload.proposal_type() as u8,
            data: payload.encode(),
        },
    )
}

/// `account.executeProposal(nonce)`.
pub fn execute_proposal(account: Address, nonce: U256) -> PreparedCall {
    PreparedCall::from_call(account, &IExaAccount::executeProposalCall { nonce })
}

const ALLOWLIST_SLOT: u64 = 2;
const NONCES_SLOT: u64 = 3;
const QUEUE_NONCES_SLOT: u64 = 4;
const PROPOSALS_SLOT: u64 = 5;

fn mapping_slot(key: Address, slot: u64) -> B256 {
    keccak256((key, U256::from(slot)).abi_encode())
}

fn word(value: U256) -> B256 {
    B256::from(value)
}

/// A proposal to be queued in simulation.
#[derive(Debug, Clone)]
pub struct QueuedProposal<'a> {
    pub account: Address,
    pub nonce: U256,
    pub market: Address,
    pub amount: U256,
    pub payload: &'a ProposalPayload,
}

/// Proposal manager storage writes that make `proposal` the next executable
/// one, grant `plugin` the proposer role and allowlist `targets`.
pub fn proposal_storage_overrides(
    proposal: &QueuedProposal<'_>,
    plugin: Address,
    targets: &[Address],
) -> Vec<(B256, B256)> {
    let account = proposal.account;
    let base = U256::from_be_bytes(
        keccak256((proposal.nonce, mapping_slot(account, PROPOSALS_SLOT)).abi_encode()).0,
    );
    let slot_at = |offset: u64| word(base + U256::from(offset));
    let data = proposal.payload.encode();

    let mut writes = vec![
        (mapping_slot(account, NONCES_SLOT), word(proposal.nonce)),
        (mapping_slot(account, QUEUE_NONCES_SLOT), word(proposal.nonce + U256::from(1))),
        (slot_at(0), word(proposal.amount)),
        (slot_at(1), proposal.market.into_word()),
        (slot_at(3), word(U256::from(proposal.payload.proposal_type() as u8))),
        (slot_at(4), word(U256::from(2 * data.len() + 1))),
    ];

    let data_base = U256::from_be_bytes(keccak256(U256::from_be_bytes(slot_at(4).0).abi_encode()).0);
    for (i, chunk) in data.chunks(32).enumerate() {
        writes.push((word(data_base + U256::from(i)), B256::right_padding_from(chunk)));
    }

    let proposer_role = keccak256((keccak256("PROPOSER_ROLE"), U256::ZERO).abi_encode());
    writes.push((keccak256((plugin, proposer_role).abi_encode()), word(U256::from(1))));

    for target in targets {
        writes.push((mapping_slot(*target, ALLOWLIST_SLOT), word(U256::from(1))));
    }
    writes
}
