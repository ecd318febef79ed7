//! Chain reads.
//!
//! [`ChainReader`] is the read side of the chain as the settlement engine
//! sees it. Every failure surfaces as [`ApiError::SnapshotUnavailable`] with
//! its cause; nothing is defaulted.

use alloy::eips::BlockNumberOrTag;
use alloy::providers::Provider;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use exa_credit_contracts::account::{IExaAccount, IExaPreviewer, IProposalManager};
use exa_credit_contracts::erc20::IERC20;
use exa_credit_contracts::market::{decode_maturities, IAuditor, IInterestRateModel, IMarket, IPreviewer};
use exa_credit_contracts::HttpProvider;
use exa_credit_sim::irm::floating_utilization;
use exa_credit_sim::market::next_maturity;
use exa_credit_sim::{
    fixed_repay_assets, FixedPool, FixedPosition, MarketSnapshot, RateModelParameters, RepaySnapshot,
    MATURITY_INTERVAL,
};
use futures::future::try_join_all;
use tracing::debug;

use crate::config::SettlementConfig;
use crate::error::{ApiError, Result};

/// A queued proposal as reported by the account previewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProposal {
    pub nonce: U256,
    pub market: Address,
    pub amount: U256,
    /// Raw type byte; decoded by the proposal module
    pub proposal_type: u8,
    pub data: Bytes,
    pub timestamp: u64,
    pub unlock: u64,
}

/// Read access to markets, accounts and the proposal queue.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Market state, with `account`'s fixed positions when given.
    async fn read_market_snapshot(&self, market: Address, account: Option<Address>) -> Result<MarketSnapshot>;

    async fn read_pending_proposals(&self, account: Address) -> Result<Vec<PendingProposal>>;

    /// First installed plugin, the one that handles repayments.
    async fn read_installed_plugin(&self, account: Address) -> Result<Option<Address>>;

    async fn read_token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    /// Assets `account` can withdraw from `market`'s floating pool.
    async fn read_account_deposit(&self, market: Address, account: Address) -> Result<U256>;

    /// Seconds between proposing and executing.
    async fn read_proposal_delay(&self) -> Result<u64>;

    /// Next nonce the proposal manager will execute for `account`.
    async fn read_proposal_nonce(&self, account: Address) -> Result<U256>;

    /// Assets owed at `maturity` for borrowing `assets` now.
    async fn read_borrow_preview(&self, market: Address, maturity: u64, assets: U256) -> Result<U256>;
}

fn read_err<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> ApiError {
    move |e| ApiError::SnapshotUnavailable(format!("{}: {}", what, e))
}

/// Fills each position's payoff at `now` from its pool.
pub fn apply_preview_values(snapshot: &mut MarketSnapshot, now: u64) -> Result<()> {
    let mut positions = std::mem::take(&mut snapshot.fixed_borrow_positions);
    for position in &mut positions {
        position.preview_value = match RepaySnapshot::from_market(snapshot, position.maturity) {
            Some(repay) => fixed_repay_assets(&repay, position.position_assets(), now)?,
            None => position.position_assets(),
        };
    }
    snapshot.fixed_borrow_positions = positions;
    Ok(())
}

/// [`ChainReader`] over JSON-RPC.
#[derive(Clone)]
pub struct RpcChainReader {
    provider: HttpProvider,
    config: SettlementConfig,
}

impl RpcChainReader {
    pub fn new(provider: HttpProvider, config: SettlementConfig) -> Self {
        Self { provider, config }
    }

    /// Latest block timestamp.
    pub async fn chain_time(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(read_err("latest block"))?
            .ok_or_else(|| ApiError::SnapshotUnavailable("latest block not found".to_string()))?;
        Ok(block.header.timestamp)
    }

    async fn read_rate_model(&self, irm: Address) -> Result<RateModelParameters> {
        let irm = IInterestRateModel::new(irm, self.provider.clone());
        let (min_rate, natural_rate, max_utilization, natural_utilization, spread_factor, time_preference, max_rate) =
            futures::try_join!(
                async { irm.minRate().call().await.map_err(read_err("minRate")) },
                async { irm.naturalRate().call().await.map_err(read_err("naturalRate")) },
                async { irm.maxUtilization().call().await.map_err(read_err("maxUtilization")) },
                async { irm.naturalUtilization().call().await.map_err(read_err("naturalUtilization")) },
                async { irm.spreadFactor().call().await.map_err(read_err("spreadFactor")) },
                async { irm.timePreference().call().await.map_err(read_err("timePreference")) },
                async { irm.maxRate().call().await.map_err(read_err("maxRate")) },
            )?;
        Ok(RateModelParameters {
            min_rate,
            natural_rate,
            max_utilization,
            natural_utilization,
            spread_factor,
            time_preference,
            max_rate,
        })
    }

    async fn read_usd_price(&self, market: Address) -> Result<U256> {
        if self.config.auditor.is_zero() {
            return Ok(U256::ZERO);
        }
        let auditor = IAuditor::new(self.config.auditor, self.provider.clone());
        let listing = auditor.markets(market).call().await.map_err(read_err("auditor markets"))?;
        auditor
            .assetPrice(listing.priceFeed)
            .call()
            .await
            .map_err(read_err("assetPrice"))
    }

    async fn read_pool(&self, market: Address, maturity: u64) -> Result<FixedPool> {
        let pool = IMarket::new(market, self.provider.clone())
            .fixedPools(U256::from(maturity))
            .call()
            .await
            .map_err(read_err("fixedPools"))?;
        Ok(FixedPool {
            maturity,
            supplied: pool.supplied,
            borrowed: pool.borrowed,
            unassigned_earnings: pool.unassignedEarnings,
            last_accrual: pool.lastAccrual.saturating_to(),
        })
    }

    async fn read_positions(&self, market: Address, account: Address) -> Result<Vec<FixedPosition>> {
        let contract = IMarket::new(market, self.provider.clone());
        let packed = contract
            .accounts(account)
            .call()
            .await
            .map_err(read_err("accounts"))?
            .fixedBorrows;
        let maturities = decode_maturities(packed, MATURITY_INTERVAL);
        let positions = try_join_all(maturities.into_iter().map(|maturity| {
            let contract = contract.clone();
            async move {
                let position = contract
                    .fixedBorrowPositions(U256::from(maturity), account)
                    .call()
                    .await
                    .map_err(read_err("fixedBorrowPositions"))?;
                Ok::<_, ApiError>(FixedPosition {
                    maturity,
                    principal: position.principal,
                    fee: position.fee,
                    preview_value: U256::ZERO,
                })
            }
        }))
        .await?;
        Ok(positions.into_iter().filter(|p| !p.position_assets().is_zero()).collect())
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn read_market_snapshot(&self, market: Address, account: Option<Address>) -> Result<MarketSnapshot> {
        let contract = IMarket::new(market, self.provider.clone());
        let now = self.chain_time().await?;

        let (asset, decimals, deposits, borrows, floating_assets, floating_debt, backup_borrowed) = futures::try_join!(
            async { contract.asset().call().await.map_err(read_err("asset")) },
            async { contract.decimals().call().await.map_err(read_err("decimals")) },
            async { contract.totalAssets().call().await.map_err(read_err("totalAssets")) },
            async {
                contract
                    .totalFloatingBorrowAssets()
                    .call()
                    .await
                    .map_err(read_err("totalFloatingBorrowAssets"))
            },
            async { contract.floatingAssets().call().await.map_err(read_err("floatingAssets")) },
            async { contract.floatingDebt().call().await.map_err(read_err("floatingDebt")) },
            async {
                contract
                    .floatingBackupBorrowed()
                    .call()
                    .await
                    .map_err(read_err("floatingBackupBorrowed"))
            },
        )?;
        let (penalty_rate, backup_fee_rate, max_future_pools, irm) = futures::try_join!(
            async { contract.penaltyRate().call().await.map_err(read_err("penaltyRate")) },
            async { contract.backupFeeRate().call().await.map_err(read_err("backupFeeRate")) },
            async { contract.maxFuturePools().call().await.map_err(read_err("maxFuturePools")) },
            async { contract.interestRateModel().call().await.map_err(read_err("interestRateModel")) },
        )?;

        let rate_model_parameters = self.read_rate_model(irm).await?;
        let usd_price = self.read_usd_price(market).await?;
        let positions = match account {
            Some(account) => self.read_positions(market, account).await?,
            None => Vec::new(),
        };

        let first = next_maturity(now);
        let mut maturities: Vec<u64> = (0..u64::from(max_future_pools))
            .map(|i| first + i * MATURITY_INTERVAL)
            .collect();
        maturities.extend(positions.iter().map(|p| p.maturity).filter(|m| *m < first));
        maturities.sort_unstable();
        maturities.dedup();
        let fixed_pools = try_join_all(maturities.into_iter().map(|m| self.read_pool(market, m))).await?;

        debug!(%market, pools = fixed_pools.len(), positions = positions.len(), "read market snapshot");

        let mut snapshot = MarketSnapshot {
            market,
            asset,
            total_floating_deposit_assets: deposits,
            total_floating_borrow_assets: borrows,
            floating_backup_borrowed: backup_borrowed,
            floating_utilization: floating_utilization(floating_assets, floating_debt)?,
            decimals,
            usd_price,
            penalty_rate_per_second: penalty_rate,
            backup_fee_rate,
            max_future_pools: usize::from(max_future_pools),
            rate_model_parameters,
            fixed_pools,
            fixed_borrow_positions: positions,
            timestamp: now,
        };
        apply_preview_values(&mut snapshot, now)?;
        Ok(snapshot)
    }

    async fn read_pending_proposals(&self, account: Address) -> Result<Vec<PendingProposal>> {
        let previewer = IExaPreviewer::new(self.config.exa_previewer, self.provider.clone());
        let pending = previewer
            .pendingProposals(account)
            .call()
            .await
            .map_err(read_err("pendingProposals"))?;
        Ok(pending
            .into_iter()
            .map(|p| PendingProposal {
                nonce: p.nonce,
                market: p.proposal.market,
                amount: p.proposal.amount,
                proposal_type: p.proposal.proposalType,
                data: p.proposal.data,
                timestamp: p.proposal.timestamp.saturating_to(),
                unlock: p.unlock.saturating_to(),
            })
            .collect())
    }

    async fn read_installed_plugin(&self, account: Address) -> Result<Option<Address>> {
        let plugins = IExaAccount::new(account, self.provider.clone())
            .getInstalledPlugins()
            .call()
            .await
            .map_err(read_err("getInstalledPlugins"))?;
        Ok(plugins.first().copied())
    }

    async fn read_token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(read_err("balanceOf"))
    }

    async fn read_account_deposit(&self, market: Address, account: Address) -> Result<U256> {
        IMarket::new(market, self.provider.clone())
            .maxWithdraw(account)
            .call()
            .await
            .map_err(read_err("maxWithdraw"))
    }

    async fn read_proposal_delay(&self) -> Result<u64> {
        let delay = IProposalManager::new(self.config.proposal_manager, self.provider.clone())
            .delay()
            .call()
            .await
            .map_err(read_err("delay"))?;
        Ok(delay.saturating_to())
    }

    async fn read_proposal_nonce(&self, account: Address) -> Result<U256> {
        IProposalManager::new(self.config.proposal_manager, self.provider.clone())
            .nonces(account)
            .call()
            .await
            .map_err(read_err("nonces"))
    }

    async fn read_borrow_preview(&self, market: Address, maturity: u64, assets: U256) -> Result<U256> {
        let preview = IPreviewer::new(self.config.market_previewer, self.provider.clone())
            .previewBorrowAtMaturity(market, U256::from(maturity), assets)
            .call()
            .await
            .map_err(read_err("previewBorrowAtMaturity"))?;
        Ok(preview.assets)
    }
}
