//! Lending market, rate model, auditor and previewer bindings.
//!
//! Borrow positions are tracked on-chain in a packed word: the lower 32 bits
//! hold the base maturity and bit `32 + i` flags a position at
//! `base + i * interval`. [`decode_maturities`] unpacks it.

use alloy::primitives::{Address, U256};
use alloy::sol;

use crate::prepared_call::PreparedCall;

sol! {
    #[sol(rpc)]
    interface IMarket {
        error MarketFrozen();
        error Disagreement();
        error InsufficientProtocolLiquidity();

        function asset() external view returns (address);
        function decimals() external view returns (uint8);
        function totalAssets() external view returns (uint256);
        function totalFloatingBorrowAssets() external view returns (uint256);
        function floatingAssets() external view returns (uint256);
        function floatingDebt() external view returns (uint256);
        function floatingBackupBorrowed() external view returns (uint256);
        function maxWithdraw(address owner) external view returns (uint256);
        function penaltyRate() external view returns (uint256);
        function backupFeeRate() external view returns (uint256);
        function maxFuturePools() external view returns (uint8);
        function interestRateModel() external view returns (address);
        function fixedPools(uint256 maturity)
            external
            view
            returns (uint256 borrowed, uint256 supplied, uint256 unassignedEarnings, uint256 lastAccrual);
        function fixedBorrowPositions(uint256 maturity, address account)
            external
            view
            returns (uint256 principal, uint256 fee);
        function accounts(address account)
            external
            view
            returns (uint256 fixedDeposits, uint256 fixedBorrows, uint256 floatingBorrowShares);
        function repayAtMaturity(uint256 maturity, uint256 positionAssets, uint256 maxAssets, address borrower)
            external
            returns (uint256 actualRepayAssets);
    }

    #[sol(rpc)]
    interface IInterestRateModel {
        function minRate() external view returns (uint256);
        function naturalRate() external view returns (uint256);
        function maxUtilization() external view returns (uint256);
        function naturalUtilization() external view returns (uint256);
        function spreadFactor() external view returns (uint256);
        function timePreference() external view returns (uint256);
        function maxRate() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IAuditor {
        function markets(address market)
            external
            view
            returns (uint128 adjustFactor, uint8 decimals, uint8 index, bool isListed, address priceFeed);
        function assetPrice(address priceFeed) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IPreviewer {
        struct FixedPreview {
            uint256 maturity;
            uint256 assets;
            uint256 utilization;
        }

        function previewBorrowAtMaturity(address market, uint256 maturity, uint256 assets)
            external
            view
            returns (FixedPreview memory);
    }
}

/// `market.repayAtMaturity(maturity, position_assets, max_assets, borrower)`.
pub fn repay_at_maturity(
    market: Address,
    maturity: u64,
    position_assets: U256,
    max_assets: U256,
    borrower: Address,
) -> PreparedCall {
    PreparedCall::from_call(
        market,
        &IMarket::repayAtMaturityCall {
            maturity: U256::from(maturity),
            positionAssets: position_assets,
            maxAssets: max_assets,
            borrower,
        },
    )
}

/// Maturities flagged in a packed `fixedBorrows` word, ascending.
pub fn decode_maturities(packed: U256, interval: u64) -> Vec<u64> {
    let base = packed.as_limbs()[0] & 0xFFFF_FFFF;
    let flags: U256 = packed >> 32;
    (0..224usize)
        .filter(|&i| flags.bit(i))
        .map(|i| base + i as u64 * interval)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 2_419_200;

    #[test]
    fn test_decode_maturities() {
        let base = 1000 * INTERVAL;
        // positions at base and base + 2 intervals
        let packed = U256::from(base) | (U256::from(0b101u64) << 32);
        assert_eq!(decode_maturities(packed, INTERVAL), vec![base, base + 2 * INTERVAL]);
    }

    #[test]
    fn test_decode_maturities_empty() {
        assert!(decode_maturities(U256::ZERO, INTERVAL).is_empty());
        assert!(decode_maturities(U256::from(1000 * INTERVAL), INTERVAL).is_empty());
    }
}
