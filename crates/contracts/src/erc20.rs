//! ERC20 interface definitions.

use alloy::primitives::{Address, U256};
use alloy::sol;

use crate::prepared_call::PreparedCall;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// `token.approve(spender, amount)` as a batch entry.
pub fn approve(token: Address, spender: Address, amount: U256) -> PreparedCall {
    PreparedCall::from_call(token, &IERC20::approveCall { spender, amount })
}
