//! Prepared call types for deferred transaction execution.
//!
//! A [`PreparedCall`] is a transaction that has been encoded but not yet
//! sent. Settlement builders return them so the same bytes can be simulated
//! with `eth_call` and later submitted unchanged.

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;

use crate::error::{ContractError, Result};

/// An encoded call: target, calldata and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl PreparedCall {
    /// Create a new prepared call from raw calldata.
    pub fn new(to: Address, data: Bytes, value: U256) -> Self {
        Self { to, data, value }
    }

    /// Encodes a typed call with zero value.
    pub fn from_call<C: SolCall>(to: Address, call: &C) -> Self {
        Self::new(to, call.abi_encode().into(), U256::ZERO)
    }

    /// Returns the 4-byte function selector, if the calldata has one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }

    /// Decodes the calldata as `C`, checking the selector.
    pub fn decode<C: SolCall>(&self) -> Result<C> {
        C::abi_decode(&self.data).map_err(|e| ContractError::CallFailed(format!("{}", e)))
    }

    /// Builds the transaction request sent by `from`.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(self.to)
            .input(self.data.clone().into())
            .value(self.value)
    }
}
