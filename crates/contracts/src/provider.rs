//! Provider construction for chain clients.

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};

use crate::error::{ContractError, Result};

/// The provider type shared by readers and writers.
///
/// Type-erased so that signing and read-only providers have the same type.
pub type HttpProvider = DynProvider;

fn parse_url(rpc_url: &str) -> Result<url::Url> {
    rpc_url
        .parse()
        .map_err(|e| ContractError::RpcConnection(format!("{}", e)))
}

/// Connects a signing provider. Returns the provider and the signer address.
pub fn connect(rpc_url: &str, private_key: &str) -> Result<(HttpProvider, Address)> {
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|_| ContractError::InvalidPrivateKey)?;
    let signer_address = signer.address();
    let wallet = EthereumWallet::from(signer);
    let url = parse_url(rpc_url)?;

    let provider = ProviderBuilder::new().wallet(wallet).connect_http(url).erased();
    Ok((provider, signer_address))
}

/// Connects a provider without a wallet, for reads and simulations.
pub fn connect_read_only(rpc_url: &str) -> Result<HttpProvider> {
    let url = parse_url(rpc_url)?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}
