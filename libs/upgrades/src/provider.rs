use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, H256},
};
use eyre::Context;

/// Narrow view of the chain RPC surface the deployment cache and the
/// topology detector need. Transaction submission goes through contract
/// bindings instead.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Decimal chain id. Fetched once per operation, never cached here.
    async fn chain_id(&self) -> eyre::Result<String>;

    /// Runtime code at `address`; empty bytes means no contract is live there.
    async fn code_at(&self, address: Address) -> eyre::Result<Bytes>;

    /// Raw 32-byte word stored at `slot` of `address`.
    async fn storage_at(&self, address: Address, slot: H256) -> eyre::Result<H256>;
}

/// Adapter giving any ethers middleware the `ChainRpc` surface.
pub struct MiddlewareRpc<M>(Arc<M>);

impl<M> MiddlewareRpc<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl<M> ChainRpc for MiddlewareRpc<M>
where
    M: Middleware + 'static,
{
    async fn chain_id(&self) -> eyre::Result<String> {
        let id = self
            .0
            .get_chainid()
            .await
            .context("Failed to fetch the chain id from the Ethereum client")?;
        Ok(id.to_string())
    }

    async fn code_at(&self, address: Address) -> eyre::Result<Bytes> {
        self.0
            .get_code(address, None)
            .await
            .with_context(|| format!("Failed to fetch code at {address:?}"))
    }

    async fn storage_at(&self, address: Address, slot: H256) -> eyre::Result<H256> {
        self.0
            .get_storage_at(address, slot, None)
            .await
            .with_context(|| format!("Failed to read storage slot {slot:?} at {address:?}"))
    }
}
