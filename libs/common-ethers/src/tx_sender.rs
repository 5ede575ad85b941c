use std::sync::Arc;

use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::Address,
};
use eyre::Context;
use tracing::debug;

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Signing client over an HTTP provider. The wallet's chain id is bound to
/// whatever the endpoint reports at construction time.
pub struct TxClient {
    client: Arc<Client>,
}

impl TxClient {
    pub async fn try_new_from_url(
        rpc_url: &str,
        get_private_key: impl FnOnce() -> String,
    ) -> eyre::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .context("Failed to construct an HTTP provider from the RPC url")?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("Failed to fetch the chain id from the Ethereum client")?;
        debug!(%chain_id, rpc_url, "connected");
        let wallet = get_private_key()
            .parse::<LocalWallet>()
            .context("Failed to parse the private key")?
            .with_chain_id(chain_id.as_u64());
        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
        })
    }

    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    pub fn address(&self) -> Address {
        self.client.address()
    }
}
