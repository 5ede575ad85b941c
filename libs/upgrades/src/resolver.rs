use std::{future::Future, path::PathBuf};

use ethers::types::Address;
use eyre::{bail, Context};
use tracing::{debug, info, warn};

use crate::{
    manifest::{DeploymentRecord, Manifest},
    provider::ChainRpc,
};

/// What to do when a cached address no longer carries live code.
///
/// `Redeploy` matches ephemeral development chains that get reset under the
/// cache. `Fail` is for persistent networks, where a dead cached address
/// means the manifest and the chain have diverged and a silent redeploy
/// would hide it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StaleCachePolicy {
    #[default]
    Redeploy,
    Fail,
}

/// Fetch-or-deploy resolution over the per-chain manifest.
pub struct Resolver {
    manifest_dir: PathBuf,
    policy: StaleCachePolicy,
}

impl Resolver {
    pub fn new(manifest_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            policy: StaleCachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StaleCachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the live address for `version`, deploying only when the
    /// manifest has no usable entry.
    ///
    /// A cached address is validated against live chain state: it must
    /// still carry code. A validated hit performs no chain-mutating calls.
    /// A miss, or a stale entry under `StaleCachePolicy::Redeploy`, runs
    /// `deploy` exactly once and commits the new record to the manifest
    /// before returning.
    pub async fn fetch_or_deploy<R, F, Fut>(
        &self,
        version: &str,
        rpc: &R,
        deploy: F,
    ) -> eyre::Result<Address>
    where
        R: ChainRpc + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = eyre::Result<DeploymentRecord>>,
    {
        let chain_id = rpc.chain_id().await?;
        let manifest = Manifest::for_chain(&self.manifest_dir, &chain_id);

        if let Some(fetched) = manifest.get(version).await? {
            let code = rpc.code_at(fetched.address).await?;
            if !code.is_empty() {
                debug!(chain = %chain_id, version, address = ?fetched.address, "deployment cache hit");
                return Ok(fetched.address);
            }
            if self.policy == StaleCachePolicy::Fail {
                bail!(
                    "Cached deployment {:?} for version {} has no code on chain {}; \
                     refusing to redeploy under StaleCachePolicy::Fail",
                    fetched.address,
                    version,
                    chain_id
                );
            }
            warn!(chain = %chain_id, version, address = ?fetched.address, "cached deployment has no code, redeploying");
        }

        let deployed = deploy().await.context("Deploy callback failed")?;
        manifest.put(version, deployed.clone()).await?;
        info!(chain = %chain_id, version, address = ?deployed.address, "deployment recorded");
        Ok(deployed.address)
    }
}
