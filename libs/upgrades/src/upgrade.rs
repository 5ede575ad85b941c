use std::{sync::Arc, time::Duration};

use common_ethers::contracts::{i_transparent_upgradeable_proxy, proxy_admin};
use ethers::{
    abi::{Abi, AbiEncode, Token},
    contract::ContractFactory,
    providers::Middleware,
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt,
        TransactionRequest, U256,
    },
};
use eyre::{bail, eyre, Context, OptionExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    admin::{self, UpgradeVariant},
    artifact::ImplArtifact,
    manifest::DeploymentRecord,
    provider::MiddlewareRpc,
    resolver::Resolver,
};

/// Optional call bundled into the upgrade transaction, normalized once at
/// the orchestrator boundary and never inspected downstream.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CallSpec {
    #[default]
    NoCall,
    Named { name: String, args: Vec<Token> },
}

impl CallSpec {
    pub fn named(name: impl Into<String>, args: Vec<Token>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }
}

impl From<&str> for CallSpec {
    /// A bare function name is a call with no arguments.
    fn from(name: &str) -> Self {
        Self::Named {
            name: name.to_owned(),
            args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UpgradeOptions {
    pub call: CallSpec,
    /// Gas overrides passed through unmodified to whichever entry point is
    /// invoked.
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    /// Bound on the confirmation wait. An unresponsive endpoint or a
    /// transaction that never confirms surfaces as an error instead of
    /// hanging the operation.
    pub confirm_timeout: Duration,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            call: CallSpec::NoCall,
            gas: None,
            gas_price: None,
            confirm_timeout: Duration::from_secs(300),
        }
    }
}

/// Proxy handle returned by a confirmed upgrade. The receipt is the upgrade
/// transaction's, not a deployment's; the proxy itself already existed.
#[derive(Clone, Debug)]
pub struct UpgradedProxy {
    pub proxy: Address,
    pub implementation: Address,
    pub upgrade_tx: TransactionReceipt,
}

/// Drives a proxy upgrade end to end: resolve the new implementation
/// through the deployment cache, detect the administration topology, build
/// the matching upgrade call, submit it, and wait for confirmation.
///
/// None of the steps retries; any RPC failure, revert, or timeout surfaces
/// to the caller. Re-running after a partial failure reuses the already
/// deployed implementation via the cache.
pub struct Upgrader<M> {
    client: Arc<M>,
    resolver: Resolver,
}

impl<M> Upgrader<M>
where
    M: Middleware + 'static,
{
    pub fn new(client: Arc<M>, resolver: Resolver) -> Self {
        Self { client, resolver }
    }

    pub async fn upgrade_proxy(
        &self,
        proxy: Address,
        artifact: &ImplArtifact,
        opts: UpgradeOptions,
    ) -> eyre::Result<UpgradedProxy> {
        let rpc = MiddlewareRpc::new(self.client.clone());

        let version = artifact.version_id()?;
        debug!(?proxy, version, "resolving new implementation");
        let implementation = self
            .resolver
            .fetch_or_deploy(&version, &rpc, || self.deploy_implementation(artifact))
            .await
            .context("Failed to resolve the new implementation")?;

        debug!(?proxy, "detecting administration topology");
        let variant = admin::detect(proxy, &rpc).await?;

        let call_data = encode_call(&artifact.abi, &opts.call)?;
        let (to, data) = build_upgrade_calldata(&variant, proxy, implementation, call_data);

        let mut tx = TransactionRequest::new().to(to).data(data);
        if let Some(gas) = opts.gas {
            tx = tx.gas(gas);
        }
        if let Some(gas_price) = opts.gas_price {
            tx = tx.gas_price(gas_price);
        }
        let tx: TypedTransaction = tx.into();

        info!(?proxy, ?implementation, ?variant, "submitting upgrade transaction");
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .context("Failed to submit the upgrade transaction")?;
        let tx_hash = *pending;

        let receipt = timeout(opts.confirm_timeout, pending)
            .await
            .map_err(|_| {
                eyre!(
                    "Upgrade transaction {tx_hash:?} not confirmed within {:?}",
                    opts.confirm_timeout
                )
            })?
            .context("Failed while waiting for the upgrade confirmation")?
            .ok_or_eyre("Upgrade transaction was dropped from the mempool")?;

        if receipt.status != Some(1u64.into()) {
            bail!("Upgrade transaction {tx_hash:?} reverted");
        }
        info!(?proxy, ?implementation, ?tx_hash, "upgrade confirmed");

        Ok(UpgradedProxy {
            proxy,
            implementation,
            upgrade_tx: receipt,
        })
    }

    /// Deploy callback for the resolver: publishes the implementation and
    /// reports where it landed.
    async fn deploy_implementation(
        &self,
        artifact: &ImplArtifact,
    ) -> eyre::Result<DeploymentRecord> {
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );
        let deployer = factory
            .deploy_tokens(Vec::new())
            .context("Failed to construct the implementation deployment transaction")?;
        let (contract, receipt) = deployer
            .send_with_receipt()
            .await
            .context("Failed to deploy the new implementation")?;
        info!(address = ?contract.address(), tx = ?receipt.transaction_hash, "implementation deployed");
        Ok(DeploymentRecord::new(contract.address()).with_tx_hash(receipt.transaction_hash))
    }
}

/// Encodes an optional bundled call against the new implementation's ABI.
fn encode_call(abi: &Abi, spec: &CallSpec) -> eyre::Result<Option<Bytes>> {
    match spec {
        CallSpec::NoCall => Ok(None),
        CallSpec::Named { name, args } => {
            let function = abi
                .function(name)
                .with_context(|| format!("Function {name} not found in the implementation ABI"))?;
            let data = function
                .encode_input(args)
                .with_context(|| format!("Failed to encode arguments for {name}"))?;
            Ok(Some(data.into()))
        }
    }
}

/// One transaction per topology. A bundled call always rides in the same
/// transaction as the new implementation address, so the upgrade and the
/// call cannot land separately.
fn build_upgrade_calldata(
    variant: &UpgradeVariant,
    proxy: Address,
    implementation: Address,
    call_data: Option<Bytes>,
) -> (Address, Bytes) {
    match (variant, call_data) {
        (UpgradeVariant::Direct, None) => (
            proxy,
            i_transparent_upgradeable_proxy::UpgradeToCall {
                new_implementation: implementation,
            }
            .encode()
            .into(),
        ),
        (UpgradeVariant::Direct, Some(data)) => (
            proxy,
            i_transparent_upgradeable_proxy::UpgradeToAndCallCall {
                new_implementation: implementation,
                data,
            }
            .encode()
            .into(),
        ),
        (UpgradeVariant::ViaAdmin(admin), None) => (
            *admin,
            proxy_admin::UpgradeCall {
                proxy,
                implementation,
            }
            .encode()
            .into(),
        ),
        (UpgradeVariant::ViaAdmin(admin), Some(data)) => (
            *admin,
            proxy_admin::UpgradeAndCallCall {
                proxy,
                implementation,
                data,
            }
            .encode()
            .into(),
        ),
    }
}
