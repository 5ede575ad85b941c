use std::{path::PathBuf, time::Duration};

use clap::Parser;
use common_ethers::tx_sender::TxClient;
use ethers::types::{Address, U256};
use eyre::eyre;
use tracing::info;
use upgrades::{CallSpec, ImplArtifact, Resolver, StaleCachePolicy, UpgradeOptions, Upgrader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    rpc_url: Option<String>,

    #[arg(short, long)]
    private_key: String,

    /// Directory holding the per-chain deployment manifests.
    #[arg(long, default_value = ".deployments")]
    manifest_dir: PathBuf,

    /// Address of the proxy to upgrade.
    #[arg(long)]
    proxy: String,

    /// Path to the compiled implementation artifact (abi + bytecode JSON).
    #[arg(long)]
    artifact: PathBuf,

    /// Initializer to bundle into the upgrade transaction. Takes no
    /// arguments; use the library API for calls that need them.
    #[arg(long)]
    call: Option<String>,

    /// Treat a cached implementation address without live code as an error
    /// instead of redeploying.
    #[arg(long)]
    fail_on_stale_cache: bool,

    #[arg(long, default_value_t = 300)]
    confirm_timeout_secs: u64,

    #[arg(long)]
    gas: Option<u64>,

    #[arg(long)]
    gas_price: Option<u64>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let rpc_url = cli.rpc_url.unwrap_or("http://localhost:8547".to_owned());
    let get_private_key = || -> String { cli.private_key.clone() };

    let client = TxClient::try_new_from_url(&rpc_url, get_private_key).await?;
    let proxy = cli
        .proxy
        .parse::<Address>()
        .map_err(|e| eyre!("Invalid proxy address: {e}"))?;
    let artifact = ImplArtifact::from_file(&cli.artifact)?;

    let policy = if cli.fail_on_stale_cache {
        StaleCachePolicy::Fail
    } else {
        StaleCachePolicy::Redeploy
    };
    let resolver = Resolver::new(cli.manifest_dir).with_policy(policy);
    let upgrader = Upgrader::new(client.client(), resolver);

    let mut opts = UpgradeOptions {
        gas: cli.gas.map(U256::from),
        gas_price: cli.gas_price.map(U256::from),
        confirm_timeout: Duration::from_secs(cli.confirm_timeout_secs),
        ..Default::default()
    };
    if let Some(name) = cli.call.as_deref() {
        opts.call = CallSpec::from(name);
    }

    let upgraded = upgrader.upgrade_proxy(proxy, &artifact, opts).await?;
    info!(
        proxy = ?upgraded.proxy,
        implementation = ?upgraded.implementation,
        tx = ?upgraded.upgrade_tx.transaction_hash,
        "upgrade complete"
    );
    Ok(())
}
