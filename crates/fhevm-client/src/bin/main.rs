//! fhevm-client binary: pre-flight checks against an fhEVM deployment
//!
//! Run with:
//! ```bash
//! cargo run -p fhevm-client -- validate --type uint8 --value 255
//! cargo run -p fhevm-client -- fetch-key --network sepolia --contract 0x...
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fhevm_client::{GatewayKeySource, KeyCache, RetryPolicy};
use fhevm_core::{format_address, ClientConfig, EncryptedType, Network, RawValue};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fhevm-client")]
#[command(about = "fhEVM client utilities")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a value against an encrypted type without any network access
    Validate {
        /// Encrypted type (bool, uint8 ... uint256, address, bytes)
        #[arg(long = "type")]
        ty: EncryptedType,

        /// Value as text
        #[arg(long)]
        value: String,
    },

    /// Fetch a contract's public key from the gateway
    FetchKey {
        /// Config file (overrides --network)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Network preset
        #[arg(long, default_value = "sepolia")]
        network: Network,

        /// Contract address
        #[arg(long)]
        contract: String,

        /// Gateway URL override
        #[arg(long)]
        gateway_url: Option<String>,
    },

    /// Print the endpoints a config resolves to
    ShowConfig {
        /// Config file
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fhevm_client=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Validate { ty, value } => {
            let raw = RawValue::parse_as(ty, &value);
            fhevm_core::validate(&raw, ty)?;
            println!("[OK] {} is a valid {}", value, ty);
        }
        Command::FetchKey {
            config,
            network,
            contract,
            gateway_url,
        } => {
            let mut config = match config {
                Some(path) => ClientConfig::load(&path)?,
                None => ClientConfig::new(network),
            };
            if let Some(url) = gateway_url {
                config = config.with_gateway_url(url);
            }
            config = config.with_contract(contract.clone());
            config.validate()?;

            let source = Arc::new(GatewayKeySource::from_config(&config)?);
            let cache = KeyCache::new(
                source,
                Duration::from_secs(config.key_ttl_secs),
                RetryPolicy::from(config.retry),
            );

            tracing::info!(
                contract = %format_address(&contract, 6),
                gateway = %config.gateway_url(),
                "Fetching public key"
            );
            let record = cache.get_key(&contract).await?;
            let valid_for = record.expires_at() - record.fetched_at();

            println!("[OK] Public key for {}", record.contract());
            println!("  bytes:     {}", record.key().len());
            println!("  valid for: {}s", valid_for.as_secs());
        }
        Command::ShowConfig { config } => {
            let config = ClientConfig::load(&config)?;
            println!("network:    {}", config.network);
            println!("chain id:   {}", config.chain_id());
            println!("rpc:        {}", config.rpc_url());
            println!("gateway:    {}", config.gateway_url());
            println!(
                "contract:   {}",
                config.contract_address.as_deref().unwrap_or("(not set)")
            );
            println!("key ttl:    {}s", config.key_ttl_secs);
            println!(
                "retry:      {} attempts, {}ms base delay",
                config.retry.max_attempts, config.retry.base_delay_ms
            );
        }
    }

    Ok(())
}
