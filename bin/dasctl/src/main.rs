//! Operator CLI for the DA committee client.
//!
//! This binary loads a DA configuration and can:
//! - Store a message with the committee and print the certificate
//! - Retrieve a blob by hash
//! - Report service health and expiration policy
//! - Print the committee keyset

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use das::store_signing::{signer_from_private_key, signing_key_from_hex, StoreSigningDas};
use das::{setup_data_availability, Aggregator, DataAvailabilityConfig};
use das_schema::{
    hash_to_hex, hex_to_hash, unix_now, DataAvailabilityReader, DataAvailabilityStatus,
    DataAvailabilityWriter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dasctl")]
#[command(about = "Store and retrieve rollup data with a DA committee")]
struct Cli {
    /// JSON configuration file
    #[arg(long, default_value = "das.json")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a message with the committee
    Store {
        /// Message as a string
        #[arg(long)]
        message: Option<String>,
        /// File containing the message
        #[arg(long)]
        message_file: Option<PathBuf>,
        /// Seconds from now the committee must retain the data
        #[arg(long, default_value_t = 14 * 24 * 60 * 60)]
        timeout_secs: u64,
        /// Hex secp256k1 key used to sign the store request
        #[arg(long, env = "DAS_SIGNING_KEY")]
        signing_key: Option<String>,
    },
    /// Retrieve a blob by its hex content hash
    Get {
        hash: String,
        /// Write the blob to a file instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check health of the configured services
    Health,
    /// Show the expiration policy of the retrieval path
    ExpirationPolicy,
    /// Print the committee keyset
    Keyset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = DataAvailabilityConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Store {
            message,
            message_file,
            timeout_secs,
            signing_key,
        } => {
            store(&config, message, message_file, timeout_secs, signing_key).await?;
        }
        Commands::Get { hash, out } => {
            get(&config, &hash, out).await?;
        }
        Commands::Health => {
            health(&config).await?;
        }
        Commands::ExpirationPolicy => {
            expiration_policy(&config).await?;
        }
        Commands::Keyset => {
            keyset(&config)?;
        }
    }

    Ok(())
}

async fn store(
    config: &DataAvailabilityConfig,
    message: Option<String>,
    message_file: Option<PathBuf>,
    timeout_secs: u64,
    signing_key: Option<String>,
) -> Result<()> {
    let message = if let Some(file) = message_file {
        std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?
    } else if let Some(message) = message {
        message.into_bytes()
    } else {
        anyhow::bail!("Must provide either --message or --message-file");
    };

    if !config.aggregator.enable {
        anyhow::bail!("aggregator is not enabled in the configuration");
    }
    let aggregator = Arc::new(Aggregator::from_config(config)?);
    let writer: Arc<dyn DataAvailabilityWriter> = match signing_key {
        Some(key) => {
            let signer = signer_from_private_key(signing_key_from_hex(&key)?);
            let signing = StoreSigningDas::new(aggregator, signer)?;
            info!("Signing stores as 0x{}", hex::encode(signing.signer_address()));
            Arc::new(signing)
        }
        None => aggregator,
    };

    let timeout = unix_now().saturating_add(timeout_secs);
    info!("Storing {} bytes until {}", message.len(), timeout);
    let cert = writer.store(&message, timeout, &[]).await?;

    println!("Certificate:");
    println!("  Data hash: {}", hash_to_hex(&cert.data_hash));
    println!("  Timeout: {}", cert.timeout);
    println!("  Signers mask: {:#x} ({} signers)", cert.signers_mask, cert.signer_count());
    println!("  Keyset hash: {}", hash_to_hex(&cert.keyset_hash));
    println!("  Version: {}", cert.version);
    println!("  Serialized: {}", hex::encode(cert.serialize()));

    Ok(())
}

async fn get(config: &DataAvailabilityConfig, hash: &str, out: Option<PathBuf>) -> Result<()> {
    let key = hex_to_hash(hash).context("hash must be 32 bytes of hex")?;
    let components = setup_data_availability(config, None)?;
    let data = components.reader.get_by_hash(&key).await?;

    println!("Hash: {}", hash_to_hex(&key));
    println!("Length: {}", data.len());
    match out {
        Some(path) => {
            std::fs::write(&path, &data)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Written to: {}", path.display());
        }
        None => {
            println!("Data: {}", String::from_utf8_lossy(&data));
            println!("Data (hex): {}", hex::encode(&data));
        }
    }

    Ok(())
}

async fn health(config: &DataAvailabilityConfig) -> Result<()> {
    let mut healthy = true;

    if config.rest_aggregator.enable {
        let components = setup_data_availability(config, None)?;
        match components.reader.health_check().await {
            Ok(()) => println!("Retrieval: healthy"),
            Err(e) => {
                healthy = false;
                println!("Retrieval: unhealthy ({})", e);
            }
        }
    }

    if config.aggregator.enable {
        let aggregator = Aggregator::from_config(config)?;
        println!("Committee:");
        for (label, result) in aggregator.backend_health().await {
            match result {
                Ok(()) => println!("  {}: healthy", label),
                Err(e) => {
                    healthy = false;
                    println!("  {}: unhealthy ({})", label, e);
                }
            }
        }
    }

    if !healthy {
        anyhow::bail!("some DA services are unhealthy");
    }
    Ok(())
}

async fn expiration_policy(config: &DataAvailabilityConfig) -> Result<()> {
    let components = setup_data_availability(config, None)?;
    let policy = components.reader.expiration_policy().await?;
    println!("Expiration policy: {}", policy);
    Ok(())
}

fn keyset(config: &DataAvailabilityConfig) -> Result<()> {
    let aggregator = Aggregator::from_config(config)?;

    println!("Keyset:");
    println!("  Hash: {}", hash_to_hex(aggregator.keyset_hash()));
    println!("  Assumed honest: {}", aggregator.assumed_honest());
    println!("  Members:");
    for details in aggregator.services() {
        println!(
            "    {} {}: mask {:#x}",
            details.signer_index(),
            details.metric_label,
            details.signers_mask
        );
    }
    println!("  Serialized: {}", hex::encode(aggregator.keyset_bytes()));

    Ok(())
}
