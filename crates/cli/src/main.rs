//! GenomeGuard command line interface
//!
//! Encrypts VCF files locally, publishes the ciphertext, anchors it on the
//! ledger and hands it to the analysis backend.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use genomeguard_crypto::{sha256_hex, KEY_ALGORITHM};
use genomeguard_types::ContentId;
use genomeguard_upload::{AppConfig, Orchestrator, PipelineContext, UploadFile};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "genomeguard")]
#[command(about = "Client-side encrypted genomic uploads", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a VCF file for analysis
    Upload {
        /// Path to the .vcf file
        file: PathBuf,
        /// Encrypt, publish and attest before handing off
        #[arg(long)]
        blockchain: bool,
    },
    /// Fetch published ciphertext and decrypt it
    Decrypt {
        /// Content identifier
        cid: String,
        /// Write plaintext here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Local encryption key
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },
    /// Look up an analysis on the ledger
    Status {
        /// Analysis identifier
        id: u64,
    },
    /// Pin published content
    Pin {
        /// Content identifier
        cid: String,
    },
    /// SHA-256 fingerprint of a file
    Hash {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Show key metadata (never the key material)
    Show,
    /// Print a backup of the key
    Export,
    /// Replace the key with a backup
    Import {
        /// Backup produced by `key export`
        blob: String,
    },
    /// Delete the key; previously encrypted data becomes unreadable
    Delete,
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Connect and print the account
    Connect,
    /// Balance in APT
    Balance {
        /// Account address (defaults to the connected account)
        address: Option<String>,
    },
    /// Request devnet funds from the faucet
    Fund {
        /// Account address (defaults to the connected account)
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config)?;

    if let Commands::Hash { file } = &cli.command {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        println!("{}", sha256_hex(&bytes));
        return Ok(());
    }

    let ctx = PipelineContext::from_config(&config).context("failed to initialise pipeline")?;
    let orchestrator = Orchestrator::new(ctx);

    match cli.command {
        Commands::Upload { file, blockchain } => handle_upload(&orchestrator, file, blockchain).await,
        Commands::Decrypt { cid, output } => handle_decrypt(&orchestrator, cid, output).await,
        Commands::Key { action } => handle_key_commands(&orchestrator, action),
        Commands::Wallet { action } => handle_wallet_commands(&orchestrator, action).await,
        Commands::Status { id } => handle_status(&orchestrator, id).await,
        Commands::Pin { cid } => handle_pin(&orchestrator, cid).await,
        Commands::Hash { .. } => Ok(()),
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

async fn handle_upload(orchestrator: &Orchestrator, path: PathBuf, blockchain: bool) -> Result<()> {
    let file = UploadFile::from_path(&path).await?;

    if blockchain {
        let account = orchestrator.context().attestation.connect_wallet().await?;
        info!(address = %account.address, "Wallet ready for attestation");
    }

    let outcome = orchestrator.upload(file, blockchain).await?;

    let content = outcome.content_record.as_ref();
    let attestation = outcome.attestation_record.as_ref();
    let summary = json!({
        "analysis_id": outcome.analysis_id,
        "on_chain": outcome.on_chain,
        "mock": outcome.is_mock(),
        "content_id": content.map(|c| c.content_id.to_string()),
        "gateway_url": content.map(|c| c.gateway_url.clone()),
        "transaction_ref": attestation.map(|a| a.transaction_ref.clone()),
        "ledger_analysis_id": attestation.and_then(|a| a.analysis_id),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn handle_decrypt(
    orchestrator: &Orchestrator,
    cid: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let plaintext = orchestrator.retrieve(&ContentId::new(cid)).await?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, plaintext.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Decrypted to {}", path.display());
        }
        None => print!("{plaintext}"),
    }
    Ok(())
}

fn handle_key_commands(orchestrator: &Orchestrator, cmd: KeyCommands) -> Result<()> {
    let keys = &orchestrator.context().keys;

    match cmd {
        KeyCommands::Show => match keys.get_key()? {
            Some(key) => {
                let info = json!({
                    "key_id": key.key_id(),
                    "algorithm": KEY_ALGORITHM,
                    "created_at": key.created_at().to_rfc3339(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            None => println!("No key stored; one is generated on the first encrypted upload"),
        },
        KeyCommands::Export => {
            keys.get_or_create_key()?;
            println!("{}", keys.export_key()?);
        }
        KeyCommands::Import { blob } => {
            keys.import_key(blob.trim())?;
            println!("Key imported");
        }
        KeyCommands::Delete => {
            keys.delete_key()?;
            println!("Key deleted");
        }
    }

    Ok(())
}

async fn handle_wallet_commands(orchestrator: &Orchestrator, cmd: WalletCommands) -> Result<()> {
    let attestation = &orchestrator.context().attestation;

    let resolve_address = |address: Option<String>| async move {
        match address {
            Some(address) => Ok::<_, anyhow::Error>(address),
            None => Ok(attestation.connect_wallet().await?.address),
        }
    };

    match cmd {
        WalletCommands::Connect => {
            let account = attestation.connect_wallet().await?;
            let info = json!({
                "slot": attestation.connected_slot().to_string(),
                "address": account.address,
                "public_key": account.public_key,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        WalletCommands::Balance { address } => {
            let address = resolve_address(address).await?;
            let balance = attestation.get_balance(&address).await?;
            println!("{balance:.8} APT");
        }
        WalletCommands::Fund { address } => {
            let address = resolve_address(address).await?;
            attestation.fund_account(&address).await?;
            println!("Funded {address}");
        }
    }

    Ok(())
}

async fn handle_status(orchestrator: &Orchestrator, id: u64) -> Result<()> {
    let attestation = &orchestrator.context().attestation;
    if !attestation.config().is_contract_configured() {
        bail!("attestation contract is not configured (set ledger.contract_address)");
    }

    let status = attestation.get_status(id).await?;
    let result = attestation.get_encrypted_result(id).await?;
    let info = json!({
        "analysis_id": id,
        "status": status.as_str(),
        "encrypted_result": result.map(|cid| cid.to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn handle_pin(orchestrator: &Orchestrator, cid: String) -> Result<()> {
    let publisher = &orchestrator.context().publisher;
    let content_id = ContentId::new(cid);

    let outcome = publisher.pin(&content_id).await;
    if !outcome.pinned {
        bail!("pin failed: {}", outcome.message);
    }
    println!("{}", outcome.message);

    if let Some(metadata) = publisher.metadata(&content_id).await {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    }
    Ok(())
}
