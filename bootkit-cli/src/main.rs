#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Terminal stand-in for the demo UI: drives one session of the bootstrap &
//! recovery orchestrator and prints each stage's observable status.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bootkit_core::{
    random_replacement_signer, BundlerClient, KernelFactory, Network,
    PasskeyServerClient, Session, WeightedEcdsaValidator,
};

/// Shared demo guardian key. Not a secret; it guards nothing but testnet
/// demo accounts.
const DEMO_GUARDIAN_KEY: &str =
    "0xfb18b5165bf59aa5486d1e28eb2e6daa8e1da143a30a2f1c230d40802060fb60";

#[derive(Parser)]
#[command(name = "bootkit", about, version)]
struct Cli {
    /// Network the demo stack runs against.
    #[arg(long, global = true, default_value = "sepolia")]
    network: Network,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new passkey, bootstrap the account and optionally continue
    /// through mint and recovery.
    Register {
        /// Passkey label; empty generates "<app-name> - <timestamp>".
        #[arg(long, default_value = "")]
        label: String,
        /// Send a sponsored mint operation after bootstrap.
        #[arg(long)]
        mint: bool,
        /// Trigger guardian recovery after bootstrap.
        #[arg(long)]
        recover: bool,
        /// Replacement signer for recovery; random when omitted.
        #[arg(long)]
        replacement: Option<Address>,
    },
    /// Authenticate an existing passkey and bootstrap the account.
    Login {
        /// Passkey label; empty generates "<app-name> - <timestamp>".
        #[arg(long, default_value = "")]
        label: String,
        /// Send a sponsored mint operation after bootstrap.
        #[arg(long)]
        mint: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let session = build_session(cli.network)?;

    match cli.command {
        Command::Register {
            label,
            mint,
            recover,
            replacement,
        } => {
            let address = session.register(&label).await?;
            println!("Account address: {address}");
            println!("{}", session.status());

            if mint {
                send_mint(&session).await?;
            }
            if recover {
                let replacement = replacement
                    .unwrap_or_else(|| random_replacement_signer().address());
                info!(%replacement, "performing recovery");
                session.recover(replacement).await?;
                println!("{}", session.status());
            }
        }
        Command::Login { label, mint } => {
            let address = session.login(&label).await?;
            println!("Account address: {address}");
            println!("{}", session.status());

            if mint {
                send_mint(&session).await?;
            }
        }
    }

    Ok(())
}

fn build_session(network: Network) -> eyre::Result<Session> {
    let guardian = load_guardian_key()?;
    Ok(Session::new(
        network,
        Arc::new(PasskeyServerClient::new(network)),
        Arc::new(KernelFactory),
        Arc::new(BundlerClient::new(network)),
        WeightedEcdsaValidator::single(guardian),
    ))
}

async fn send_mint(session: &Session) -> eyre::Result<()> {
    println!("{}", session.status());
    let receipt = session.send_mint_operation().await?;
    info!(
        tx = %receipt.transaction_hash,
        block = receipt.block_number,
        "mint confirmed"
    );
    println!("{}", session.status());
    Ok(())
}

/// Guardian key: `BOOTKIT_GUARDIAN_KEY` env var, falling back to the demo
/// key.
fn load_guardian_key() -> eyre::Result<PrivateKeySigner> {
    let raw = std::env::var("BOOTKIT_GUARDIAN_KEY")
        .unwrap_or_else(|_| DEMO_GUARDIAN_KEY.to_string());
    PrivateKeySigner::from_str(&raw).wrap_err("invalid guardian private key")
}
