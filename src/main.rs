//! Custody Wallet CLI
//!
//! Balance queries, devnet airdrops, token account creation and token
//! transfers signed through the custody service, plus sub-organization
//! sign-up and e-mail recovery.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_wallet::config::Config;
use custody_wallet::custody::{Attestation, CreateSubOrgRequest, CustodyClient};
use custody_wallet::ledger::{Ledger, RpcLedger};
use custody_wallet::metrics::metrics;
use custody_wallet::pipeline::{parse_address, Submitter, TokenAmount, TokenTransfer};
use custody_wallet::signer::{CustodySigner, LocalSigner, RemoteSigner};
use custody_wallet::wallet;
use custody_wallet::Pubkey;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "CUSTODY_WALLET_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Native balance of a wallet, plus its token balance when a mint is configured
    Balance { address: String },

    /// Balance of a token account
    TokenBalance { token_account: String },

    /// Request a devnet/testnet airdrop and wait for it to confirm
    Airdrop {
        address: String,
        #[arg(long, default_value_t = wallet::DEFAULT_AIRDROP_LAMPORTS)]
        lamports: u64,
    },

    /// Create the associated token account of a wallet
    CreateTokenAccount {
        /// Fee payer and signer
        #[arg(long)]
        payer: String,
        /// Account owner; defaults to the payer
        #[arg(long)]
        owner: Option<String>,
        #[command(flatten)]
        signing: SigningArgs,
    },

    /// Transfer tokens between the associated token accounts of two wallets
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in whole tokens, e.g. 1.5
        #[arg(long)]
        amount: String,
        #[command(flatten)]
        signing: SigningArgs,
    },

    /// Create a sub-organization with a passkey user and a Solana wallet
    CreateSubOrg {
        #[arg(long)]
        email: String,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        sub_org_name: String,
        /// WebAuthn challenge used during passkey registration
        #[arg(long)]
        challenge: String,
        /// JSON file holding the passkey attestation
        #[arg(long)]
        attestation: String,
    },

    /// Start e-mail recovery for a sub-organization user
    InitRecovery {
        #[arg(long)]
        email: String,
        /// Public key the recovery credential is encrypted to
        #[arg(long)]
        target_public_key: String,
        #[arg(long)]
        sub_org_id: String,
    },
}

#[derive(clap::Args, Debug)]
struct SigningArgs {
    /// Token mint; defaults to `token.mint` from the config
    #[arg(long)]
    mint: Option<String>,

    /// Sub-organization holding the signing wallet; defaults to the parent organization
    #[arg(long)]
    organization: Option<String>,

    /// Sign with a local keypair file instead of the custody service
    #[arg(long)]
    keypair: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args.config)?;

    // Initialize logging
    init_logging(args.verbose, args.json_logs || config.monitoring.json_logs)?;
    info!(version = env!("CARGO_PKG_VERSION"), cluster = %config.ledger.cluster, "Starting custody wallet");

    let result = run(&args, &config).await;

    if args.metrics || config.monitoring.enable_metrics {
        eprintln!("{}", metrics().render()?);
    }
    result
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let ledger = Arc::new(RpcLedger::new(
        config.ledger.rpc_url(),
        config.ledger.commitment_config()?,
        config.ledger.timeout(),
    ));
    let cluster = config.ledger.cluster;

    match &args.command {
        Command::Balance { address } => {
            let owner = parse_address("address", address)?;
            let mint = config
                .token
                .mint
                .as_deref()
                .map(|m| parse_address("mint", m))
                .transpose()?;

            let sol = wallet::balance(ledger.as_ref(), &owner);
            match mint {
                Some(mint) => {
                    let token_account = config.token.program.associated_token_address(&owner, &mint);
                    let (sol, token) = futures::join!(
                        sol,
                        wallet::token_balance(ledger.as_ref(), &token_account)
                    );
                    println!("{} SOL", wallet::format_sol(sol?));
                    match token {
                        Ok(balance) => {
                            let amount = TokenAmount::from_base_units(balance.amount, balance.decimals)?;
                            println!("{} tokens ({})", amount, token_account);
                        }
                        Err(e) => warn!(token_account = %token_account, error = %e, "No token balance"),
                    }
                }
                None => println!("{} SOL", wallet::format_sol(sol.await?)),
            }
            println!("{}", cluster.address_url(&owner.to_string()));
        }

        Command::TokenBalance { token_account } => {
            let account = parse_address("token account", token_account)?;
            let balance = wallet::token_balance(ledger.as_ref(), &account).await?;
            let amount = TokenAmount::from_base_units(balance.amount, balance.decimals)?;
            println!("{}", amount);
        }

        Command::Airdrop { address, lamports } => {
            let account = parse_address("address", address)?;
            let hash = wallet::drop_tokens(
                ledger.as_ref(),
                cluster,
                &account,
                *lamports,
                &config.ledger.confirm_options()?,
            )
            .await?;
            println!("{}", hash);
            println!("{}", cluster.tx_url(&hash.to_string()));
        }

        Command::CreateTokenAccount {
            payer,
            owner,
            signing,
        } => {
            let payer = parse_address("payer", payer)?;
            let owner = match owner {
                Some(owner) => parse_address("owner", owner)?,
                None => payer,
            };
            let mint = resolve_mint(signing, config)?;
            let submitter = build_submitter(ledger, signing, config)?;

            let hash = submitter
                .create_token_account(&payer, &owner, &mint, config.token.program)
                .await?;
            println!("{}", config.token.program.associated_token_address(&owner, &mint));
            println!("{}", cluster.tx_url(&hash.to_string()));
        }

        Command::Transfer {
            from,
            to,
            amount,
            signing,
        } => {
            let sender = parse_address("sender", from)?;
            let recipient = parse_address("recipient", to)?;
            let mint = resolve_mint(signing, config)?;
            let amount = TokenAmount::parse(amount, config.token.decimals)?;
            let transfer = TokenTransfer::between_wallets(
                &sender,
                &recipient,
                &mint,
                amount,
                config.token.program,
            );
            let submitter = build_submitter(ledger, signing, config)?;

            let hash = submitter
                .transfer_tokens(&transfer, config.token.program, &sender)
                .await?;
            println!("{}", hash);
            println!("{}", cluster.tx_url(&hash.to_string()));
        }

        Command::CreateSubOrg {
            email,
            user_name,
            sub_org_name,
            challenge,
            attestation,
        } => {
            let client = custody_client(config)?;
            let attestation: Attestation = serde_json::from_str(
                &std::fs::read_to_string(attestation)
                    .with_context(|| format!("Failed to read attestation file: {}", attestation))?,
            )
            .context("Failed to parse attestation JSON")?;

            let created = client
                .create_sub_organization(&CreateSubOrgRequest {
                    email: email.clone(),
                    user_name: user_name.clone(),
                    sub_org_name: sub_org_name.clone(),
                    challenge: challenge.clone(),
                    attestation,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }

        Command::InitRecovery {
            email,
            target_public_key,
            sub_org_id,
        } => {
            let client = custody_client(config)?;
            let initiated = client
                .init_user_email_recovery(email, target_public_key, sub_org_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&initiated)?);
        }
    }

    Ok(())
}

fn resolve_mint(signing: &SigningArgs, config: &Config) -> Result<Pubkey> {
    match signing.mint.as_deref().or(config.token.mint.as_deref()) {
        Some(mint) => Ok(parse_address("mint", mint)?),
        None => bail!("No mint given: pass --mint or set token.mint"),
    }
}

fn custody_client(config: &Config) -> Result<CustodyClient> {
    if !config.custody.has_credentials() {
        bail!(
            "Custody credentials missing: set CUSTODY_ORGANIZATION_ID, CUSTODY_API_PUBLIC_KEY and CUSTODY_API_PRIVATE_KEY"
        );
    }
    CustodyClient::new(&config.custody).context("Failed to create custody client")
}

fn build_submitter(ledger: Arc<RpcLedger>, signing: &SigningArgs, config: &Config) -> Result<Submitter> {
    let signer: Arc<dyn RemoteSigner> = match &signing.keypair {
        Some(path) => {
            warn!(path = %path, "Signing with a local keypair");
            Arc::new(LocalSigner::from_file(path)?)
        }
        None => {
            let client = Arc::new(custody_client(config)?);
            let organization = signing
                .organization
                .clone()
                .unwrap_or_else(|| client.organization_id().to_string());
            Arc::new(CustodySigner::new(client, organization))
        }
    };

    let ledger: Arc<dyn Ledger> = ledger;
    Ok(Submitter::new(ledger, signer, config.ledger.cluster)
        .with_confirm_options(config.ledger.confirm_options()?)
        .with_retry_policy(config.retry.clone()))
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "custody_wallet=debug,info"
    } else {
        "custody_wallet=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    // Logs go to stderr so command output on stdout stays clean
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        Config::from_env().context("Failed to load config from environment")
    }
}
