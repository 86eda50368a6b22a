use super::errors::{PipelineError, PipelineResult};
use super::signing::SignedTransaction;
use crate::ledger::{Ledger, LedgerError};
use crate::metrics::{metrics, Timer};
use solana_sdk::{commitment_config::CommitmentConfig, hash::Hash, signature::Signature};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Unique id of a confirmed transaction (its first signature)
pub type TransactionHash = Signature;

/// What is needed to poll for one transaction before its blockhash expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationStrategy {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    pub signature: Signature,
}

impl ConfirmationStrategy {
    pub fn from_signed(signed: &SignedTransaction) -> Self {
        Self {
            blockhash: signed.blockhash(),
            last_valid_block_height: signed.last_valid_block_height(),
            signature: signed.signature(),
        }
    }
}

/// Confirmation polling parameters
#[derive(Debug, Clone, Copy)]
pub struct ConfirmOptions {
    pub commitment: CommitmentConfig,
    pub poll_interval: Duration,
    /// Consecutive failed polls tolerated before giving up
    pub max_poll_errors: u32,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::confirmed(),
            poll_interval: Duration::from_millis(500),
            max_poll_errors: 5,
        }
    }
}

/// Submit `signed` and wait until it reaches `options.commitment`
///
/// The returned hash depends only on the transaction's signature, never on
/// how many polls it took.
pub async fn broadcast_and_confirm(
    ledger: &dyn Ledger,
    signed: &SignedTransaction,
    options: &ConfirmOptions,
) -> PipelineResult<TransactionHash> {
    let strategy = ConfirmationStrategy::from_signed(signed);
    let wire = signed.serialize()?;

    let sent = ledger
        .send_raw_transaction(&wire)
        .await
        .map_err(|e| match PipelineError::from_send_error(e, &strategy.signature.to_string()) {
            PipelineError::TransactionExpired { signature, .. } => PipelineError::TransactionExpired {
                signature,
                block_height: 0,
                last_valid_block_height: strategy.last_valid_block_height,
            },
            other => other,
        })?;

    if sent != strategy.signature {
        return Err(PipelineError::BroadcastRejected(format!(
            "ledger acknowledged signature {} for transaction {}",
            sent, strategy.signature
        )));
    }

    debug!(
        signature = %strategy.signature,
        bytes = wire.len(),
        last_valid_block_height = strategy.last_valid_block_height,
        "Transaction broadcast"
    );

    confirm_with_strategy(ledger, &strategy, options).await
}

/// Poll until the signature satisfies the commitment or the height ceiling
/// is passed
///
/// Block height is read before the signature status on every round, so an
/// expiry is only reported when the status was still unconfirmed after the
/// ceiling had already been passed. Once the signature has landed at the
/// ledger's own commitment the ceiling no longer applies and polling
/// continues until `options.commitment` is reached.
///
/// Transient poll failures are tolerated up to `options.max_poll_errors` in a
/// row; any other ledger error ends polling at once.
pub async fn confirm_with_strategy(
    ledger: &dyn Ledger,
    strategy: &ConfirmationStrategy,
    options: &ConfirmOptions,
) -> PipelineResult<TransactionHash> {
    let timer = Timer::new();
    let mut consecutive_errors = 0u32;
    let mut polls = 0u64;
    let mut landed = false;

    loop {
        polls += 1;
        metrics().confirmation_polls.inc();

        match poll_once(ledger, strategy, options.commitment).await {
            Ok(PollOutcome::Confirmed) => {
                timer.observe_duration(&metrics().confirmation_latency);
                info!(
                    signature = %strategy.signature,
                    polls,
                    latency_ms = timer.elapsed_ms(),
                    "Transaction confirmed"
                );
                return Ok(strategy.signature);
            }
            Ok(PollOutcome::Failed(reason)) => {
                return Err(PipelineError::TransactionFailed {
                    signature: strategy.signature.to_string(),
                    reason,
                });
            }
            Ok(PollOutcome::Expired(block_height)) => {
                warn!(
                    signature = %strategy.signature,
                    block_height,
                    last_valid_block_height = strategy.last_valid_block_height,
                    polls,
                    "Blockhash expired before confirmation"
                );
                return Err(PipelineError::TransactionExpired {
                    signature: strategy.signature.to_string(),
                    block_height,
                    last_valid_block_height: strategy.last_valid_block_height,
                });
            }
            Ok(PollOutcome::Pending) => consecutive_errors = 0,
            Ok(PollOutcome::Landed) => {
                if !landed {
                    debug!(
                        signature = %strategy.signature,
                        polls,
                        commitment = ?options.commitment.commitment,
                        "Transaction landed, waiting for requested commitment"
                    );
                }
                landed = true;
                consecutive_errors = 0;
            }
            Err(err) if !err.is_transient() => {
                return Err(PipelineError::LedgerUnavailable(format!(
                    "confirmation poll failed: {}",
                    err
                )));
            }
            Err(err) => {
                consecutive_errors += 1;
                if consecutive_errors > options.max_poll_errors {
                    return Err(PipelineError::LedgerUnavailable(format!(
                        "{} consecutive confirmation polls failed, last: {}",
                        consecutive_errors, err
                    )));
                }
                warn!(
                    signature = %strategy.signature,
                    consecutive_errors,
                    error = %err,
                    "Confirmation poll failed"
                );
            }
        }

        sleep(options.poll_interval).await;
    }
}

enum PollOutcome {
    Confirmed,
    Pending,
    /// Included at the ledger's commitment but not yet at the requested one
    Landed,
    Failed(String),
    Expired(u64),
}

async fn poll_once(
    ledger: &dyn Ledger,
    strategy: &ConfirmationStrategy,
    commitment: CommitmentConfig,
) -> Result<PollOutcome, LedgerError> {
    let block_height = ledger.block_height().await?;
    let status = ledger.signature_status(&strategy.signature).await?;

    if let Some(status) = status {
        if let Some(err) = status.err {
            return Ok(PollOutcome::Failed(err));
        }
        if status.satisfies(commitment) {
            return Ok(PollOutcome::Confirmed);
        }
        if status.satisfies(ledger.commitment()) {
            return Ok(PollOutcome::Landed);
        }
    }

    if block_height > strategy.last_valid_block_height {
        return Ok(PollOutcome::Expired(block_height));
    }
    Ok(PollOutcome::Pending)
}
