//! Error types for the transaction submission pipeline
//!
//! Every pipeline stage either returns its result or fails with exactly one of
//! these variants. Lower-level errors (ledger, signer) are converted at the
//! stage boundary so callers only ever match on this taxonomy.

use crate::ledger::LedgerError;
use crate::signer::SignerError;
use thiserror::Error;

/// Result alias used throughout the pipeline
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for building, signing, broadcasting and confirming a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Malformed instruction parameters (unparseable address, wrong derived
    /// account, missing freshness). Detected before anything leaves the process.
    #[error("Construction error: {0}")]
    Construction(String),

    /// Amount cannot be represented in base units at the declared precision
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The remote signer refused to sign
    #[error("Signing denied: {0}")]
    SigningDenied(String),

    /// The remote signer could not be reached or did not answer in time
    #[error("Signer unavailable: {0}")]
    SigningUnavailable(String),

    /// The ledger refused the raw transaction outright
    ///
    /// Typical causes: malformed transaction, insufficient funds, duplicate
    /// submission, failed preflight simulation.
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Confirmation polling passed the blockhash height ceiling
    #[error("Transaction {signature} expired: block height {block_height} exceeded last valid height {last_valid_block_height}")]
    TransactionExpired {
        signature: String,
        block_height: u64,
        last_valid_block_height: u64,
    },

    /// The transaction was included but its execution failed
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },

    /// The ledger could not be reached
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl PipelineError {
    /// Whether a full pipeline rerun (new blockhash, new signature) can succeed
    ///
    /// Only expiry qualifies: every other failure would repeat on resubmission.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionExpired { .. })
    }

    /// Error category for metrics labels and log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::Construction(_) => "construction",
            Self::InvalidAmount(_) => "amount",
            Self::SigningDenied(_) => "signing_denied",
            Self::SigningUnavailable(_) => "signing_unavailable",
            Self::BroadcastRejected(_) => "broadcast_rejected",
            Self::TransactionExpired { .. } => "expired",
            Self::TransactionFailed { .. } => "failed",
            Self::LedgerUnavailable(_) => "ledger",
        }
    }

    pub fn construction(reason: impl Into<String>) -> Self {
        Self::Construction(reason.into())
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount(reason.into())
    }

    /// Map a ledger error raised while submitting raw bytes
    ///
    /// Transport problems mean the transaction may never have reached the
    /// ledger; a stale blockhash means it can only succeed after a rebuild.
    /// Everything else is a refusal of this exact payload.
    pub fn from_send_error(err: LedgerError, signature: &str) -> Self {
        match err {
            LedgerError::Transport { .. } | LedgerError::Timeout { .. } => {
                Self::LedgerUnavailable(err.to_string())
            }
            LedgerError::BlockhashNotFound => Self::TransactionExpired {
                signature: signature.to_string(),
                block_height: 0,
                last_valid_block_height: 0,
            },
            other => Self::BroadcastRejected(other.to_string()),
        }
    }
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        Self::LedgerUnavailable(err.to_string())
    }
}

impl From<SignerError> for PipelineError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Denied(reason) => Self::SigningDenied(reason),
            SignerError::UnknownAccount(account) => {
                Self::SigningDenied(format!("signer does not control {}", account))
            }
            SignerError::Unavailable(reason) => Self::SigningUnavailable(reason),
            SignerError::MalformedSignature(reason) => {
                Self::SigningUnavailable(format!("malformed signature: {}", reason))
            }
        }
    }
}
