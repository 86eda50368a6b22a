//! Ledger access
//!
//! The pipeline never talks to an RPC client directly. Every operation takes a
//! `&dyn Ledger` (or generic `L: Ledger`) so tests can run against an in-memory
//! ledger and callers decide how the connection is built and shared.

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
};

pub mod explorer;
pub mod ledger_errors;
pub mod rpc_ledger;

pub use explorer::Cluster;
pub use ledger_errors::{LedgerError, LedgerResult};
pub use rpc_ledger::RpcLedger;

/// Blockhash plus the last block height at which it is still accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// How far a transaction has progressed through the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    /// Whether this level meets the requested commitment
    pub fn satisfies(self, commitment: CommitmentLevel) -> bool {
        let required = match commitment {
            CommitmentLevel::Processed => ConfirmationLevel::Processed,
            CommitmentLevel::Confirmed => ConfirmationLevel::Confirmed,
            CommitmentLevel::Finalized => ConfirmationLevel::Finalized,
        };
        self >= required
    }
}

/// Status of a submitted signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation: ConfirmationLevel,
    /// Execution error, if the transaction was included but failed
    pub err: Option<String>,
}

impl SignatureStatus {
    pub fn satisfies(&self, commitment: CommitmentConfig) -> bool {
        self.confirmation.satisfies(commitment.commitment)
    }
}

/// SPL token account balance in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub amount: u64,
    pub decimals: u8,
}

/// Read/submit surface of the ledger used by the pipeline and wallet queries
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Commitment used for reads and confirmation
    fn commitment(&self) -> CommitmentConfig;

    async fn latest_blockhash(&self) -> LedgerResult<LatestBlockhash>;

    async fn block_height(&self) -> LedgerResult<u64>;

    /// Submit serialized transaction bytes and return the transaction signature
    async fn send_raw_transaction(&self, wire: &[u8]) -> LedgerResult<Signature>;

    /// `None` while the ledger has not seen the signature
    async fn signature_status(&self, signature: &Signature)
        -> LedgerResult<Option<SignatureStatus>>;

    /// Devnet/testnet faucet
    async fn request_airdrop(&self, account: &Pubkey, lamports: u64) -> LedgerResult<Signature>;

    /// Native balance in lamports
    async fn balance(&self, account: &Pubkey) -> LedgerResult<u64>;

    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<TokenBalance>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_level_ordering() {
        assert!(ConfirmationLevel::Finalized.satisfies(CommitmentLevel::Confirmed));
        assert!(ConfirmationLevel::Confirmed.satisfies(CommitmentLevel::Confirmed));
        assert!(ConfirmationLevel::Confirmed.satisfies(CommitmentLevel::Processed));
        assert!(!ConfirmationLevel::Processed.satisfies(CommitmentLevel::Confirmed));
        assert!(!ConfirmationLevel::Confirmed.satisfies(CommitmentLevel::Finalized));
    }

    #[test]
    fn test_status_satisfies_commitment_config() {
        let status = SignatureStatus {
            slot: 10,
            confirmation: ConfirmationLevel::Confirmed,
            err: None,
        };
        assert!(status.satisfies(CommitmentConfig::confirmed()));
        assert!(!status.satisfies(CommitmentConfig::finalized()));
    }
}
