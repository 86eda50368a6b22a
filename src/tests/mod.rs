//! Pipeline test suites run against the in-memory ledger and signer

mod confirmation_tests;

use crate::pipeline::{ConfirmOptions, RetryPolicy, TokenAmount, TokenProgram, TokenTransfer};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::time::Duration;

/// Confirmation options with a short poll interval
pub(crate) fn fast_confirm() -> ConfirmOptions {
    ConfirmOptions {
        commitment: CommitmentConfig::confirmed(),
        poll_interval: Duration::from_millis(10),
        max_poll_errors: 2,
    }
}

/// Deterministic retry policy without jitter
pub(crate) fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff_ms: 10,
        max_backoff_ms: 50,
        jitter_factor: 0.0,
    }
}

/// One whole token (10^9 base units) from `owner`'s ATA to a fresh wallet's ATA
pub(crate) fn one_token_transfer(owner: &Pubkey) -> TokenTransfer {
    let recipient = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    let amount = TokenAmount::from_whole(1, 9).unwrap();
    TokenTransfer::between_wallets(owner, &recipient, &mint, amount, TokenProgram::Token2022)
}
