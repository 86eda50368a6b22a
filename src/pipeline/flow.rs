//! Composed submission flows
//!
//! `build → attach_freshness → request_signature → broadcast_and_confirm`,
//! rerun from the build step when the blockhash expires.

use super::broadcast::{broadcast_and_confirm, ConfirmOptions, TransactionHash};
use super::errors::PipelineResult;
use super::freshness::attach_freshness;
use super::instructions::{
    build_token_account_creation, build_token_transfer, TokenProgram, TokenTransfer,
    UnsignedTransaction,
};
use super::retry::{submit_with_retry, RetryPolicy};
use super::signing::request_signature;
use crate::ledger::{Cluster, Ledger};
use crate::metrics::{metrics, Timer};
use crate::signer::RemoteSigner;
use crate::structured_logging::SubmissionLogger;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// Drives ledger-mutating operations through the pipeline
///
/// Holds only shared read-only handles; each call builds its own transaction
/// and confirmation strategy, so concurrent calls are independent.
#[derive(Clone)]
pub struct Submitter {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn RemoteSigner>,
    confirm: ConfirmOptions,
    retry: RetryPolicy,
    cluster: Cluster,
}

impl Submitter {
    pub fn new(ledger: Arc<dyn Ledger>, signer: Arc<dyn RemoteSigner>, cluster: Cluster) -> Self {
        let confirm = ConfirmOptions {
            commitment: ledger.commitment(),
            ..ConfirmOptions::default()
        };
        Self {
            ledger,
            signer,
            confirm,
            retry: RetryPolicy::default(),
            cluster,
        }
    }

    pub fn with_confirm_options(mut self, confirm: ConfirmOptions) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn confirm_options(&self) -> &ConfirmOptions {
        &self.confirm
    }

    /// Checked token transfer signed by `transfer.owner_authority`
    ///
    /// `payer` must be the owner authority: the signer can only sign for one
    /// account per transaction.
    pub async fn transfer_tokens(
        &self,
        transfer: &TokenTransfer,
        program: TokenProgram,
        payer: &Pubkey,
    ) -> PipelineResult<TransactionHash> {
        self.submit("transfer_tokens", payer, &transfer.owner_authority, || {
            build_token_transfer(transfer, program)
        })
        .await
    }

    /// Create `owner`'s associated token account for `mint`, paid and signed
    /// by `payer`
    pub async fn create_token_account(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
        program: TokenProgram,
    ) -> PipelineResult<TransactionHash> {
        let token_account = program.associated_token_address(owner, mint);
        self.submit("create_token_account", payer, payer, || {
            build_token_account_creation(payer, &token_account, owner, mint, program)
        })
        .await
    }

    async fn submit<B>(
        &self,
        operation: &'static str,
        payer: &Pubkey,
        signing_account: &Pubkey,
        build: B,
    ) -> PipelineResult<TransactionHash>
    where
        B: Fn() -> PipelineResult<UnsignedTransaction>,
    {
        let logger = SubmissionLogger::new(operation);
        let logger = &logger;
        let build = &build;
        let max_attempts = self.retry.max_attempts.max(1);

        submit_with_retry(operation, &self.retry, move |attempt| async move {
            logger.log_attempt(attempt, max_attempts);
            metrics().submissions_total.inc();

            let outcome = self.run_once(logger, payer, signing_account, build).await;
            match &outcome {
                Ok(_) => metrics().submissions_confirmed.inc(),
                Err(err) => {
                    metrics().record_failure(err.category());
                    logger.log_failure(err.category(), &err.to_string(), attempt);
                }
            }
            outcome
        })
        .await
    }

    async fn run_once<B>(
        &self,
        logger: &SubmissionLogger,
        payer: &Pubkey,
        signing_account: &Pubkey,
        build: &B,
    ) -> PipelineResult<TransactionHash>
    where
        B: Fn() -> PipelineResult<UnsignedTransaction>,
    {
        let tx = build()?;
        let tx = attach_freshness(self.ledger.as_ref(), tx, payer).await?;
        if let (Some(blockhash), Some(height)) = (tx.recent_blockhash(), tx.last_valid_block_height())
        {
            logger.log_freshness(&blockhash.to_string(), height);
        }

        let signing = Timer::new();
        let signed = request_signature(self.signer.as_ref(), &tx, signing_account).await?;
        logger.log_signed(&signed.signature().to_string(), signing.elapsed_ms());

        let confirming = Timer::new();
        let hash = broadcast_and_confirm(self.ledger.as_ref(), &signed, &self.confirm).await?;
        let signature = hash.to_string();
        logger.log_confirmed(
            &signature,
            &self.cluster.tx_url(&signature),
            confirming.elapsed_ms(),
        );
        Ok(hash)
    }
}
