//! `Ledger` over the Solana JSON-RPC client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::request::RpcRequest;
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{
    ConfirmationLevel, LatestBlockhash, Ledger, LedgerError, LedgerResult, SignatureStatus,
    TokenBalance,
};
use crate::metrics::Timer;

/// Ledger backed by a shared nonblocking `RpcClient`
///
/// Cloning is cheap; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

impl RpcLedger {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(url.into(), timeout, commitment);
        Self {
            client: Arc::new(client),
            commitment,
        }
    }

    /// Wrap an existing client; its commitment becomes the ledger commitment
    pub fn from_client(client: Arc<RpcClient>) -> Self {
        let commitment = client.commitment();
        Self { client, commitment }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

fn map_status(status: TransactionStatus) -> SignatureStatus {
    let confirmation = match status.confirmation_status {
        Some(TransactionConfirmationStatus::Processed) => ConfirmationLevel::Processed,
        Some(TransactionConfirmationStatus::Confirmed) => ConfirmationLevel::Confirmed,
        Some(TransactionConfirmationStatus::Finalized) => ConfirmationLevel::Finalized,
        // Older nodes omit the status; `confirmations: None` means rooted
        None => match status.confirmations {
            None => ConfirmationLevel::Finalized,
            Some(_) => ConfirmationLevel::Processed,
        },
    };

    SignatureStatus {
        slot: status.slot,
        confirmation,
        err: status.err.map(|e| e.to_string()),
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    async fn latest_blockhash(&self) -> LedgerResult<LatestBlockhash> {
        let timer = Timer::new();
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();

        debug!(%blockhash, last_valid_block_height, "Fetched latest blockhash");
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        let timer = Timer::new();
        let height = self
            .client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();
        Ok(height)
    }

    async fn send_raw_transaction(&self, wire: &[u8]) -> LedgerResult<Signature> {
        let timer = Timer::new();
        let params = json!([
            BASE64.encode(wire),
            {
                "encoding": "base64",
                "preflightCommitment": self.commitment.commitment,
            }
        ]);

        let signature: String = self
            .client
            .send(RpcRequest::SendTransaction, params)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();

        Signature::from_str(&signature).map_err(|e| {
            LedgerError::InvalidResponse(format!("bad signature '{}': {}", signature, e))
        })
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let timer = Timer::new();
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(map_status))
    }

    async fn request_airdrop(&self, account: &Pubkey, lamports: u64) -> LedgerResult<Signature> {
        self.client
            .request_airdrop(account, lamports)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))
    }

    async fn balance(&self, account: &Pubkey) -> LedgerResult<u64> {
        let timer = Timer::new();
        let response = self
            .client
            .get_balance_with_commitment(account, self.commitment)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();
        Ok(response.value)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<TokenBalance> {
        let timer = Timer::new();
        let response = self
            .client
            .get_token_account_balance_with_commitment(account, self.commitment)
            .await
            .map_err(|e| LedgerError::from_client_error(&e))?;
        timer.observe_rpc();

        let ui = response.value;
        let amount = ui.amount.parse::<u64>().map_err(|e| {
            LedgerError::InvalidResponse(format!("token amount '{}': {}", ui.amount, e))
        })?;
        Ok(TokenBalance {
            amount,
            decimals: ui.decimals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::transaction::TransactionError;

    fn status(
        confirmation_status: Option<TransactionConfirmationStatus>,
        confirmations: Option<usize>,
    ) -> TransactionStatus {
        TransactionStatus {
            slot: 42,
            confirmations,
            status: Ok(()),
            err: None,
            confirmation_status,
        }
    }

    #[test]
    fn test_map_explicit_confirmation_status() {
        let mapped = map_status(status(Some(TransactionConfirmationStatus::Confirmed), Some(3)));
        assert_eq!(mapped.confirmation, ConfirmationLevel::Confirmed);
        assert_eq!(mapped.slot, 42);
        assert!(mapped.err.is_none());
    }

    #[test]
    fn test_map_missing_status_falls_back_to_confirmations() {
        assert_eq!(
            map_status(status(None, None)).confirmation,
            ConfirmationLevel::Finalized
        );
        assert_eq!(
            map_status(status(None, Some(1))).confirmation,
            ConfirmationLevel::Processed
        );
    }

    #[test]
    fn test_map_execution_error() {
        let mut failed = status(Some(TransactionConfirmationStatus::Confirmed), Some(1));
        failed.err = Some(TransactionError::InsufficientFundsForFee);
        failed.status = Err(TransactionError::InsufficientFundsForFee);
        assert!(map_status(failed).err.is_some());
    }

    #[test]
    fn test_ledger_reports_configured_commitment() {
        let ledger = RpcLedger::new(
            "http://127.0.0.1:8899",
            CommitmentConfig::confirmed(),
            Duration::from_secs(5),
        );
        assert_eq!(ledger.commitment(), CommitmentConfig::confirmed());
        assert_eq!(ledger.url(), "http://127.0.0.1:8899");
    }
}
