//! Signer backed by the custody service

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{RemoteSigner, SignerError, SignerResult};
use crate::custody::CustodyClient;

/// Routes signing requests to the sub-organization holding the wallet
#[derive(Debug, Clone)]
pub struct CustodySigner {
    client: Arc<CustodyClient>,
    organization_id: String,
}

impl CustodySigner {
    pub fn new(client: Arc<CustodyClient>, organization_id: impl Into<String>) -> Self {
        Self {
            client,
            organization_id: organization_id.into(),
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

#[async_trait]
impl RemoteSigner for CustodySigner {
    async fn sign_message(&self, account: &Pubkey, message: &[u8]) -> SignerResult<Signature> {
        debug!(
            account = %account,
            organization_id = %self.organization_id,
            message_len = message.len(),
            "Requesting custody signature"
        );

        let bytes = self
            .client
            .sign_raw_payload(&self.organization_id, &account.to_string(), message)
            .await
            .map_err(|e| {
                warn!(account = %account, error = %e, "Custody signing failed");
                SignerError::from(e)
            })?;

        let signature = Signature::from(bytes);
        if !signature.verify(account.as_ref(), message) {
            return Err(SignerError::MalformedSignature(format!(
                "custody returned a signature that does not verify for {}",
                account
            )));
        }
        Ok(signature)
    }
}
