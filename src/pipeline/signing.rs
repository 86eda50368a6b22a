use super::errors::{PipelineError, PipelineResult};
use super::instructions::UnsignedTransaction;
use crate::metrics::{metrics, Timer};
use crate::signer::RemoteSigner;
use solana_sdk::{
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use tracing::{debug, warn};

/// Compiled transaction carrying every required signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: Transaction,
    last_valid_block_height: u64,
}

impl SignedTransaction {
    /// First signature; doubles as the transaction id
    pub fn signature(&self) -> Signature {
        self.transaction.signatures[0]
    }

    pub fn blockhash(&self) -> Hash {
        self.transaction.message.recent_blockhash
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.last_valid_block_height
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Wire bytes as accepted by `sendTransaction`
    pub fn serialize(&self) -> PipelineResult<Vec<u8>> {
        bincode::serialize(&self.transaction)
            .map_err(|e| PipelineError::construction(format!("failed to serialize transaction: {}", e)))
    }
}

/// Ask `signer` to sign `tx` as `signing_account`
///
/// `signing_account` must be the only signer the compiled message requires;
/// freshness must already be attached. The returned signature is verified
/// against the message before it is accepted. May wait as long as the signer
/// needs, including for out-of-band user approval.
pub async fn request_signature(
    signer: &dyn RemoteSigner,
    tx: &UnsignedTransaction,
    signing_account: &Pubkey,
) -> PipelineResult<SignedTransaction> {
    let (blockhash, last_valid_block_height, fee_payer) = match (
        tx.recent_blockhash(),
        tx.last_valid_block_height(),
        tx.fee_payer(),
    ) {
        (Some(blockhash), Some(height), Some(payer)) => (blockhash, height, payer),
        _ => {
            return Err(PipelineError::construction(
                "freshness not attached: call attach_freshness before requesting a signature",
            ))
        }
    };

    let message = Message::new_with_blockhash(tx.instructions(), Some(&fee_payer), &blockhash);
    let required = message.header.num_required_signatures as usize;
    let position = message.account_keys[..required]
        .iter()
        .position(|key| key == signing_account)
        .ok_or_else(|| {
            PipelineError::construction(format!(
                "{} is not a required signer of this transaction",
                signing_account
            ))
        })?;
    if required != 1 {
        let others: Vec<String> = message.account_keys[..required]
            .iter()
            .filter(|key| *key != signing_account)
            .map(|key| key.to_string())
            .collect();
        return Err(PipelineError::construction(format!(
            "transaction also needs signatures from {}",
            others.join(", ")
        )));
    }

    let mut transaction = Transaction::new_unsigned(message);
    let message_bytes = transaction.message_data();

    metrics().signature_requests.inc();
    let timer = Timer::new();
    debug!(
        signing_account = %signing_account,
        blockhash = %blockhash,
        "Requesting signature"
    );

    let signature = signer
        .sign_message(signing_account, &message_bytes)
        .await
        .map_err(|e| {
            warn!(signing_account = %signing_account, error = %e, "Signature request failed");
            PipelineError::from(e)
        })?;
    timer.observe_duration(&metrics().signing_latency);

    if !signature.verify(signing_account.as_ref(), &message_bytes) {
        return Err(PipelineError::SigningUnavailable(format!(
            "signature from signer does not verify for {}",
            signing_account
        )));
    }

    transaction.signatures[position] = signature;
    debug!(
        signature = %signature,
        latency_ms = timer.elapsed_ms(),
        "Transaction signed"
    );

    Ok(SignedTransaction {
        transaction,
        last_valid_block_height,
    })
}
