//! Local keypair signer for devnet experiments and tests

use super::{RemoteSigner, SignerError, SignerResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

/// Signs with an in-process keypair
pub struct LocalSigner {
    keypair: Keypair,
}

impl LocalSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a keypair file: JSON byte array as written by `solana-keygen`,
    /// raw 64 bytes, or a base58 secret key string as exported by wallets
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else if keypair_bytes.trim_ascii_start().starts_with(b"[") {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
                .context("Failed to parse keypair JSON")?
        } else {
            let text = std::str::from_utf8(&keypair_bytes).context("Keypair file is not UTF-8")?;
            bs58::decode(text.trim())
                .into_vec()
                .context("Failed to decode base58 keypair")?
        };

        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes).context("Invalid keypair bytes")?;
        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl RemoteSigner for LocalSigner {
    async fn sign_message(&self, account: &Pubkey, message: &[u8]) -> SignerResult<Signature> {
        if *account != self.keypair.pubkey() {
            return Err(SignerError::UnknownAccount(*account));
        }
        self.keypair
            .try_sign_message(message)
            .map_err(|e| SignerError::Unavailable(e.to_string()))
    }
}
