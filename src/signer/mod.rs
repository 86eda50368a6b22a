//! Signer abstraction
//!
//! Keys never live in this process in production: a `RemoteSigner` is asked
//! to sign the serialized message on behalf of an account it controls. A
//! request may wait on out-of-band user approval and may be refused.

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

pub mod custody_signer;
pub mod local;

pub use custody_signer::CustodySigner;
pub use local::LocalSigner;

pub type SignerResult<T> = std::result::Result<T, SignerError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The signer (or the user behind it) refused the request
    #[error("signing request denied: {0}")]
    Denied(String),

    /// The signer could not be reached or did not answer in time
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    /// The signer holds no key for this account
    #[error("signer has no key for account {0}")]
    UnknownAccount(Pubkey),

    /// The signer answered with something that is not an ed25519 signature
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Capability to sign transaction messages for accounts held elsewhere
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// Sign `message` (the serialized transaction message) as `account`
    async fn sign_message(&self, account: &Pubkey, message: &[u8]) -> SignerResult<Signature>;
}

#[async_trait]
impl<S: RemoteSigner + ?Sized> RemoteSigner for std::sync::Arc<S> {
    async fn sign_message(&self, account: &Pubkey, message: &[u8]) -> SignerResult<Signature> {
        (**self).sign_message(account, message).await
    }
}
