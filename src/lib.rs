//! Custody Wallet
//!
//! Token transfers on Solana for wallets whose keys are held by a remote
//! custody service. Transactions are built locally, signed remotely and
//! confirmed against the ledger, with expiry handled by rebuilding from
//! scratch.
//!
//! ## Modules
//!
//! - [`pipeline`]: build, attach freshness, request signature, broadcast and confirm
//! - [`ledger`]: ledger RPC access behind the `Ledger` trait
//! - [`signer`]: remote signing behind the `RemoteSigner` trait
//! - [`custody`]: custody API client (signing, sub-organizations, recovery)
//! - [`wallet`]: balance queries and devnet airdrops

pub mod config;
pub mod custody;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod signer;
pub mod structured_logging;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};

#[cfg(test)]
mod tests;
