//! Test Utilities Module
//!
//! In-memory ledger and signer for deterministic pipeline tests.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ledger::{
    ConfirmationLevel, LatestBlockhash, Ledger, LedgerError, LedgerResult, SignatureStatus,
    TokenBalance,
};
use crate::signer::{RemoteSigner, SignerError, SignerResult};

/// Starting block height of a fresh mock ledger
pub const MOCK_START_HEIGHT: u64 = 1_000;

#[derive(Debug)]
struct Submitted {
    polls: u32,
    confirmable: bool,
}

#[derive(Debug)]
struct LedgerState {
    block_height: u64,
    height_step: u64,
    validity_window: u64,
    blockhash_fetches: u64,
    confirm_after_polls: Option<u32>,
    finalize_after_polls: Option<u32>,
    unconfirmed_sends: u32,
    failing_polls: u32,
    poll_error: LedgerError,
    send_error: Option<LedgerError>,
    failing_sends: u32,
    airdrop_error: Option<LedgerError>,
    onchain_error: Option<String>,
    submitted: HashMap<Signature, Submitted>,
    send_order: Vec<Signature>,
    status_polls: u64,
    balances: HashMap<Pubkey, u64>,
    token_balances: HashMap<Pubkey, TokenBalance>,
    airdrops: Vec<(Pubkey, u64)>,
}

/// In-memory `Ledger`
///
/// Block height advances on every height query, so confirmation polling
/// moves toward the blockhash ceiling without real time passing. Sent
/// transactions are decoded and their signatures verified.
#[derive(Debug, Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Confirms every transaction on its first status poll
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                block_height: MOCK_START_HEIGHT,
                height_step: 1,
                validity_window: 150,
                blockhash_fetches: 0,
                confirm_after_polls: Some(1),
                finalize_after_polls: None,
                unconfirmed_sends: 0,
                failing_polls: 0,
                poll_error: LedgerError::Transport {
                    message: "connection reset by peer".to_string(),
                },
                send_error: None,
                failing_sends: 0,
                airdrop_error: None,
                onchain_error: None,
                submitted: HashMap::new(),
                send_order: Vec::new(),
                status_polls: 0,
                balances: HashMap::new(),
                token_balances: HashMap::new(),
                airdrops: Vec::new(),
            })),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut LedgerState)) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            f(state.get_mut());
        }
        self
    }

    /// Report confirmation once a signature has been polled `polls` times
    pub fn with_confirm_after(self, polls: u32) -> Self {
        self.configure(|s| s.confirm_after_polls = Some(polls))
    }

    /// Never confirm anything
    pub fn never_confirming(self) -> Self {
        self.configure(|s| s.confirm_after_polls = None)
    }

    /// Report finalization once a confirmed signature has been polled `polls` times
    pub fn with_finalize_after(self, polls: u32) -> Self {
        self.configure(|s| s.finalize_after_polls = Some(polls))
    }

    /// The first `count` transactions sent are accepted but never confirm
    pub fn with_unconfirmed_sends(self, count: u32) -> Self {
        self.configure(|s| s.unconfirmed_sends = count)
    }

    /// Blocks between a blockhash fetch and its height ceiling
    pub fn with_validity_window(self, blocks: u64) -> Self {
        self.configure(|s| s.validity_window = blocks)
    }

    /// Blocks produced per height query
    pub fn with_height_step(self, blocks: u64) -> Self {
        self.configure(|s| s.height_step = blocks)
    }

    /// Refuse every raw submission with `error`
    pub fn rejecting_sends(self, error: LedgerError) -> Self {
        self.configure(|s| s.send_error = Some(error))
    }

    /// Refuse the next `count` raw submissions with `error`, then accept
    pub fn with_failing_sends(self, count: u32, error: LedgerError) -> Self {
        self.configure(|s| {
            s.failing_sends = count;
            s.send_error = Some(error);
        })
    }

    /// Refuse every airdrop request with `error`
    pub fn rejecting_airdrops(self, error: LedgerError) -> Self {
        self.configure(|s| s.airdrop_error = Some(error))
    }

    /// Include transactions but report an execution error
    pub fn with_onchain_error(self, error: &str) -> Self {
        let error = error.to_string();
        self.configure(|s| s.onchain_error = Some(error))
    }

    /// The next `count` status polls fail with a transport error
    pub fn with_failing_polls(self, count: u32) -> Self {
        self.configure(|s| s.failing_polls = count)
    }

    /// The next `count` status polls fail with `error`
    pub fn with_poll_errors(self, count: u32, error: LedgerError) -> Self {
        self.configure(|s| {
            s.failing_polls = count;
            s.poll_error = error;
        })
    }

    pub fn with_balance(self, account: Pubkey, lamports: u64) -> Self {
        self.configure(|s| {
            s.balances.insert(account, lamports);
        })
    }

    pub fn with_token_balance(self, account: Pubkey, amount: u64, decimals: u8) -> Self {
        self.configure(|s| {
            s.token_balances
                .insert(account, TokenBalance { amount, decimals });
        })
    }

    pub async fn send_count(&self) -> usize {
        self.state.lock().await.send_order.len()
    }

    pub async fn sent_signatures(&self) -> Vec<Signature> {
        self.state.lock().await.send_order.clone()
    }

    pub async fn blockhash_fetches(&self) -> u64 {
        self.state.lock().await.blockhash_fetches
    }

    pub async fn status_polls(&self) -> u64 {
        self.state.lock().await.status_polls
    }

    pub async fn airdrops(&self) -> Vec<(Pubkey, u64)> {
        self.state.lock().await.airdrops.clone()
    }

    fn blockhash_for(fetch: u64) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&fetch.to_le_bytes());
        bytes[31] = 0xB1;
        Hash::new_from_array(bytes)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn commitment(&self) -> CommitmentConfig {
        CommitmentConfig::confirmed()
    }

    async fn latest_blockhash(&self) -> LedgerResult<LatestBlockhash> {
        let mut state = self.state.lock().await;
        state.blockhash_fetches += 1;
        Ok(LatestBlockhash {
            blockhash: Self::blockhash_for(state.blockhash_fetches),
            last_valid_block_height: state.block_height + state.validity_window,
        })
    }

    async fn block_height(&self) -> LedgerResult<u64> {
        let mut state = self.state.lock().await;
        state.block_height += state.height_step;
        Ok(state.block_height)
    }

    async fn send_raw_transaction(&self, wire: &[u8]) -> LedgerResult<Signature> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.send_error.clone() {
            // zero budget means every send fails
            if state.failing_sends > 0 {
                state.failing_sends -= 1;
                if state.failing_sends == 0 {
                    state.send_error = None;
                }
            }
            return Err(err);
        }

        let tx: Transaction = bincode::deserialize(wire)
            .map_err(|e| LedgerError::Rejected {
                message: format!("failed to deserialize transaction: {}", e),
            })?;
        if tx.verify().is_err() {
            return Err(LedgerError::Rejected {
                message: "signature verification failed".to_string(),
            });
        }

        let signature = tx.signatures[0];
        if state.submitted.contains_key(&signature) {
            return Err(LedgerError::Rejected {
                message: "transaction already processed".to_string(),
            });
        }

        let confirmable = state.send_order.len() as u32 >= state.unconfirmed_sends;
        state.submitted.insert(
            signature,
            Submitted {
                polls: 0,
                confirmable,
            },
        );
        state.send_order.push(signature);
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let mut state = self.state.lock().await;
        state.status_polls += 1;

        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(state.poll_error.clone());
        }

        let confirm_after = state.confirm_after_polls;
        let finalize_after = state.finalize_after_polls;
        let onchain_error = state.onchain_error.clone();
        let slot = state.block_height;
        let Some(entry) = state.submitted.get_mut(signature) else {
            return Ok(None);
        };
        entry.polls += 1;

        if let Some(err) = onchain_error {
            return Ok(Some(SignatureStatus {
                slot,
                confirmation: ConfirmationLevel::Confirmed,
                err: Some(err),
            }));
        }

        let confirmed = entry.confirmable
            && confirm_after.map(|after| entry.polls >= after).unwrap_or(false);
        let finalized =
            confirmed && finalize_after.map(|after| entry.polls >= after).unwrap_or(false);
        let confirmation = if finalized {
            ConfirmationLevel::Finalized
        } else if confirmed {
            ConfirmationLevel::Confirmed
        } else {
            ConfirmationLevel::Processed
        };
        Ok(Some(SignatureStatus {
            slot,
            confirmation,
            err: None,
        }))
    }

    async fn request_airdrop(&self, account: &Pubkey, lamports: u64) -> LedgerResult<Signature> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.airdrop_error.clone() {
            return Err(err);
        }
        state.airdrops.push((*account, lamports));
        *state.balances.entry(*account).or_insert(0) += lamports;

        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&(state.airdrops.len() as u64).to_le_bytes());
        bytes[63] = 0xA1;
        let signature = Signature::from(bytes);
        state.submitted.insert(
            signature,
            Submitted {
                polls: 0,
                confirmable: true,
            },
        );
        Ok(signature)
    }

    async fn balance(&self, account: &Pubkey) -> LedgerResult<u64> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(account)
            .copied()
            .unwrap_or(0))
    }

    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<TokenBalance> {
        self.state
            .lock()
            .await
            .token_balances
            .get(account)
            .copied()
            .ok_or(LedgerError::AccountNotFound {
                account: account.to_string(),
            })
    }
}

/// How the mock signer answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerMode {
    Approve,
    Deny,
    Unavailable,
    /// Returns a signature that does not verify
    Garbage,
}

/// Keypair-backed `RemoteSigner` with scripted refusals
#[derive(Clone)]
pub struct MockSigner {
    keypair: Arc<Keypair>,
    mode: Arc<Mutex<SignerMode>>,
    requests: Arc<Mutex<usize>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::with_mode(SignerMode::Approve)
    }

    pub fn with_mode(mode: SignerMode) -> Self {
        Self {
            keypair: Arc::new(Keypair::new()),
            mode: Arc::new(Mutex::new(mode)),
            requests: Arc::new(Mutex::new(0)),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub async fn set_mode(&self, mode: SignerMode) {
        *self.mode.lock().await = mode;
    }

    pub async fn request_count(&self) -> usize {
        *self.requests.lock().await
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSigner for MockSigner {
    async fn sign_message(&self, account: &Pubkey, message: &[u8]) -> SignerResult<Signature> {
        *self.requests.lock().await += 1;

        if *account != self.keypair.pubkey() {
            return Err(SignerError::UnknownAccount(*account));
        }
        match *self.mode.lock().await {
            SignerMode::Approve => Ok(self.keypair.sign_message(message)),
            SignerMode::Deny => Err(SignerError::Denied("user rejected the request".to_string())),
            SignerMode::Unavailable => {
                Err(SignerError::Unavailable("custody service timed out".to_string()))
            }
            SignerMode::Garbage => Ok(Signature::from([7u8; 64])),
        }
    }
}
