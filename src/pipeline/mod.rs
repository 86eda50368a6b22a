//! Transaction submission pipeline
//!
//! One ledger-mutating operation goes through four stages, each taking the
//! previous stage's output as its only input:
//!
//! 1. build (`build_token_transfer`, `build_token_account_creation`): pure
//! 2. `attach_freshness`: one blockhash read
//! 3. `request_signature`: remote signer, possibly waiting for approval
//! 4. `broadcast_and_confirm`: submit raw bytes, poll until the commitment is
//!    met or the blockhash height ceiling passes
//!
//! `submit_with_retry` reruns all four stages when the blockhash expires;
//! `Submitter` wires them together for the supported operations.

pub mod amount;
pub mod broadcast;
pub mod errors;
pub mod flow;
pub mod freshness;
pub mod instructions;
pub mod retry;
pub mod signing;

pub use amount::TokenAmount;
pub use broadcast::{
    broadcast_and_confirm, confirm_with_strategy, ConfirmOptions, ConfirmationStrategy,
    TransactionHash,
};
pub use errors::{PipelineError, PipelineResult};
pub use flow::Submitter;
pub use freshness::attach_freshness;
pub use instructions::{
    build_token_account_creation, build_token_transfer, parse_address, TokenProgram,
    TokenTransfer, UnsignedTransaction, TOKEN_2022_PROGRAM_ID,
};
pub use retry::{submit_with_retry, RetryPolicy};
pub use signing::{request_signature, SignedTransaction};
