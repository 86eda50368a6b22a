use solana_rpc_client_api::client_error::{Error as ClientError, ErrorKind as ClientErrorKind};
use solana_rpc_client_api::request::RpcError;
use thiserror::Error;

/// JSON-RPC code returned when preflight simulation of `sendTransaction` fails
pub const PREFLIGHT_FAILURE_CODE: i64 = -32002;

/// JSON-RPC code returned when the node is behind or unhealthy
pub const NODE_UNHEALTHY_CODE: i64 = -32005;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Classified ledger RPC failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Network or connection failure
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Blockhash not found")]
    BlockhashNotFound,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Account not found: {account}")]
    AccountNotFound { account: String },

    /// The node refused the submitted transaction (preflight, sanitization, duplicate)
    #[error("Transaction rejected: {message}")]
    Rejected { message: String },

    #[error("RPC response error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Transient failures worth another poll or request
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport { .. } | LedgerError::Timeout { .. } => true,
            LedgerError::RateLimited => true,
            LedgerError::RpcResponse { code, .. } => *code == NODE_UNHEALTHY_CODE,
            LedgerError::BlockhashNotFound
            | LedgerError::InsufficientFunds
            | LedgerError::AccountNotFound { .. }
            | LedgerError::Rejected { .. }
            | LedgerError::InvalidResponse(_) => false,
        }
    }

    /// Classify a solana client error
    pub fn from_client_error(err: &ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::Io(e) => Self::classify_message(&e.to_string(), None)
                .unwrap_or_else(|| LedgerError::Transport {
                    message: e.to_string(),
                }),
            ClientErrorKind::Reqwest(e) => {
                if e.is_timeout() {
                    LedgerError::Timeout {
                        message: e.to_string(),
                    }
                } else if e.status().map(|s| s.as_u16()) == Some(429) {
                    LedgerError::RateLimited
                } else {
                    LedgerError::Transport {
                        message: e.to_string(),
                    }
                }
            }
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                Self::classify_message(message, Some(*code)).unwrap_or_else(|| {
                    if *code == PREFLIGHT_FAILURE_CODE {
                        LedgerError::Rejected {
                            message: message.clone(),
                        }
                    } else {
                        LedgerError::RpcResponse {
                            code: *code,
                            message: message.clone(),
                        }
                    }
                })
            }
            ClientErrorKind::TransactionError(e) => LedgerError::Rejected {
                message: e.to_string(),
            },
            _ => {
                let message = err.to_string();
                Self::classify_message(&message, None)
                    .unwrap_or(LedgerError::InvalidResponse(message))
            }
        }
    }

    /// Match well-known node messages regardless of where they surfaced
    fn classify_message(message: &str, code: Option<i64>) -> Option<Self> {
        let lower = message.to_lowercase();

        if lower.contains("blockhash not found") {
            Some(LedgerError::BlockhashNotFound)
        } else if lower.contains("insufficient funds") || lower.contains("insufficient lamports") {
            Some(LedgerError::InsufficientFunds)
        } else if lower.contains("account not found") || lower.contains("could not find account") {
            Some(LedgerError::AccountNotFound {
                account: "unknown".to_string(),
            })
        } else if lower.contains("too many requests") || lower.contains("rate limit") {
            Some(LedgerError::RateLimited)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Some(LedgerError::Timeout {
                message: message.to_string(),
            })
        } else if code.is_none()
            && (lower.contains("connection") || lower.contains("dns") || lower.contains("refused"))
        {
            Some(LedgerError::Transport {
                message: message.to_string(),
            })
        } else {
            None
        }
    }
}
