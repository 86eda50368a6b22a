use crate::signer::SignerError;
use thiserror::Error;

pub type CustodyResult<T> = std::result::Result<T, CustodyError>;

/// Failures talking to the custody API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CustodyError {
    #[error("Custody configuration error: {0}")]
    Configuration(String),

    /// Connection, TLS or timeout failure before a response arrived
    #[error("Custody transport error: {0}")]
    Transport(String),

    /// The API key was not accepted for this organization
    #[error("Custody request unauthorized (status {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Custody request failed (status {status}): {body}")]
    Http { status: u16, body: String },

    /// A quorum member rejected the activity
    #[error("Activity {activity_id} was rejected")]
    Rejected { activity_id: String },

    #[error("Activity {activity_id} failed: {reason}")]
    Failed { activity_id: String, reason: String },

    /// Approval did not arrive in time; the activity may still complete later
    #[error("Activity {activity_id} still awaiting approval after {waited_secs}s")]
    ApprovalTimeout { activity_id: String, waited_secs: u64 },

    #[error("Invalid custody response: {0}")]
    InvalidResponse(String),
}

impl CustodyError {
    /// Whether the service was unreachable or unresponsive, as opposed to refusing
    pub fn is_unavailable(&self) -> bool {
        match self {
            CustodyError::Transport(_)
            | CustodyError::ApprovalTimeout { .. }
            | CustodyError::InvalidResponse(_) => true,
            CustodyError::Http { status, .. } => *status >= 500 || *status == 429,
            CustodyError::Configuration(_)
            | CustodyError::Unauthorized { .. }
            | CustodyError::Rejected { .. }
            | CustodyError::Failed { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        CustodyError::Transport(err.to_string())
    }
}

impl From<CustodyError> for SignerError {
    fn from(err: CustodyError) -> Self {
        if err.is_unavailable() {
            SignerError::Unavailable(err.to_string())
        } else {
            SignerError::Denied(err.to_string())
        }
    }
}
