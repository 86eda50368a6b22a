//! Structured logging for submission events

use crate::observability::CorrelationId;

/// Logger bound to one submission; every event carries its correlation ID
#[derive(Debug, Clone)]
pub struct SubmissionLogger {
    correlation_id: CorrelationId,
    operation: &'static str,
}

impl SubmissionLogger {
    pub fn new(operation: &'static str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn log_attempt(&self, attempt: u32, max_attempts: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = self.operation,
            attempt,
            max_attempts,
            "Starting submission attempt"
        );
    }

    pub fn log_freshness(&self, blockhash: &str, last_valid_block_height: u64) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = self.operation,
            blockhash = %blockhash,
            last_valid_block_height,
            "Attached recent blockhash"
        );
    }

    pub fn log_signed(&self, signature: &str, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = self.operation,
            signature = %signature,
            latency_ms,
            "Remote signature obtained"
        );
    }

    pub fn log_confirmed(&self, signature: &str, explorer_url: &str, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = self.operation,
            signature = %signature,
            explorer = %explorer_url,
            latency_ms,
            "Transaction broadcast and confirmed"
        );
    }

    pub fn log_failure(&self, category: &str, error: &str, attempt: u32) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            operation = self.operation,
            category = %category,
            error = %error,
            attempt,
            "Submission attempt failed"
        );
    }
}
