//! Configuration
//!
//! Settings come from a TOML file. Endpoints and custody credentials can be
//! overridden from the environment (a `.env` file is honoured), so secrets
//! never need to live in the file itself.

use crate::ledger::Cluster;
use crate::pipeline::{ConfirmOptions, RetryPolicy, TokenProgram};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_LEDGER_RPC_URL: &str = "LEDGER_RPC_URL";
pub const ENV_CUSTODY_API_BASE_URL: &str = "CUSTODY_API_BASE_URL";
pub const ENV_CUSTODY_ORGANIZATION_ID: &str = "CUSTODY_ORGANIZATION_ID";
pub const ENV_CUSTODY_API_PUBLIC_KEY: &str = "CUSTODY_API_PUBLIC_KEY";
pub const ENV_CUSTODY_API_PRIVATE_KEY: &str = "CUSTODY_API_PRIVATE_KEY";
pub const ENV_TOKEN_MINT: &str = "TOKEN_MINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub custody: CustodyConfig,

    #[serde(default)]
    pub token: TokenConfig,

    /// Full-rebuild retries after blockhash expiry
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub cluster: Cluster,

    /// Overrides the cluster's public endpoint
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive failed confirmation polls tolerated
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default = "default_custody_base_url")]
    pub api_base_url: String,

    /// Parent organization owning the API key
    #[serde(default)]
    pub organization_id: String,

    /// Compressed P-256 public key, hex
    #[serde(default)]
    pub api_public_key: String,

    /// P-256 private scalar, hex; prefer the environment over the file
    #[serde(default, skip_serializing)]
    pub api_private_key: String,

    #[serde(default = "default_custody_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_activity_poll_interval_ms")]
    pub activity_poll_interval_ms: u64,

    /// How long to wait for quorum approval of an activity
    #[serde(default = "default_approval_timeout")]
    pub approval_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub mint: Option<String>,

    #[serde(default = "default_token_decimals")]
    pub decimals: u8,

    #[serde(default)]
    pub program: TokenProgram,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Print Prometheus metrics after each command
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_max_poll_errors() -> u32 { 5 }
fn default_custody_base_url() -> String { "https://api.turnkey.com".to_string() }
fn default_custody_timeout() -> u64 { 30 }
fn default_activity_poll_interval_ms() -> u64 { 1_000 }
fn default_approval_timeout() -> u64 { 300 }
fn default_token_decimals() -> u8 { 9 }

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            rpc_url: None,
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_errors: default_max_poll_errors(),
        }
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_custody_base_url(),
            organization_id: String::new(),
            api_public_key: String::new(),
            api_private_key: String::new(),
            request_timeout_secs: default_custody_timeout(),
            activity_poll_interval_ms: default_activity_poll_interval_ms(),
            approval_timeout_secs: default_approval_timeout(),
        }
    }
}

impl fmt::Debug for CustodyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyConfig")
            .field("api_base_url", &self.api_base_url)
            .field("organization_id", &self.organization_id)
            .field("api_public_key", &self.api_public_key)
            .field("api_private_key", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("activity_poll_interval_ms", &self.activity_poll_interval_ms)
            .field("approval_timeout_secs", &self.approval_timeout_secs)
            .finish()
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            mint: None,
            decimals: default_token_decimals(),
            program: TokenProgram::default(),
        }
    }
}

impl LedgerConfig {
    /// Configured endpoint, or the cluster's public one
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.default_rpc_url())
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        let commitment = CommitmentLevel::from_str(&self.commitment).map_err(|_| {
            ConfigError::Invalid(format!(
                "ledger.commitment must be processed, confirmed or finalized, got '{}'",
                self.commitment
            ))
        })?;
        Ok(CommitmentConfig { commitment })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn confirm_options(&self) -> Result<ConfirmOptions, ConfigError> {
        Ok(ConfirmOptions {
            commitment: self.commitment_config()?,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_errors: self.max_poll_errors,
        })
    }
}

impl CustodyConfig {
    /// Whether enough is configured to talk to the custody API
    pub fn has_credentials(&self) -> bool {
        !self.organization_id.is_empty()
            && !self.api_public_key.is_empty()
            && !self.api_private_key.is_empty()
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_LEDGER_RPC_URL) {
            self.ledger.rpc_url = Some(url);
        }
        if let Some(url) = get(ENV_CUSTODY_API_BASE_URL) {
            self.custody.api_base_url = url;
        }
        if let Some(org) = get(ENV_CUSTODY_ORGANIZATION_ID) {
            self.custody.organization_id = org;
        }
        if let Some(key) = get(ENV_CUSTODY_API_PUBLIC_KEY) {
            self.custody.api_public_key = key;
        }
        if let Some(key) = get(ENV_CUSTODY_API_PRIVATE_KEY) {
            self.custody.api_private_key = key;
        }
        if let Some(mint) = get(ENV_TOKEN_MINT) {
            self.token.mint = Some(mint);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.commitment_config()?;

        if self.ledger.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "ledger.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::Invalid(format!(
                "retry.jitter_factor must be within 0.0..=1.0, got {}",
                self.retry.jitter_factor
            )));
        }
        if self.token.decimals > crate::pipeline::amount::MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "token.decimals must be at most {}",
                crate::pipeline::amount::MAX_DECIMALS
            )));
        }
        if !self.custody.api_base_url.starts_with("http://")
            && !self.custody.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "custody.api_base_url must be an http(s) URL, got '{}'",
                self.custody.api_base_url
            )));
        }
        if self.custody.activity_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "custody.activity_poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
