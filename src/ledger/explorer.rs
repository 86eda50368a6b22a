//! Block explorer links

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const EXPLORER_BASE_URL: &str = "https://explorer.solana.com";

/// Cluster a ledger endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Testnet,
    Devnet,
}

impl Cluster {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Faucet airdrops are refused on mainnet
    pub fn supports_airdrop(self) -> bool {
        !matches!(self, Cluster::MainnetBeta)
    }

    fn query(self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "",
            Cluster::Testnet => "?cluster=testnet",
            Cluster::Devnet => "?cluster=devnet",
        }
    }

    pub fn tx_url(self, signature: &str) -> String {
        format!("{}/tx/{}{}", EXPLORER_BASE_URL, signature, self.query())
    }

    pub fn address_url(self, address: &str) -> String {
        format!("{}/address/{}{}", EXPLORER_BASE_URL, address, self.query())
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster::Devnet
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Testnet => "testnet",
            Cluster::Devnet => "devnet",
        };
        f.write_str(name)
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            "testnet" => Ok(Cluster::Testnet),
            "devnet" => Ok(Cluster::Devnet),
            other => Err(format!("unknown cluster '{}'", other)),
        }
    }
}
