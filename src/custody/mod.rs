//! Custody service client
//!
//! Keys for user wallets live in a remote custody service organized as a
//! parent organization with one sub-organization per user. Every mutation is
//! an *activity*: submitted with an API-key stamp, possibly held for quorum
//! approval, and eventually completed, failed or rejected.

pub mod activities;
pub mod client;
pub mod custody_errors;
pub mod stamp;

pub use activities::Attestation;
pub use client::{CreateSubOrgRequest, CustodyClient, RecoveryInitiated, SubOrganization};
pub use custody_errors::{CustodyError, CustodyResult};
pub use stamp::ApiKeyStamper;
