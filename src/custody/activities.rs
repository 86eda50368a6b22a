//! Wire types for custody activities

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SIGN_RAW_PAYLOAD: &str = "ACTIVITY_TYPE_SIGN_RAW_PAYLOAD_V2";
pub const CREATE_SUB_ORGANIZATION: &str = "ACTIVITY_TYPE_CREATE_SUB_ORGANIZATION_V7";
pub const INIT_USER_EMAIL_RECOVERY: &str = "ACTIVITY_TYPE_INIT_USER_EMAIL_RECOVERY";

pub const PAYLOAD_ENCODING_HEXADECIMAL: &str = "PAYLOAD_ENCODING_HEXADECIMAL";
/// ed25519 signs the message itself, not a digest
pub const HASH_FUNCTION_NOT_APPLICABLE: &str = "HASH_FUNCTION_NOT_APPLICABLE";

/// Envelope of every submitted activity
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest<P> {
    #[serde(rename = "type")]
    pub activity_type: &'static str,
    pub timestamp_ms: String,
    pub organization_id: String,
    pub parameters: P,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRawPayloadParams {
    pub sign_with: String,
    pub payload: String,
    pub encoding: &'static str,
    pub hash_function: &'static str,
}

/// WebAuthn attestation produced by the browser passkey ceremony
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub credential_id: String,
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorParams {
    pub authenticator_name: String,
    pub challenge: String,
    pub attestation: Attestation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootUserParams {
    pub user_name: String,
    pub user_email: String,
    pub api_keys: Vec<Value>,
    pub authenticators: Vec<AuthenticatorParams>,
    pub oauth_providers: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccountParams {
    pub curve: &'static str,
    pub path_format: &'static str,
    pub path: &'static str,
    pub address_format: &'static str,
}

impl WalletAccountParams {
    /// First Solana account on the standard derivation path
    pub fn default_solana() -> Self {
        Self {
            curve: "CURVE_ED25519",
            path_format: "PATH_FORMAT_BIP32",
            path: "m/44'/501'/0'/0'",
            address_format: "ADDRESS_FORMAT_SOLANA",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletParams {
    pub wallet_name: String,
    pub accounts: Vec<WalletAccountParams>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubOrganizationParams {
    pub sub_organization_name: String,
    pub root_quorum_threshold: u32,
    pub root_users: Vec<RootUserParams>,
    pub wallet: WalletParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUserEmailRecoveryParams {
    pub email: String,
    pub target_public_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetActivityRequest<'a> {
    pub organization_id: &'a str,
    pub activity_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ActivityResponse {
    pub activity: Activity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ActivityStatus {
    #[serde(rename = "ACTIVITY_STATUS_CREATED")]
    Created,
    #[serde(rename = "ACTIVITY_STATUS_PENDING")]
    Pending,
    #[serde(rename = "ACTIVITY_STATUS_CONSENSUS_NEEDED")]
    ConsensusNeeded,
    #[serde(rename = "ACTIVITY_STATUS_COMPLETED")]
    Completed,
    #[serde(rename = "ACTIVITY_STATUS_FAILED")]
    Failed,
    #[serde(rename = "ACTIVITY_STATUS_REJECTED")]
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ActivityStatus {
    /// Still waiting for processing or quorum approval
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ActivityStatus::Created | ActivityStatus::Pending | ActivityStatus::ConsensusNeeded
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Activity {
    pub id: String,
    pub status: ActivityStatus,
    #[serde(default)]
    pub result: Option<ActivityResult>,
    #[serde(default)]
    pub failure: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResult {
    pub sign_raw_payload_result: Option<SignRawPayloadResult>,
    pub create_sub_organization_result_v7: Option<CreateSubOrganizationResult>,
    pub init_user_email_recovery_result: Option<InitUserEmailRecoveryResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignRawPayloadResult {
    pub r: String,
    pub s: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubOrganizationResult {
    pub sub_organization_id: String,
    pub wallet: Option<WalletResult>,
    #[serde(default)]
    pub root_user_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResult {
    pub wallet_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUserEmailRecoveryResult {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_request_wire_shape() {
        let request = ActivityRequest {
            activity_type: SIGN_RAW_PAYLOAD,
            timestamp_ms: "1700000000000".to_string(),
            organization_id: "org".to_string(),
            parameters: SignRawPayloadParams {
                sign_with: "addr".to_string(),
                payload: "beef".to_string(),
                encoding: PAYLOAD_ENCODING_HEXADECIMAL,
                hash_function: HASH_FUNCTION_NOT_APPLICABLE,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], SIGN_RAW_PAYLOAD);
        assert_eq!(json["timestampMs"], "1700000000000");
        assert_eq!(json["organizationId"], "org");
        assert_eq!(json["parameters"]["signWith"], "addr");
        assert_eq!(json["parameters"]["hashFunction"], HASH_FUNCTION_NOT_APPLICABLE);
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let activity: Activity = serde_json::from_str(
            r#"{"id":"a1","status":"ACTIVITY_STATUS_SOMETHING_NEW"}"#,
        )
        .unwrap();
        assert_eq!(activity.status, ActivityStatus::Unknown);
        assert!(activity.result.is_none());
    }

    #[test]
    fn test_sub_organization_result_parses() {
        let activity: Activity = serde_json::from_str(
            r#"{
                "id": "a2",
                "status": "ACTIVITY_STATUS_COMPLETED",
                "result": {
                    "createSubOrganizationResultV7": {
                        "subOrganizationId": "sub-1",
                        "wallet": {"walletId": "w-1", "addresses": ["Addr1"]},
                        "rootUserIds": ["u-1"]
                    }
                }
            }"#,
        )
        .unwrap();
        let result = activity.result.unwrap().create_sub_organization_result_v7.unwrap();
        assert_eq!(result.sub_organization_id, "sub-1");
        assert_eq!(result.wallet.unwrap().addresses, vec!["Addr1".to_string()]);
        assert_eq!(result.root_user_ids, vec!["u-1".to_string()]);
    }

    #[test]
    fn test_pending_statuses() {
        assert!(ActivityStatus::ConsensusNeeded.is_pending());
        assert!(ActivityStatus::Created.is_pending());
        assert!(!ActivityStatus::Completed.is_pending());
        assert!(!ActivityStatus::Rejected.is_pending());
    }
}
