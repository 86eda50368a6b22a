//! HTTP client for the custody API

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::activities::{
    Activity, ActivityRequest, ActivityResponse, ActivityStatus, Attestation,
    AuthenticatorParams, CreateSubOrganizationParams, GetActivityRequest,
    InitUserEmailRecoveryParams, RootUserParams, SignRawPayloadParams, WalletAccountParams,
    WalletParams, CREATE_SUB_ORGANIZATION, HASH_FUNCTION_NOT_APPLICABLE,
    INIT_USER_EMAIL_RECOVERY, PAYLOAD_ENCODING_HEXADECIMAL, SIGN_RAW_PAYLOAD,
};
use super::custody_errors::{CustodyError, CustodyResult};
use super::stamp::{ApiKeyStamper, STAMP_HEADER};
use crate::config::CustodyConfig;
use crate::metrics::metrics;

const SUBMIT_SIGN_RAW_PAYLOAD: &str = "/public/v1/submit/sign_raw_payload";
const SUBMIT_CREATE_SUB_ORGANIZATION: &str = "/public/v1/submit/create_sub_organization";
const SUBMIT_INIT_USER_EMAIL_RECOVERY: &str = "/public/v1/submit/init_user_email_recovery";
const QUERY_GET_ACTIVITY: &str = "/public/v1/query/get_activity";

/// Name given to the wallet created with every sub-organization
pub const DEFAULT_WALLET_NAME: &str = "Default Solana Wallet";

/// Sign-up request: one root user holding one passkey
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubOrgRequest {
    pub email: String,
    pub user_name: String,
    pub sub_org_name: String,
    pub challenge: String,
    pub attestation: Attestation,
}

/// Newly created sub-organization and its first wallet account
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubOrganization {
    pub sub_org_id: String,
    pub wallet_id: String,
    pub address: String,
    /// Users holding the sub-organization's root quorum
    pub root_user_ids: Vec<String>,
}

/// Identifiers needed to finish an e-mail recovery
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInitiated {
    pub user_id: String,
    pub organization_id: String,
}

/// Stamped JSON client for the custody API
#[derive(Debug)]
pub struct CustodyClient {
    http: reqwest::Client,
    base_url: String,
    organization_id: String,
    stamper: ApiKeyStamper,
    activity_poll_interval: Duration,
    approval_timeout: Duration,
}

impl CustodyClient {
    pub fn new(config: &CustodyConfig) -> CustodyResult<Self> {
        let stamper = ApiKeyStamper::new(&config.api_public_key, &config.api_private_key)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CustodyError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            organization_id: config.organization_id.clone(),
            stamper,
            activity_poll_interval: Duration::from_millis(config.activity_poll_interval_ms),
            approval_timeout: Duration::from_secs(config.approval_timeout_secs),
        })
    }

    /// Parent organization the API key belongs to
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> CustodyResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(body)
            .map_err(|e| CustodyError::InvalidResponse(format!("request encoding: {}", e)))?;
        let stamp = self.stamper.stamp(&body);

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(STAMP_HEADER, stamp)
            .body(body)
            .send()
            .await
            .map_err(CustodyError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(CustodyError::from_reqwest)?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CustodyError::Unauthorized {
                status: status.as_u16(),
                body: text,
            });
        }
        if !status.is_success() {
            return Err(CustodyError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| CustodyError::InvalidResponse(format!("{} (path: {})", e, path)))
    }

    async fn submit_activity<P: Serialize>(
        &self,
        path: &str,
        activity_type: &'static str,
        organization_id: &str,
        parameters: P,
    ) -> CustodyResult<Activity> {
        let request = ActivityRequest {
            activity_type,
            timestamp_ms: chrono::Utc::now().timestamp_millis().to_string(),
            organization_id: organization_id.to_string(),
            parameters,
        };

        metrics()
            .custody_activities
            .with_label_values(&[activity_type])
            .inc();

        let response: ActivityResponse = self.post(path, &request).await?;
        debug!(
            activity_id = %response.activity.id,
            activity_type,
            status = ?response.activity.status,
            "Activity submitted"
        );
        self.await_completion(organization_id, response.activity).await
    }

    /// Poll until the activity leaves the pending states
    ///
    /// Activities needing quorum approval stay in `CONSENSUS_NEEDED` until a
    /// user approves them out of band; that wait is bounded by the approval
    /// timeout.
    async fn await_completion(
        &self,
        organization_id: &str,
        mut activity: Activity,
    ) -> CustodyResult<Activity> {
        let started = Instant::now();

        while activity.status.is_pending() {
            let waited = started.elapsed();
            if waited >= self.approval_timeout {
                return Err(CustodyError::ApprovalTimeout {
                    activity_id: activity.id,
                    waited_secs: waited.as_secs(),
                });
            }
            debug!(
                activity_id = %activity.id,
                status = ?activity.status,
                waited_ms = waited.as_millis() as u64,
                "Activity pending"
            );
            sleep(self.activity_poll_interval).await;
            activity = self.get_activity(organization_id, &activity.id).await?;
        }

        match activity.status {
            ActivityStatus::Completed => Ok(activity),
            ActivityStatus::Rejected => {
                warn!(activity_id = %activity.id, "Activity rejected");
                Err(CustodyError::Rejected {
                    activity_id: activity.id,
                })
            }
            ActivityStatus::Failed => {
                let reason = activity
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "no failure details".to_string());
                Err(CustodyError::Failed {
                    activity_id: activity.id,
                    reason,
                })
            }
            _ => Err(CustodyError::InvalidResponse(format!(
                "activity {} has an unrecognized status",
                activity.id
            ))),
        }
    }

    pub async fn get_activity(
        &self,
        organization_id: &str,
        activity_id: &str,
    ) -> CustodyResult<Activity> {
        let response: ActivityResponse = self
            .post(
                QUERY_GET_ACTIVITY,
                &GetActivityRequest {
                    organization_id,
                    activity_id,
                },
            )
            .await?;
        Ok(response.activity)
    }

    /// Sign `payload` verbatim with the key behind `sign_with`
    ///
    /// Returns the 64-byte ed25519 signature (`r || s`).
    pub async fn sign_raw_payload(
        &self,
        organization_id: &str,
        sign_with: &str,
        payload: &[u8],
    ) -> CustodyResult<[u8; 64]> {
        let activity = self
            .submit_activity(
                SUBMIT_SIGN_RAW_PAYLOAD,
                SIGN_RAW_PAYLOAD,
                organization_id,
                SignRawPayloadParams {
                    sign_with: sign_with.to_string(),
                    payload: hex::encode(payload),
                    encoding: PAYLOAD_ENCODING_HEXADECIMAL,
                    hash_function: HASH_FUNCTION_NOT_APPLICABLE,
                },
            )
            .await?;

        let result = activity
            .result
            .and_then(|r| r.sign_raw_payload_result)
            .ok_or_else(|| {
                CustodyError::InvalidResponse(format!(
                    "activity {} completed without a signature",
                    activity.id
                ))
            })?;

        let bytes = hex::decode(format!("{}{}", result.r, result.s))
            .map_err(|e| CustodyError::InvalidResponse(format!("signature is not hex: {}", e)))?;
        <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| {
            CustodyError::InvalidResponse(format!(
                "expected a 64-byte signature, got {} bytes",
                bytes.len()
            ))
        })
    }

    /// Create a sub-organization with one passkey root user and a Solana wallet
    pub async fn create_sub_organization(
        &self,
        request: &CreateSubOrgRequest,
    ) -> CustodyResult<SubOrganization> {
        info!(sub_org_name = %request.sub_org_name, "Creating sub-organization");

        let parameters = CreateSubOrganizationParams {
            sub_organization_name: request.sub_org_name.clone(),
            root_quorum_threshold: 1,
            root_users: vec![RootUserParams {
                user_name: request.user_name.clone(),
                user_email: request.email.clone(),
                api_keys: vec![],
                authenticators: vec![AuthenticatorParams {
                    authenticator_name: "Passkey".to_string(),
                    challenge: request.challenge.clone(),
                    attestation: request.attestation.clone(),
                }],
                oauth_providers: vec![],
            }],
            wallet: WalletParams {
                wallet_name: DEFAULT_WALLET_NAME.to_string(),
                accounts: vec![WalletAccountParams::default_solana()],
            },
        };

        let activity = self
            .submit_activity(
                SUBMIT_CREATE_SUB_ORGANIZATION,
                CREATE_SUB_ORGANIZATION,
                &self.organization_id,
                parameters,
            )
            .await?;
        let activity_id = activity.id.clone();

        let result = activity
            .result
            .and_then(|r| r.create_sub_organization_result_v7)
            .ok_or_else(|| {
                CustodyError::InvalidResponse(format!(
                    "activity {} completed without a sub-organization",
                    activity_id
                ))
            })?;
        let wallet = result.wallet.ok_or_else(|| {
            CustodyError::InvalidResponse("sub-organization created without a wallet".to_string())
        })?;
        let address = wallet.addresses.into_iter().next().ok_or_else(|| {
            CustodyError::InvalidResponse("wallet created without an address".to_string())
        })?;

        info!(
            sub_org_id = %result.sub_organization_id,
            wallet_id = %wallet.wallet_id,
            address = %address,
            "Sub-organization created"
        );

        Ok(SubOrganization {
            sub_org_id: result.sub_organization_id,
            wallet_id: wallet.wallet_id,
            address,
            root_user_ids: result.root_user_ids,
        })
    }

    /// Start e-mail recovery for the user of `sub_org_id`
    ///
    /// The recovery credential is encrypted to `target_public_key` and mailed
    /// to the user.
    pub async fn init_user_email_recovery(
        &self,
        email: &str,
        target_public_key: &str,
        sub_org_id: &str,
    ) -> CustodyResult<RecoveryInitiated> {
        let activity = self
            .submit_activity(
                SUBMIT_INIT_USER_EMAIL_RECOVERY,
                INIT_USER_EMAIL_RECOVERY,
                sub_org_id,
                InitUserEmailRecoveryParams {
                    email: email.to_string(),
                    target_public_key: target_public_key.to_string(),
                },
            )
            .await?;
        let activity_id = activity.id.clone();

        let user_id = activity
            .result
            .and_then(|r| r.init_user_email_recovery_result)
            .map(|r| r.user_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CustodyError::InvalidResponse(format!(
                    "activity {} completed without a user id",
                    activity_id
                ))
            })?;

        info!(sub_org_id, user_id = %user_id, "E-mail recovery initiated");

        Ok(RecoveryInitiated {
            user_id,
            organization_id: sub_org_id.to_string(),
        })
    }
}
