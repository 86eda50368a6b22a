//! Custody client against a mock HTTP server

use custody_wallet::config::CustodyConfig;
use custody_wallet::custody::{
    Attestation, CreateSubOrgRequest, CustodyClient, CustodyError,
};
use custody_wallet::signer::{CustodySigner, RemoteSigner, SignerError};
use mockito::{Matcher, Server};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde_json::json;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;

const MESSAGE: &[u8] = b"serialized transaction message";

fn api_key_pair() -> (String, String) {
    let private = [11u8; 32];
    let signing_key = SigningKey::from_slice(&private).unwrap();
    let public = p256::PublicKey::from(signing_key.verifying_key());
    (
        hex::encode(public.to_encoded_point(true).as_bytes()),
        hex::encode(private),
    )
}

fn client_for(server: &Server, approval_timeout_secs: u64) -> CustodyClient {
    let (public, private) = api_key_pair();
    CustodyClient::new(&CustodyConfig {
        api_base_url: server.url(),
        organization_id: "org-parent".to_string(),
        api_public_key: public,
        api_private_key: private,
        request_timeout_secs: 5,
        activity_poll_interval_ms: 10,
        approval_timeout_secs,
    })
    .unwrap()
}

fn signature_result(keypair: &Keypair) -> serde_json::Value {
    let signature = keypair.sign_message(MESSAGE);
    let bytes = signature.as_ref();
    json!({
        "signRawPayloadResult": {
            "r": hex::encode(&bytes[..32]),
            "s": hex::encode(&bytes[32..]),
            "v": "00"
        }
    })
}

fn activity(id: &str, status: &str, result: serde_json::Value) -> String {
    json!({
        "activity": {
            "id": id,
            "status": status,
            "result": result
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_sign_raw_payload_completed() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .match_header("x-stamp", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "type": "ACTIVITY_TYPE_SIGN_RAW_PAYLOAD_V2",
            "organizationId": "sub-org-1",
            "parameters": {
                "signWith": keypair.pubkey().to_string(),
                "payload": hex::encode(MESSAGE),
                "encoding": "PAYLOAD_ENCODING_HEXADECIMAL",
                "hashFunction": "HASH_FUNCTION_NOT_APPLICABLE"
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(activity("act-1", "ACTIVITY_STATUS_COMPLETED", signature_result(&keypair)))
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 5)), "sub-org-1");
    let signature = signer
        .sign_message(&keypair.pubkey(), MESSAGE)
        .await
        .unwrap();

    assert!(signature.verify(keypair.pubkey().as_ref(), MESSAGE));
    submit.assert_async().await;
}

#[tokio::test]
async fn test_waits_for_consensus() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(200)
        .with_body(activity("act-2", "ACTIVITY_STATUS_CONSENSUS_NEEDED", json!(null)))
        .create_async()
        .await;
    let poll = server
        .mock("POST", "/public/v1/query/get_activity")
        .match_body(Matcher::PartialJson(json!({
            "organizationId": "sub-org-1",
            "activityId": "act-2"
        })))
        .with_status(200)
        .with_body(activity("act-2", "ACTIVITY_STATUS_COMPLETED", signature_result(&keypair)))
        .expect(1)
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 5)), "sub-org-1");
    let signature = signer
        .sign_message(&keypair.pubkey(), MESSAGE)
        .await
        .unwrap();

    assert!(signature.verify(keypair.pubkey().as_ref(), MESSAGE));
    submit.assert_async().await;
    poll.assert_async().await;
}

#[tokio::test]
async fn test_rejected_activity_is_denied() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let _submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(200)
        .with_body(activity("act-3", "ACTIVITY_STATUS_REJECTED", json!(null)))
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 5)), "sub-org-1");
    let err = signer
        .sign_message(&keypair.pubkey(), MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::Denied(_)));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let _submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 5)), "sub-org-1");
    let err = signer
        .sign_message(&keypair.pubkey(), MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::Unavailable(_)));
}

#[tokio::test]
async fn test_unauthorized_is_denied() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let _submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(401)
        .with_body(r#"{"message":"invalid stamp"}"#)
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let err = client
        .sign_raw_payload("sub-org-1", &keypair.pubkey().to_string(), MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Unauthorized { status: 401, .. }));
    assert!(matches!(SignerError::from(err), SignerError::Denied(_)));
}

#[tokio::test]
async fn test_approval_timeout_is_unavailable() {
    let mut server = Server::new_async().await;
    let keypair = Keypair::new();

    let _submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(200)
        .with_body(activity("act-4", "ACTIVITY_STATUS_CONSENSUS_NEEDED", json!(null)))
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 0)), "sub-org-1");
    let err = signer
        .sign_message(&keypair.pubkey(), MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::Unavailable(_)));
}

#[tokio::test]
async fn test_signature_for_wrong_key_rejected() {
    let mut server = Server::new_async().await;
    let account = Keypair::new();
    let impostor = Keypair::new();

    let _submit = server
        .mock("POST", "/public/v1/submit/sign_raw_payload")
        .with_status(200)
        .with_body(activity("act-5", "ACTIVITY_STATUS_COMPLETED", signature_result(&impostor)))
        .create_async()
        .await;

    let signer = CustodySigner::new(Arc::new(client_for(&server, 5)), "sub-org-1");
    let err = signer
        .sign_message(&account.pubkey(), MESSAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::MalformedSignature(_)));
}

#[tokio::test]
async fn test_create_sub_organization() {
    let mut server = Server::new_async().await;

    let submit = server
        .mock("POST", "/public/v1/submit/create_sub_organization")
        .match_header("x-stamp", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "type": "ACTIVITY_TYPE_CREATE_SUB_ORGANIZATION_V7",
            "organizationId": "org-parent",
            "parameters": {
                "subOrganizationName": "alice-org",
                "rootQuorumThreshold": 1,
                "wallet": {
                    "accounts": [{
                        "curve": "CURVE_ED25519",
                        "path": "m/44'/501'/0'/0'",
                        "addressFormat": "ADDRESS_FORMAT_SOLANA"
                    }]
                }
            }
        })))
        .with_status(200)
        .with_body(activity(
            "act-6",
            "ACTIVITY_STATUS_COMPLETED",
            json!({
                "createSubOrganizationResultV7": {
                    "subOrganizationId": "sub-org-alice",
                    "wallet": {
                        "walletId": "wallet-1",
                        "addresses": ["9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"]
                    },
                    "rootUserIds": ["user-1"]
                }
            }),
        ))
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let created = client
        .create_sub_organization(&CreateSubOrgRequest {
            email: "alice@example.com".to_string(),
            user_name: "alice".to_string(),
            sub_org_name: "alice-org".to_string(),
            challenge: "Y2hhbGxlbmdl".to_string(),
            attestation: Attestation {
                credential_id: "cred".to_string(),
                client_data_json: "e30".to_string(),
                attestation_object: "o2Nm".to_string(),
                transports: vec!["AUTHENTICATOR_TRANSPORT_INTERNAL".to_string()],
            },
        })
        .await
        .unwrap();

    assert_eq!(created.sub_org_id, "sub-org-alice");
    assert_eq!(created.wallet_id, "wallet-1");
    assert_eq!(created.address, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
    assert_eq!(created.root_user_ids, vec!["user-1".to_string()]);
    submit.assert_async().await;
}

#[tokio::test]
async fn test_init_user_email_recovery() {
    let mut server = Server::new_async().await;

    let submit = server
        .mock("POST", "/public/v1/submit/init_user_email_recovery")
        .match_body(Matcher::PartialJson(json!({
            "type": "ACTIVITY_TYPE_INIT_USER_EMAIL_RECOVERY",
            "organizationId": "sub-org-alice",
            "parameters": {
                "email": "alice@example.com",
                "targetPublicKey": "04abcdef"
            }
        })))
        .with_status(200)
        .with_body(activity(
            "act-7",
            "ACTIVITY_STATUS_COMPLETED",
            json!({ "initUserEmailRecoveryResult": { "userId": "user-1" } }),
        ))
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let initiated = client
        .init_user_email_recovery("alice@example.com", "04abcdef", "sub-org-alice")
        .await
        .unwrap();

    assert_eq!(initiated.user_id, "user-1");
    assert_eq!(initiated.organization_id, "sub-org-alice");
    submit.assert_async().await;
}

#[tokio::test]
async fn test_failed_activity_carries_reason() {
    let mut server = Server::new_async().await;

    let _submit = server
        .mock("POST", "/public/v1/submit/init_user_email_recovery")
        .with_status(200)
        .with_body(
            json!({
                "activity": {
                    "id": "act-8",
                    "status": "ACTIVITY_STATUS_FAILED",
                    "failure": { "message": "user not found" }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let err = client
        .init_user_email_recovery("bob@example.com", "04abcdef", "sub-org-bob")
        .await
        .unwrap_err();
    match err {
        CustodyError::Failed { activity_id, reason } => {
            assert_eq!(activity_id, "act-8");
            assert!(reason.contains("user not found"));
        }
        other => panic!("expected failed activity, got {:?}", other),
    }
}
