//! API-key request stamping
//!
//! Each request body is signed with the API private key (ECDSA P-256 over
//! SHA-256). The DER signature, the compressed public key and the scheme name
//! are wrapped in a JSON object, base64url-encoded and sent in `X-Stamp`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::{signature::Signer as _, Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::Serialize;
use zeroize::Zeroizing;

use super::custody_errors::{CustodyError, CustodyResult};

pub const STAMP_HEADER: &str = "X-Stamp";
pub const STAMP_SCHEME: &str = "SIGNATURE_SCHEME_TK_API_P256";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamp<'a> {
    public_key: &'a str,
    scheme: &'a str,
    signature: String,
}

/// Holds the API key pair; the private scalar never leaves this struct
pub struct ApiKeyStamper {
    public_key: String,
    signing_key: SigningKey,
}

impl std::fmt::Debug for ApiKeyStamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStamper")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl ApiKeyStamper {
    /// Build from hex-encoded keys; the public key must be the compressed
    /// SEC1 encoding of the private key's point
    pub fn new(public_key_hex: &str, private_key_hex: &str) -> CustodyResult<Self> {
        let secret = Zeroizing::new(hex::decode(private_key_hex.trim()).map_err(|e| {
            CustodyError::Configuration(format!("API private key is not hex: {}", e))
        })?);
        let signing_key = SigningKey::from_slice(&secret).map_err(|e| {
            CustodyError::Configuration(format!("API private key is not a P-256 scalar: {}", e))
        })?;

        let derived = compressed_public_key(&signing_key);
        let public_key = public_key_hex.trim().to_lowercase();
        if derived != public_key {
            return Err(CustodyError::Configuration(format!(
                "API public key {} does not match private key (derived {})",
                public_key, derived
            )));
        }

        Ok(Self {
            public_key,
            signing_key,
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Header value for `body`
    pub fn stamp(&self, body: &str) -> String {
        let signature: Signature = self.signing_key.sign(body.as_bytes());
        let stamp = Stamp {
            public_key: &self.public_key,
            scheme: STAMP_SCHEME,
            signature: hex::encode(signature.to_der().as_bytes()),
        };
        // Serializing a struct of strings cannot fail
        let json = serde_json::to_vec(&stamp).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }
}

fn compressed_public_key(signing_key: &SigningKey) -> String {
    let public = p256::PublicKey::from(signing_key.verifying_key());
    hex::encode(public.to_encoded_point(true).as_bytes())
}
