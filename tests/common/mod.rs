//! Shared fixtures: a software authenticator that signs assertions the way a
//! browser and security key would.

#![allow(dead_code)]

use ciborium::value::Value;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use second_factor_server::db::Credential;
use second_factor_server::webauthn::encoding;
use second_factor_server::webauthn::{Challenge, RelyingParty};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub const RP_ID: &str = "localhost";
pub const ORIGIN: &str = "https://localhost:8000";
pub const APP_ID: &str = "https://localhost:8000";

pub fn relying_party() -> RelyingParty {
    RelyingParty {
        id: RP_ID.to_string(),
        origin: ORIGIN.to_string(),
        app_id: Some(APP_ID.to_string()),
        timeout_ms: 60_000,
    }
}

/// One connection so every query sees the same in-memory database
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

pub struct TestKey {
    signing: SigningKey,
    pub key_handle: Vec<u8>,
}

impl TestKey {
    pub fn new(key_handle: &[u8]) -> Self {
        Self {
            signing: SigningKey::random(&mut rand::rngs::OsRng),
            key_handle: key_handle.to_vec(),
        }
    }

    /// COSE_Key, as stored for WebAuthn registrations
    pub fn cose_public_key(&self) -> Vec<u8> {
        let point = self.signing.verifying_key().to_encoded_point(false);
        let map = Value::Map(vec![
            (Value::Integer(1i64.into()), Value::Integer(2i64.into())),
            (Value::Integer(3i64.into()), Value::Integer((-7i64).into())),
            (Value::Integer((-1i64).into()), Value::Integer(1i64.into())),
            (Value::Integer((-2i64).into()), Value::Bytes(point.x().unwrap().to_vec())),
            (Value::Integer((-3i64).into()), Value::Bytes(point.y().unwrap().to_vec())),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf).unwrap();
        buf
    }

    /// Uncompressed point, as stored for legacy U2F registrations
    pub fn raw_public_key(&self) -> Vec<u8> {
        self.signing
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn credential(&self, user_id: &str, app_id: &str) -> Credential {
        Credential::new(
            user_id.to_string(),
            self.key_handle.clone(),
            self.cose_public_key(),
            app_id.to_string(),
        )
    }

    pub fn u2f_credential(&self, user_id: &str, app_id: &str) -> Credential {
        Credential::new(
            user_id.to_string(),
            self.key_handle.clone(),
            self.raw_public_key(),
            app_id.to_string(),
        )
    }
}

/// What the authenticator and browser put into an assertion.
///
/// Defaults to a well-formed answer to `challenge`; override fields to build
/// a bad one.
pub struct Assertion {
    pub nonce: Vec<u8>,
    pub origin: String,
    pub type_: String,
    /// String whose SHA-256 goes into the authenticator data
    pub signed_rp_id: String,
    pub flags: u8,
    pub sign_count: u32,
    pub appid: Option<bool>,
}

impl Assertion {
    pub fn for_challenge(challenge: &Challenge) -> Self {
        Self {
            nonce: challenge.nonce.clone(),
            origin: challenge.origin.clone(),
            type_: "webauthn.get".to_string(),
            signed_rp_id: challenge.rp_id.clone(),
            flags: 0x01,
            sign_count: 0,
            appid: None,
        }
    }

    pub fn authenticator_data(&self) -> Vec<u8> {
        let mut data = Sha256::digest(self.signed_rp_id.as_bytes()).to_vec();
        data.push(self.flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        data
    }

    pub fn client_data_json(&self) -> Vec<u8> {
        serde_json::json!({
            "type": self.type_,
            "challenge": encoding::encode(&self.nonce),
            "origin": self.origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }

    /// The JSON the browser posts back
    pub fn sign(&self, key: &TestKey) -> String {
        let authenticator_data = self.authenticator_data();
        let client_data_json = self.client_data_json();

        let mut message = authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: Signature = key.signing.sign(&message);

        let mut extensions = serde_json::Map::new();
        if let Some(appid) = self.appid {
            extensions.insert("appid".to_string(), appid.into());
        }

        serde_json::json!({
            "id": encoding::encode(&key.key_handle),
            "rawId": encoding::encode(&key.key_handle),
            "type": "public-key",
            "response": {
                "clientDataJSON": encoding::encode(&client_data_json),
                "authenticatorData": encoding::encode(&authenticator_data),
                "signature": encoding::encode(signature.to_der().as_bytes()),
                "userHandle": null,
            },
            "clientExtensionResults": extensions,
        })
        .to_string()
    }
}
