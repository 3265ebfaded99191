//! # Authentication Challenges
//!
//! A challenge is issued when the user reaches the security-key step of the
//! login, shipped to the browser as [`CredentialRequestOptions`], and kept in
//! the session under [`CHALLENGE_SESSION_KEY`] until an assertion consumes it.
//! There is at most one outstanding challenge per session; issuing a new one
//! replaces the old.

use crate::db::{CredentialStore, StoreError};
use crate::session::{SessionError, SessionStore};
use crate::webauthn::encoding;
use crate::webauthn::types::{
    AllowCredential, CredentialRequestOptions, PublicKeyCredentialRequestOptions, RequestExtensions,
    UserVerification, PUBLIC_KEY_CREDENTIAL_TYPE,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session key holding the outstanding challenge
pub const CHALLENGE_SESSION_KEY: &str = "webauthn_sign_request";

pub const NONCE_LEN: usize = 32;

/// Where assertions are expected to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// WebAuthn rp id, e.g. `localhost`
    pub id: String,
    /// Expected `origin` in client data, e.g. `https://localhost:8000`
    pub origin: String,
    /// Legacy U2F app id sent in the `appid` extension
    pub app_id: Option<String>,
    pub timeout_ms: u32,
}

/// Server-side record of an issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(with = "encoding::bytes")]
    pub nonce: Vec<u8>,
    pub rp_id: String,
    #[serde(with = "encoding::bytes_list")]
    pub allowed_credentials: Vec<Vec<u8>>,
    pub app_id: Option<String>,
    pub origin: String,
    pub timeout_ms: u32,
    pub user_verification: UserVerification,
}

impl Challenge {
    /// Build a challenge with a fresh random nonce.
    pub fn new(relying_party: &RelyingParty, allowed_credentials: Vec<Vec<u8>>) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        Self {
            nonce,
            rp_id: relying_party.id.clone(),
            allowed_credentials,
            app_id: relying_party.app_id.clone(),
            origin: relying_party.origin.clone(),
            timeout_ms: relying_party.timeout_ms,
            user_verification: UserVerification::Preferred,
        }
    }

    /// The options object sent to the browser.
    pub fn request_options(&self) -> CredentialRequestOptions {
        CredentialRequestOptions {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: encoding::encode(&self.nonce),
                timeout: self.timeout_ms,
                rp_id: self.rp_id.clone(),
                allow_credentials: self
                    .allowed_credentials
                    .iter()
                    .map(|id| AllowCredential {
                        type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
                        id: encoding::encode(id),
                    })
                    .collect(),
                user_verification: self.user_verification,
                extensions: self
                    .app_id
                    .as_ref()
                    .map(|appid| RequestExtensions { appid: appid.clone() }),
            },
        }
    }
}

/// Builds challenges listing every key the user has registered.
#[derive(Clone)]
pub struct ChallengeGenerator {
    store: Arc<dyn CredentialStore>,
    relying_party: RelyingParty,
}

impl ChallengeGenerator {
    pub fn new(store: Arc<dyn CredentialStore>, relying_party: RelyingParty) -> Self {
        Self { store, relying_party }
    }

    pub fn relying_party(&self) -> &RelyingParty {
        &self.relying_party
    }

    /// Create a challenge for `user_id`. Nothing is persisted; the caller
    /// stores the result with [`store_challenge`].
    pub async fn generate(&self, user_id: &str) -> Result<Challenge, StoreError> {
        let allowed = self
            .store
            .find_credentials_for_user(user_id)
            .await?
            .into_iter()
            .map(|c| c.key_handle)
            .collect();

        Ok(Challenge::new(&self.relying_party, allowed))
    }
}

pub async fn store_challenge(session: &dyn SessionStore, challenge: &Challenge) -> Result<(), SessionError> {
    session
        .put(CHALLENGE_SESSION_KEY, serde_json::to_value(challenge)?)
        .await
}

pub async fn load_challenge(session: &dyn SessionStore) -> Result<Option<Challenge>, SessionError> {
    match session.get(CHALLENGE_SESSION_KEY).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn clear_challenge(session: &dyn SessionStore) -> Result<(), SessionError> {
    session.delete(CHALLENGE_SESSION_KEY).await
}
