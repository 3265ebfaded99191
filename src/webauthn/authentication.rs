//! # Assertion Verification
//!
//! Checks the signed assertion a security key returns for a challenge issued
//! by [`ChallengeGenerator`](crate::webauthn::challenge::ChallengeGenerator).
//!
//! ## Steps
//! 1. Parse the payload (`MalformedResponse` if it isn't an assertion)
//! 2. Find the credential among the user's own keys (`UnknownCredential`)
//! 3. Pick the expected rp id: the challenge's rp id, or the credential's
//!    stored app id when the client reports the `appid` extension was used
//! 4. Check client data type, challenge, origin, rp id hash, user presence and
//!    the signature over `authenticatorData || SHA-256(clientDataJSON)`
//!    (`SignatureInvalid`)
//! 5. Apply the [`SignCountPolicy`]
//! 6. Stamp `last_used_at`, persist, and drop the challenge from the session
//!
//! A rejected assertion leaves the challenge in the session.

use crate::db::{Credential, CredentialStore};
use crate::error::VerificationError;
use crate::factors::{FactorKind, SecondFactorVerifier};
use crate::session::{SessionError, SessionStore};
use crate::webauthn::authenticator_data::AuthenticatorData;
use crate::webauthn::challenge::{clear_challenge, load_challenge, Challenge};
use crate::webauthn::cose::PublicKey;
use crate::webauthn::encoding;
use crate::webauthn::types::{
    AssertionCredential, CollectedClientData, CLIENT_DATA_TYPE_GET, PUBLIC_KEY_CREDENTIAL_TYPE,
};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// How the authenticator's signature counter is treated.
///
/// Counters are meant to grow on every use so a cloned authenticator shows up
/// as a counter going backwards. `Ignore` compares against a fixed counter of
/// 0, which accepts any value and leaves the stored counter alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignCountPolicy {
    #[default]
    Ignore,
    /// Reject counters that do not increase over the stored value and persist
    /// the new value on success.
    Enforce,
}

/// An assertion payload with every binary field decoded.
#[derive(Debug, Clone)]
pub struct ParsedAssertion {
    pub key_handle: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub client_data: CollectedClientData,
    pub authenticator_data_raw: Vec<u8>,
    pub authenticator_data: AuthenticatorData,
    pub signature: Vec<u8>,
    /// Client claims the legacy `appid` extension was exercised
    pub appid_used: bool,
}

impl ParsedAssertion {
    pub fn parse(payload: &str) -> Result<Self, VerificationError> {
        let malformed = |what: &str| VerificationError::MalformedResponse(what.to_string());

        let credential: AssertionCredential =
            serde_json::from_str(payload).map_err(|e| VerificationError::MalformedResponse(e.to_string()))?;
        if credential.type_ != PUBLIC_KEY_CREDENTIAL_TYPE {
            return Err(malformed("credential type is not public-key"));
        }

        let key_handle = encoding::decode(&credential.id).map_err(|_| malformed("id is not base64url"))?;
        if let Some(raw_id) = &credential.raw_id {
            let raw = encoding::decode(raw_id).map_err(|_| malformed("rawId is not base64url"))?;
            if raw != key_handle {
                return Err(malformed("id and rawId differ"));
            }
        }
        if key_handle.is_empty() {
            return Err(malformed("empty credential id"));
        }

        let client_data_json = encoding::decode(&credential.response.client_data_json)
            .map_err(|_| malformed("clientDataJSON is not base64url"))?;
        let client_data: CollectedClientData = serde_json::from_slice(&client_data_json)
            .map_err(|_| malformed("clientDataJSON is not valid client data"))?;

        let authenticator_data_raw = encoding::decode(&credential.response.authenticator_data)
            .map_err(|_| malformed("authenticatorData is not base64url"))?;
        let authenticator_data = AuthenticatorData::parse(&authenticator_data_raw)
            .map_err(|e| VerificationError::MalformedResponse(e.to_string()))?;

        let signature = encoding::decode(&credential.response.signature)
            .map_err(|_| malformed("signature is not base64url"))?;

        Ok(Self {
            key_handle,
            client_data_json,
            client_data,
            authenticator_data_raw,
            authenticator_data,
            signature,
            appid_used: credential.client_extension_results.appid.unwrap_or(false),
        })
    }

    /// Bytes the authenticator signed
    fn signed_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.authenticator_data_raw.len() + 32);
        message.extend_from_slice(&self.authenticator_data_raw);
        message.extend_from_slice(&Sha256::digest(&self.client_data_json));
        message
    }
}

/// Verifies WebAuthn / U2F assertions against the session's challenge.
#[derive(Clone)]
pub struct AssertionVerifier {
    store: Arc<dyn CredentialStore>,
    sign_count: SignCountPolicy,
}

impl AssertionVerifier {
    pub fn new(store: Arc<dyn CredentialStore>, sign_count: SignCountPolicy) -> Self {
        Self { store, sign_count }
    }

    /// Verify `payload` against `challenge` and record the use on success.
    ///
    /// Returns the updated credential. Does not touch the session; see
    /// [`SecondFactorVerifier::verify`] for the full flow.
    pub async fn verify_assertion(
        &self,
        user_id: &str,
        challenge: &Challenge,
        payload: &str,
    ) -> Result<Credential, VerificationError> {
        let assertion = ParsedAssertion::parse(payload)?;

        let mut credential = self
            .store
            .find_credential(user_id, &assertion.key_handle)
            .await?
            .ok_or(VerificationError::UnknownCredential)?;

        // The extension flag only selects which binding to check. The binding
        // string is the one stored with the key, never one from the client.
        let expected_rp_id = if assertion.appid_used {
            credential.app_id.as_str()
        } else {
            challenge.rp_id.as_str()
        };

        check_binding(&assertion, challenge, expected_rp_id)?;

        let public_key = PublicKey::from_stored(&credential.public_key).map_err(|e| {
            tracing::error!(user_id, error = %e, "Stored public key can't be decoded");
            VerificationError::SignatureInvalid("stored public key unusable".to_string())
        })?;
        public_key
            .verify(&assertion.signed_message(), &assertion.signature)
            .map_err(|e| VerificationError::SignatureInvalid(e.to_string()))?;

        let received = assertion.authenticator_data.sign_count;
        match self.sign_count {
            SignCountPolicy::Ignore => {}
            SignCountPolicy::Enforce => {
                let current = credential.sign_count;
                if (received > 0 || current > 0) && received <= current {
                    tracing::warn!(user_id, received, current, "Signature counter did not increase");
                    return Err(VerificationError::SignatureInvalid(
                        "signature counter did not increase".to_string(),
                    ));
                }
                credential.sign_count = received;
            }
        }

        credential.last_used_at = Some(Utc::now());
        self.store.update_credential(&credential).await?;

        Ok(credential)
    }
}

fn check_binding(
    assertion: &ParsedAssertion,
    challenge: &Challenge,
    expected_rp_id: &str,
) -> Result<(), VerificationError> {
    let invalid = |what: &str| VerificationError::SignatureInvalid(what.to_string());
    let client_data = &assertion.client_data;

    if client_data.type_ != CLIENT_DATA_TYPE_GET {
        return Err(invalid("client data type is not webauthn.get"));
    }

    let received_nonce = encoding::decode(&client_data.challenge).map_err(|_| invalid("challenge mismatch"))?;
    if !bool::from(received_nonce.as_slice().ct_eq(challenge.nonce.as_slice())) {
        return Err(invalid("challenge mismatch"));
    }

    if client_data.origin != challenge.origin {
        return Err(invalid("origin mismatch"));
    }

    let expected_hash = Sha256::digest(expected_rp_id.as_bytes());
    if expected_hash[..] != assertion.authenticator_data.rp_id_hash {
        return Err(invalid("rp id hash mismatch"));
    }

    if !assertion.authenticator_data.user_present() {
        return Err(invalid("user not present"));
    }

    Ok(())
}

#[async_trait]
impl SecondFactorVerifier for AssertionVerifier {
    fn kind(&self) -> FactorKind {
        FactorKind::WebAuthn
    }

    async fn verify(
        &self,
        user_id: &str,
        session: &dyn SessionStore,
        submission: &str,
    ) -> Result<(), VerificationError> {
        let challenge = match load_challenge(session).await {
            Ok(Some(challenge)) => challenge,
            Ok(None) => return Err(VerificationError::NoChallenge),
            Err(SessionError::Serialization(e)) => {
                tracing::warn!(user_id, error = %e, "Discarding unreadable challenge");
                return Err(VerificationError::NoChallenge);
            }
            Err(e) => return Err(e.into()),
        };

        match self.verify_assertion(user_id, &challenge, submission).await {
            Ok(credential) => {
                clear_challenge(session).await?;
                tracing::debug!(
                    user_id,
                    key_handle = %encoding::encode(&credential.key_handle),
                    "Assertion accepted"
                );
                Ok(())
            }
            Err(e) => {
                if !e.is_fatal() {
                    tracing::warn!(user_id, reason = %e, "Assertion rejected");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion_json(id: &str, raw_id: &str, client_data: &[u8], auth_data: &[u8]) -> String {
        serde_json::json!({
            "id": id,
            "rawId": raw_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": encoding::encode(client_data),
                "authenticatorData": encoding::encode(auth_data),
                "signature": encoding::encode(b"sig"),
            },
            "clientExtensionResults": { "appid": true }
        })
        .to_string()
    }

    fn client_data() -> Vec<u8> {
        br#"{"type":"webauthn.get","challenge":"AAAA","origin":"https://localhost:8000"}"#.to_vec()
    }

    #[test]
    fn parse_decodes_all_fields() {
        let id = encoding::encode(&[1, 2, 3]);
        let parsed = ParsedAssertion::parse(&assertion_json(&id, &id, &client_data(), &[0u8; 37])).unwrap();
        assert_eq!(parsed.key_handle, vec![1, 2, 3]);
        assert_eq!(parsed.signature, b"sig");
        assert_eq!(parsed.client_data.origin, "https://localhost:8000");
        assert!(parsed.appid_used);
    }

    #[test]
    fn parse_rejects_mismatched_raw_id() {
        let payload = assertion_json(
            &encoding::encode(&[1]),
            &encoding::encode(&[2]),
            &client_data(),
            &[0u8; 37],
        );
        assert!(matches!(
            ParsedAssertion::parse(&payload),
            Err(VerificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_rejects_wrong_credential_type() {
        let id = encoding::encode(&[1]);
        let mut payload: serde_json::Value =
            serde_json::from_str(&assertion_json(&id, &id, &client_data(), &[0u8; 37])).unwrap();

        payload["type"] = "bogus".into();
        assert!(matches!(
            ParsedAssertion::parse(&payload.to_string()),
            Err(VerificationError::MalformedResponse(_))
        ));

        payload.as_object_mut().unwrap().remove("type");
        assert!(matches!(
            ParsedAssertion::parse(&payload.to_string()),
            Err(VerificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_rejects_short_authenticator_data() {
        let id = encoding::encode(&[1]);
        let payload = assertion_json(&id, &id, &client_data(), &[0u8; 10]);
        assert!(matches!(
            ParsedAssertion::parse(&payload),
            Err(VerificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(matches!(
            ParsedAssertion::parse("not json"),
            Err(VerificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_extension_results_means_no_appid() {
        let id = encoding::encode(&[1]);
        let payload = serde_json::json!({
            "id": id,
            "type": "public-key",
            "response": {
                "clientDataJSON": encoding::encode(&client_data()),
                "authenticatorData": encoding::encode(&[0u8; 37]),
                "signature": encoding::encode(b"sig"),
            }
        })
        .to_string();
        assert!(!ParsedAssertion::parse(&payload).unwrap().appid_used);
    }

    struct UnreachableSession;

    #[async_trait]
    impl SessionStore for UnreachableSession {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, SessionError> {
            Err(SessionError::Backend(tower_sessions::session::Error::Store(
                tower_sessions::session_store::Error::Backend("connection refused".to_string()),
            )))
        }

        async fn put(&self, _key: &str, _value: serde_json::Value) -> Result<(), SessionError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn verifier() -> AssertionVerifier {
        AssertionVerifier::new(Arc::new(crate::db::MemoryStore::new()), SignCountPolicy::Ignore)
    }

    #[tokio::test]
    async fn corrupt_session_challenge_is_no_challenge() {
        let session = crate::session::MemorySession::new();
        session
            .put(crate::webauthn::challenge::CHALLENGE_SESSION_KEY, serde_json::json!("garbage"))
            .await
            .unwrap();

        let err = verifier().verify("alice", &session, "{}").await.unwrap_err();
        assert!(matches!(err, VerificationError::NoChallenge));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn session_backend_failure_is_fatal() {
        let err = verifier()
            .verify("alice", &UnreachableSession, "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Session(SessionError::Backend(_))));
        assert!(err.is_fatal());
    }
}
