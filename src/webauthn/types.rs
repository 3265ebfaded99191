//! # WebAuthn Wire Types
//!
//! JSON exchanged with the browser.
//!
//! ## Server → client
//! ```json
//! { "publicKey": { "challenge": "...", "timeout": 60000, "rpId": "localhost",
//!                  "allowCredentials": [{ "type": "public-key", "id": "..." }],
//!                  "userVerification": "preferred",
//!                  "extensions": { "appid": "https://localhost:8000" } } }
//! ```
//! The object under `publicKey` is passed to `navigator.credentials.get()`.
//!
//! ## Client → server
//! ```json
//! { "id": "...", "rawId": "...", "type": "public-key",
//!   "response": { "clientDataJSON": "...", "authenticatorData": "...", "signature": "..." },
//!   "clientExtensionResults": { "appid": true } }
//! ```
//! All binary values are base64url without padding.

use serde::{Deserialize, Serialize};

pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";
pub const CLIENT_DATA_TYPE_GET: &str = "webauthn.get";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// Options wrapper handed to `navigator.credentials.get()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequestOptions {
    pub public_key: PublicKeyCredentialRequestOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: String,
    pub timeout: u32,
    pub rp_id: String,
    pub allow_credentials: Vec<AllowCredential>,
    pub user_verification: UserVerification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<RequestExtensions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowCredential {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
}

/// Client extension inputs. `appid` lets keys registered with the legacy U2F
/// API answer a WebAuthn request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExtensions {
    pub appid: String,
}

/// `PublicKeyCredential` returned by `navigator.credentials.get()`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCredential {
    pub id: String,
    #[serde(default)]
    pub raw_id: Option<String>,
    /// Always `public-key`
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(default)]
    pub client_extension_results: ClientExtensionResults,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientExtensionResults {
    /// Whether the authenticator answered for the legacy app id. Only a hint:
    /// the binding string itself always comes from the stored credential.
    #[serde(default)]
    pub appid: Option<bool>,
}

/// Decoded `clientDataJSON`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub type_: String,
    pub challenge: String,
    pub origin: String,
}
