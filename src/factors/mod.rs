//! # Second Factors
//!
//! Every second factor follows one contract: take the proof the user
//! submitted, accept or reject it, and on acceptance change the minimum of
//! stored state (consume a code, stamp a device, drop a challenge).
//!
//! - `backup_code`: single-use recovery codes
//! - `totp`: authenticator-app tokens
//! - the WebAuthn assertion verifier lives in [`crate::webauthn::authentication`]
//!
//! Which verifier runs is decided by the caller from the [`FactorKind`].

pub mod backup_code;
pub mod otp;
pub mod totp;

pub use backup_code::BackupCodeVerifier;
pub use totp::TotpVerifier;

use crate::error::VerificationError;
use crate::session::SessionStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactorKind {
    #[serde(rename = "webauthn")]
    WebAuthn,
    BackupCode,
    Totp,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FactorKind::WebAuthn => "webauthn",
            FactorKind::BackupCode => "backup-code",
            FactorKind::Totp => "totp",
        })
    }
}

#[async_trait]
pub trait SecondFactorVerifier: Send + Sync {
    fn kind(&self) -> FactorKind;

    /// Check `submission` for `user_id`.
    ///
    /// `session` is the requesting browser session; only the WebAuthn
    /// verifier uses it.
    async fn verify(
        &self,
        user_id: &str,
        session: &dyn SessionStore,
        submission: &str,
    ) -> Result<(), VerificationError>;
}
