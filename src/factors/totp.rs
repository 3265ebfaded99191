use crate::db::{CredentialStore, TotpDevice};
use crate::error::VerificationError;
use crate::factors::otp;
use crate::factors::{FactorKind, SecondFactorVerifier};
use crate::session::SessionStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Steps of clock drift accepted either side of the current one
pub const DEFAULT_TOLERANCE: i64 = 1;

pub const TOKEN_LEN: usize = otp::DIGITS;

impl TotpDevice {
    pub fn validate_token(&mut self, token: &str, tolerance: i64) -> bool {
        self.validate_token_at(token, Utc::now().timestamp(), tolerance)
    }

    /// Accept `token` if it matches a time step within `tolerance` of
    /// `unix_secs` that is newer than the last accepted one. Advances
    /// `last_t` on success.
    pub fn validate_token_at(&mut self, token: &str, unix_secs: i64, tolerance: i64) -> bool {
        let current = otp::time_step(unix_secs);

        for t in (current - tolerance)..=(current + tolerance) {
            if t < 0 || t <= self.last_t {
                continue;
            }
            let expected = otp::token_for_step(&self.shared_secret, t);
            if bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
                self.last_t = t;
                return true;
            }
        }

        false
    }
}

/// Exactly six ASCII digits
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_digit())
}

pub struct TotpVerifier {
    store: Arc<dyn CredentialStore>,
    tolerance: i64,
}

impl TotpVerifier {
    pub fn new(store: Arc<dyn CredentialStore>, tolerance: i64) -> Self {
        Self { store, tolerance }
    }
}

#[async_trait]
impl SecondFactorVerifier for TotpVerifier {
    fn kind(&self) -> FactorKind {
        FactorKind::Totp
    }

    async fn verify(
        &self,
        user_id: &str,
        _session: &dyn SessionStore,
        submission: &str,
    ) -> Result<(), VerificationError> {
        let token = submission.trim();
        if !is_well_formed(token) {
            return Err(VerificationError::MalformedToken);
        }

        // First device that accepts the token wins
        for mut device in self.store.find_totp_devices(user_id).await? {
            if device.validate_token(token, self.tolerance) {
                device.last_used_at = Some(Utc::now());
                if !self.store.update_totp_device(&device).await? {
                    tracing::warn!(user_id, device_id = %device.id, "TOTP token already used");
                    return Err(VerificationError::InvalidTotpToken);
                }
                tracing::debug!(user_id, device_id = %device.id, "TOTP token accepted");
                return Ok(());
            }
        }

        tracing::warn!(user_id, "TOTP token rejected");
        Err(VerificationError::InvalidTotpToken)
    }
}
