//! # Database Models
//!
//! Rows of the three second-factor tables. Each user may own any number of
//! security keys, backup codes and TOTP devices; the rows only reference the
//! owner by id because accounts and password login live elsewhere.
//!
//! Timestamps are `DateTime<Utc>` and stored by SQLx as RFC3339 text.

use chrono::{DateTime, Utc};
use rand::{distributions::Uniform, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered WebAuthn or legacy U2F security key.
///
/// ## Binding
/// Keys registered through the old U2F JavaScript API are bound to an
/// *app id* (usually a full origin such as `https://localhost:8000`), while
/// WebAuthn keys are bound to a relying-party id (`localhost`). `app_id` holds
/// whichever string the key was registered under; the assertion verifier uses
/// it when the client reports that the `appid` extension was exercised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    /// Raw credential id returned by the authenticator. Globally unique.
    pub key_handle: Vec<u8>,

    /// Owner of the key
    pub user_id: String,

    /// COSE_Key encoded public key
    pub public_key: Vec<u8>,

    /// App id / rp id the key was registered under
    pub app_id: String,

    /// Last signature counter seen from the authenticator
    pub sign_count: u32,

    pub created_at: DateTime<Utc>,

    /// Updated each time the key completes a login
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(user_id: String, key_handle: Vec<u8>, public_key: Vec<u8>, app_id: String) -> Self {
        Self {
            key_handle,
            user_id,
            public_key,
            app_id,
            sign_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

/// A single-use recovery code.
///
/// `(user_id, code)` is unique; a successful login deletes the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BackupCode {
    pub id: String,
    pub user_id: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl BackupCode {
    /// Number of codes handed out per batch
    pub const BATCH_SIZE: usize = 10;
    /// Characters per code
    pub const LENGTH: usize = 8;

    const ALPHABET: &'static [u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    pub fn new(user_id: String, code: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            code,
            created_at: Utc::now(),
        }
    }

    /// Generate a fresh batch of distinct random codes for `user_id`.
    ///
    /// Codes within a batch never repeat, which keeps the `(user_id, code)`
    /// uniqueness constraint satisfied on insert.
    pub fn generate_batch(user_id: &str) -> Vec<BackupCode> {
        let mut rng = rand::rngs::OsRng;
        let dist = Uniform::from(0..Self::ALPHABET.len());
        let mut codes: Vec<BackupCode> = Vec::with_capacity(Self::BATCH_SIZE);

        while codes.len() < Self::BATCH_SIZE {
            let code: String = (0..Self::LENGTH)
                .map(|_| Self::ALPHABET[rng.sample(dist)] as char)
                .collect();
            if codes.iter().any(|c| c.code == code) {
                continue;
            }
            codes.push(BackupCode::new(user_id.to_string(), code));
        }

        codes
    }
}

/// A TOTP authenticator app (Google Authenticator and friends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TotpDevice {
    pub id: String,
    pub user_id: String,

    /// Raw HMAC key shared with the app
    pub shared_secret: Vec<u8>,

    /// Time step of the last accepted token. Tokens for this step or earlier
    /// are rejected, so a token can't be replayed inside its window.
    pub last_t: i64,

    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TotpDevice {
    pub fn new(user_id: String, shared_secret: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            shared_secret,
            last_t: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_code_batch_is_distinct_and_well_formed() {
        let codes = BackupCode::generate_batch("alice");
        assert_eq!(codes.len(), BackupCode::BATCH_SIZE);

        for code in &codes {
            assert_eq!(code.user_id, "alice");
            assert_eq!(code.code.len(), BackupCode::LENGTH);
            assert!(code.code.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }

        let mut seen: Vec<&str> = codes.iter().map(|c| c.code.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
    }

    #[test]
    fn new_credential_starts_unused() {
        let cred = Credential::new("bob".into(), vec![1, 2, 3], vec![9], "localhost".into());
        assert_eq!(cred.sign_count, 0);
        assert!(cred.last_used_at.is_none());
    }
}
