//! # Application State
//!
//! Shared resources handed to every request handler. Axum clones the state
//! per request, so everything here is a pool handle or an `Arc`.

use crate::config::Config;
use crate::db::{CredentialStore, SqliteStore};
use crate::factors::{BackupCodeVerifier, FactorKind, SecondFactorVerifier, TotpVerifier};
use crate::webauthn::{AssertionVerifier, ChallengeGenerator};
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Connection pool, also used by the session store
    pub db: SqlitePool,

    pub challenges: ChallengeGenerator,

    webauthn: Arc<AssertionVerifier>,
    backup_codes: Arc<BackupCodeVerifier>,
    totp: Arc<TotpVerifier>,
}

impl AppState {
    /// Connect to the database, run migrations, and build the verifiers.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = SqlitePool::connect(&config.database_url).await?;

        let store = SqliteStore::new(db.clone());
        store.migrate().await?;

        Ok(Self::with_store(db, Arc::new(store), config))
    }

    /// Build the state around an existing store.
    pub fn with_store(db: SqlitePool, store: Arc<dyn CredentialStore>, config: &Config) -> Self {
        AppState {
            db,
            challenges: ChallengeGenerator::new(store.clone(), config.relying_party()),
            webauthn: Arc::new(AssertionVerifier::new(store.clone(), config.sign_count_policy())),
            backup_codes: Arc::new(BackupCodeVerifier::new(store.clone())),
            totp: Arc::new(TotpVerifier::new(store, config.totp_tolerance)),
        }
    }

    /// The verifier responsible for `kind`
    pub fn verifier(&self, kind: FactorKind) -> &dyn SecondFactorVerifier {
        match kind {
            FactorKind::WebAuthn => self.webauthn.as_ref(),
            FactorKind::BackupCode => self.backup_codes.as_ref(),
            FactorKind::Totp => self.totp.as_ref(),
        }
    }
}
