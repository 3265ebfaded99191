//! # Database Module
//!
//! Persistent storage for registered second factors:
//! - `models`: row types (credentials, backup codes, TOTP devices)
//! - `credentials`, `backup_codes`, `totp_devices`: SQLx queries per table
//! - `memory`: an in-process store with the same semantics, for tests and
//!   embedding
//!
//! The verifiers never talk to SQLx directly; they go through the
//! [`CredentialStore`] trait so the storage backend is a collaborator.

pub mod backup_codes;
pub mod credentials;
pub mod memory;
pub mod models;
pub mod totp_devices;

pub use memory::MemoryStore;
pub use models::{BackupCode, Credential, TotpDevice};

use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique key (key handle, backup code) already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
            _ => StoreError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed-record store holding each user's registered second factors.
///
/// Every mutating operation must be a single atomic step with respect to
/// concurrent requests from the same user. In particular
/// [`delete_backup_code`](CredentialStore::delete_backup_code) reports how many
/// rows it removed so two simultaneous submissions of one code can't both win.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_credentials_for_user(&self, user_id: &str) -> StoreResult<Vec<Credential>>;

    /// Look up a key handle among `user_id`'s credentials only.
    async fn find_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<Option<Credential>>;

    /// Persist `sign_count` and `last_used_at`.
    async fn update_credential(&self, credential: &Credential) -> StoreResult<()>;

    async fn add_credential(&self, credential: &Credential) -> StoreResult<()>;

    /// Returns false if the user owns no such key.
    async fn delete_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<bool>;

    async fn find_backup_codes(&self, user_id: &str, code: &str) -> StoreResult<Vec<BackupCode>>;

    /// Delete every row matching `(user_id, code)`; returns the number removed.
    async fn delete_backup_code(&self, user_id: &str, code: &str) -> StoreResult<u64>;

    async fn add_backup_codes(&self, codes: &[BackupCode]) -> StoreResult<()>;

    async fn find_totp_devices(&self, user_id: &str) -> StoreResult<Vec<TotpDevice>>;

    /// Persist `last_t` and `last_used_at` if `last_t` moves forward.
    ///
    /// Returns false when the stored step is already at or past the new one,
    /// i.e. another request accepted a token for that step first.
    async fn update_totp_device(&self, device: &TotpDevice) -> StoreResult<bool>;

    async fn add_totp_device(&self, device: &TotpDevice) -> StoreResult<()>;
}

/// SQLite-backed [`CredentialStore`].
///
/// Cloning is cheap, the pool is reference counted.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_credentials_for_user(&self, user_id: &str) -> StoreResult<Vec<Credential>> {
        credentials::find_by_user_id(&self.pool, user_id).await
    }

    async fn find_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<Option<Credential>> {
        credentials::find_for_user(&self.pool, user_id, key_handle).await
    }

    async fn update_credential(&self, credential: &Credential) -> StoreResult<()> {
        credentials::update_usage(&self.pool, credential).await
    }

    async fn add_credential(&self, credential: &Credential) -> StoreResult<()> {
        credentials::save_credential(&self.pool, credential).await
    }

    async fn delete_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<bool> {
        credentials::delete_credential(&self.pool, user_id, key_handle).await
    }

    async fn find_backup_codes(&self, user_id: &str, code: &str) -> StoreResult<Vec<BackupCode>> {
        backup_codes::find(&self.pool, user_id, code).await
    }

    async fn delete_backup_code(&self, user_id: &str, code: &str) -> StoreResult<u64> {
        backup_codes::delete(&self.pool, user_id, code).await
    }

    async fn add_backup_codes(&self, codes: &[BackupCode]) -> StoreResult<()> {
        backup_codes::save_all(&self.pool, codes).await
    }

    async fn find_totp_devices(&self, user_id: &str) -> StoreResult<Vec<TotpDevice>> {
        totp_devices::find_by_user_id(&self.pool, user_id).await
    }

    async fn update_totp_device(&self, device: &TotpDevice) -> StoreResult<bool> {
        totp_devices::update_usage(&self.pool, device).await
    }

    async fn add_totp_device(&self, device: &TotpDevice) -> StoreResult<()> {
        totp_devices::save_device(&self.pool, device).await
    }
}
