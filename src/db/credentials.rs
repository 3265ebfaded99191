//! # Credential Database Operations
//!
//! CRUD for registered security keys.
//!
//! ## Security Note
//! Only public keys are stored - private keys never leave the authenticator.
//! Lookups by key handle are always scoped to the owning user so a key handle
//! belonging to someone else is indistinguishable from an unknown one.

use crate::db::models::Credential;
use crate::db::StoreResult;
use sqlx::SqlitePool;

/// Save a newly registered credential.
///
/// Fails with `StoreError::Conflict` if the key handle is already registered
/// (to anyone).
pub async fn save_credential(pool: &SqlitePool, credential: &Credential) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO webauthn_credentials
         (key_handle, user_id, public_key, app_id, sign_count, created_at, last_used_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&credential.key_handle)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(&credential.app_id)
    .bind(credential.sign_count)
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all credentials for a user, oldest first.
///
/// Used to build the allow-list of a new challenge. Empty if the user has no
/// keys.
pub async fn find_by_user_id(pool: &SqlitePool, user_id: &str) -> StoreResult<Vec<Credential>> {
    let credentials = sqlx::query_as::<_, Credential>(
        "SELECT * FROM webauthn_credentials WHERE user_id = ? ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(credentials)
}

/// Find one of `user_id`'s credentials by key handle.
pub async fn find_for_user(
    pool: &SqlitePool,
    user_id: &str,
    key_handle: &[u8],
) -> StoreResult<Option<Credential>> {
    let credential = sqlx::query_as::<_, Credential>(
        "SELECT * FROM webauthn_credentials WHERE user_id = ? AND key_handle = ?",
    )
    .bind(user_id)
    .bind(key_handle)
    .fetch_optional(pool)
    .await?;

    Ok(credential)
}

/// Record a successful use: signature counter and last-used timestamp.
pub async fn update_usage(pool: &SqlitePool, credential: &Credential) -> StoreResult<()> {
    sqlx::query(
        "UPDATE webauthn_credentials
         SET sign_count = ?, last_used_at = ?
         WHERE key_handle = ? AND user_id = ?",
    )
    .bind(credential.sign_count)
    .bind(credential.last_used_at)
    .bind(&credential.key_handle)
    .bind(&credential.user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_credential(pool: &SqlitePool, user_id: &str, key_handle: &[u8]) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM webauthn_credentials WHERE user_id = ? AND key_handle = ?")
        .bind(user_id)
        .bind(key_handle)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
