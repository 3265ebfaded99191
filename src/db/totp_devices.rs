use crate::db::models::TotpDevice;
use crate::db::StoreResult;
use sqlx::SqlitePool;

pub async fn save_device(pool: &SqlitePool, device: &TotpDevice) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO totp_devices (id, user_id, shared_secret, last_t, created_at, last_used_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&device.id)
    .bind(&device.user_id)
    .bind(&device.shared_secret)
    .bind(device.last_t)
    .bind(device.created_at)
    .bind(device.last_used_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_user_id(pool: &SqlitePool, user_id: &str) -> StoreResult<Vec<TotpDevice>> {
    let devices = sqlx::query_as::<_, TotpDevice>(
        "SELECT * FROM totp_devices WHERE user_id = ? ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(devices)
}

/// Advance `last_t` and stamp `last_used_at`.
///
/// Returns false if the stored `last_t` was already at or past the device's,
/// which is how a second acceptance of the same time step shows up.
pub async fn update_usage(pool: &SqlitePool, device: &TotpDevice) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE totp_devices
         SET last_t = ?, last_used_at = ?
         WHERE id = ? AND last_t < ?",
    )
    .bind(device.last_t)
    .bind(device.last_used_at)
    .bind(&device.id)
    .bind(device.last_t)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
