use crate::db::models::BackupCode;
use crate::db::StoreResult;
use sqlx::SqlitePool;

pub async fn save_all(pool: &SqlitePool, codes: &[BackupCode]) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    for code in codes {
        sqlx::query(
            "INSERT INTO backup_codes (id, user_id, code, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&code.id)
        .bind(&code.user_id)
        .bind(&code.code)
        .bind(code.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find(pool: &SqlitePool, user_id: &str, code: &str) -> StoreResult<Vec<BackupCode>> {
    let codes = sqlx::query_as::<_, BackupCode>(
        "SELECT * FROM backup_codes WHERE user_id = ? AND code = ?",
    )
    .bind(user_id)
    .bind(code)
    .fetch_all(pool)
    .await?;

    Ok(codes)
}

// Single statement: the match and the delete happen atomically, so only one
// of two concurrent submissions of the same code sees a row removed.
pub async fn delete(pool: &SqlitePool, user_id: &str, code: &str) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM backup_codes WHERE user_id = ? AND code = ?")
        .bind(user_id)
        .bind(code)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
