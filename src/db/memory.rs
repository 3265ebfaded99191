//! In-process [`CredentialStore`].
//!
//! All tables sit behind one async mutex, so every trait operation is atomic
//! in the same way a single SQL statement is.

use crate::db::models::{BackupCode, Credential, TotpDevice};
use crate::db::{CredentialStore, StoreError, StoreResult};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    credentials: Vec<Credential>,
    backup_codes: Vec<BackupCode>,
    totp_devices: Vec<TotpDevice>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a backup code row without the uniqueness check.
    ///
    /// Only useful for exercising the integrity-fault path, which needs a
    /// state the SQLite schema refuses to hold.
    pub async fn insert_backup_code_unchecked(&self, code: BackupCode) {
        self.tables.lock().await.backup_codes.push(code);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_credentials_for_user(&self, user_id: &str) -> StoreResult<Vec<Credential>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .credentials
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<Option<Credential>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .credentials
            .iter()
            .find(|c| c.user_id == user_id && c.key_handle == key_handle)
            .cloned())
    }

    async fn update_credential(&self, credential: &Credential) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .credentials
            .iter_mut()
            .find(|c| c.user_id == credential.user_id && c.key_handle == credential.key_handle)
            .ok_or_else(|| StoreError::NotFound("credential".to_string()))?;

        stored.sign_count = credential.sign_count;
        stored.last_used_at = credential.last_used_at;
        Ok(())
    }

    async fn add_credential(&self, credential: &Credential) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.credentials.iter().any(|c| c.key_handle == credential.key_handle) {
            return Err(StoreError::Conflict("key handle already registered".to_string()));
        }
        tables.credentials.push(credential.clone());
        Ok(())
    }

    async fn delete_credential(&self, user_id: &str, key_handle: &[u8]) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.credentials.len();
        tables
            .credentials
            .retain(|c| !(c.user_id == user_id && c.key_handle == key_handle));
        Ok(tables.credentials.len() != before)
    }

    async fn find_backup_codes(&self, user_id: &str, code: &str) -> StoreResult<Vec<BackupCode>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .backup_codes
            .iter()
            .filter(|c| c.user_id == user_id && c.code == code)
            .cloned()
            .collect())
    }

    async fn delete_backup_code(&self, user_id: &str, code: &str) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.backup_codes.len();
        tables
            .backup_codes
            .retain(|c| !(c.user_id == user_id && c.code == code));
        Ok((before - tables.backup_codes.len()) as u64)
    }

    async fn add_backup_codes(&self, codes: &[BackupCode]) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        for code in codes {
            let taken = tables
                .backup_codes
                .iter()
                .any(|c| c.user_id == code.user_id && c.code == code.code);
            if taken {
                return Err(StoreError::Conflict("backup code already exists".to_string()));
            }
        }
        tables.backup_codes.extend_from_slice(codes);
        Ok(())
    }

    async fn find_totp_devices(&self, user_id: &str) -> StoreResult<Vec<TotpDevice>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .totp_devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_totp_device(&self, device: &TotpDevice) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .totp_devices
            .iter_mut()
            .find(|d| d.id == device.id)
            .ok_or_else(|| StoreError::NotFound("TOTP device".to_string()))?;

        if stored.last_t >= device.last_t {
            return Ok(false);
        }
        stored.last_t = device.last_t;
        stored.last_used_at = device.last_used_at;
        Ok(true)
    }

    async fn add_totp_device(&self, device: &TotpDevice) -> StoreResult<()> {
        self.tables.lock().await.totp_devices.push(device.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_lookup_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let cred = Credential::new("alice".into(), vec![7; 16], vec![1], "localhost".into());
        store.add_credential(&cred).await.unwrap();

        assert!(store.find_credential("alice", &[7; 16]).await.unwrap().is_some());
        assert!(store.find_credential("mallory", &[7; 16]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_key_handle_is_rejected() {
        let store = MemoryStore::new();
        let cred = Credential::new("alice".into(), vec![7; 16], vec![1], "localhost".into());
        store.add_credential(&cred).await.unwrap();

        let other = Credential::new("bob".into(), vec![7; 16], vec![2], "localhost".into());
        let err = store.add_credential(&other).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_backup_code_reports_rows_removed() {
        let store = MemoryStore::new();
        store
            .add_backup_codes(&[BackupCode::new("alice".into(), "abc123".into())])
            .await
            .unwrap();

        assert_eq!(store.delete_backup_code("bob", "abc123").await.unwrap(), 0);
        assert_eq!(store.delete_backup_code("alice", "abc123").await.unwrap(), 1);
        assert_eq!(store.delete_backup_code("alice", "abc123").await.unwrap(), 0);
    }
}
