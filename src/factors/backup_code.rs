use crate::db::CredentialStore;
use crate::error::VerificationError;
use crate::factors::{FactorKind, SecondFactorVerifier};
use crate::session::SessionStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Consumes single-use backup codes.
///
/// Verification is one atomic delete of the matching row: the number of rows
/// removed decides the outcome, so two concurrent submissions of the same code
/// can never both succeed.
pub struct BackupCodeVerifier {
    store: Arc<dyn CredentialStore>,
}

impl BackupCodeVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SecondFactorVerifier for BackupCodeVerifier {
    fn kind(&self) -> FactorKind {
        FactorKind::BackupCode
    }

    async fn verify(
        &self,
        user_id: &str,
        _session: &dyn SessionStore,
        submission: &str,
    ) -> Result<(), VerificationError> {
        let code = submission.trim();
        if code.is_empty() {
            return Err(VerificationError::InvalidBackupCode);
        }

        match self.store.delete_backup_code(user_id, code).await? {
            0 => {
                tracing::warn!(user_id, "Backup code rejected");
                Err(VerificationError::InvalidBackupCode)
            }
            1 => {
                tracing::debug!(user_id, "Backup code consumed");
                Ok(())
            }
            count => {
                tracing::error!(user_id, count, "More than one backup code matched a single submission");
                Err(VerificationError::IntegrityFault { count })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BackupCode, MemoryStore};
    use crate::session::MemorySession;

    #[tokio::test]
    async fn code_is_consumed_once() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_backup_codes(&[BackupCode::new("alice".into(), "abc123".into())])
            .await
            .unwrap();
        let verifier = BackupCodeVerifier::new(store.clone());
        let session = MemorySession::new();

        verifier.verify("alice", &session, "abc123").await.unwrap();
        assert!(matches!(
            verifier.verify("alice", &session, "abc123").await,
            Err(VerificationError::InvalidBackupCode)
        ));
        assert!(store.find_backup_codes("alice", "abc123").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_backup_codes(&[BackupCode::new("alice".into(), "abc123".into())])
            .await
            .unwrap();
        let verifier = BackupCodeVerifier::new(store);

        verifier.verify("alice", &MemorySession::new(), "  abc123\n").await.unwrap();
    }

    #[tokio::test]
    async fn another_users_code_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_backup_codes(&[BackupCode::new("alice".into(), "abc123".into())])
            .await
            .unwrap();
        let verifier = BackupCodeVerifier::new(store.clone());

        assert!(matches!(
            verifier.verify("bob", &MemorySession::new(), "abc123").await,
            Err(VerificationError::InvalidBackupCode)
        ));
        assert_eq!(store.find_backup_codes("alice", "abc123").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_rows_are_an_integrity_fault() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_backup_code_unchecked(BackupCode::new("alice".into(), "dup".into()))
            .await;
        store
            .insert_backup_code_unchecked(BackupCode::new("alice".into(), "dup".into()))
            .await;
        let verifier = BackupCodeVerifier::new(store);

        let err = verifier.verify("alice", &MemorySession::new(), "dup").await.unwrap_err();
        assert!(matches!(err, VerificationError::IntegrityFault { count: 2 }));
        assert!(err.is_fatal());
    }
}
