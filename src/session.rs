//! # Session Storage
//!
//! Transient state that has to survive between two HTTP requests of the same
//! browser session (the outstanding WebAuthn challenge, the id of the user who
//! passed password login) is kept in a small key-value store scoped to the
//! session. [`SessionStore`] is that store; the HTTP layer backs it with
//! `tower_sessions::Session`, tests use [`MemorySession`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tower_sessions::Session;

/// Set by the password step: the user who still owes a second factor
pub const PENDING_USER_KEY: &str = "pending_user_id";

/// Set once the second factor is verified
pub const USER_KEY: &str = "user_id";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session backend error: {0}")]
    Backend(#[from] tower_sessions::session::Error),

    #[error("Session value is not valid: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value storage scoped to one session.
///
/// Callers never read and write the same session concurrently; ordinary
/// per-request session locking covers that.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError>;

    async fn put(&self, key: &str, value: Value) -> Result<(), SessionError>;

    async fn delete(&self, key: &str) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionStore for Session {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(Session::get::<Value>(self, key).await?)
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), SessionError> {
        Ok(self.insert(key, value).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.remove::<Value>(key).await?;
        Ok(())
    }
}

/// Session store living in memory, one instance per simulated session.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_session_put_get_delete() {
        let session = MemorySession::new();
        assert!(session.get("k").await.unwrap().is_none());

        session.put("k", json!({"a": 1})).await.unwrap();
        assert_eq!(session.get("k").await.unwrap(), Some(json!({"a": 1})));

        session.delete("k").await.unwrap();
        assert!(session.get("k").await.unwrap().is_none());
    }
}
