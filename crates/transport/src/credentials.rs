use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque authentication material bound to one paired account. The blob is
/// produced and consumed by the protocol backend; this crate only moves it
/// between the backend and durable storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCredentials(pub serde_json::Value);

impl SessionCredentials {
    /// A null blob means no pairing has completed yet.
    pub fn is_registered(&self) -> bool {
        !self.0.is_null()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<SessionCredentials>>;
    async fn persist(&self, credentials: &SessionCredentials) -> anyhow::Result<()>;
}

/// Stores credentials as a single JSON file under the session directory,
/// surviving process restarts for the life of the pairing.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: session_dir.into().join("creds.json"),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> anyhow::Result<Option<SessionCredentials>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let credentials = serde_json::from_slice(&bytes).with_context(|| {
                    format!("malformed credential file '{}'", self.path.display())
                })?;
                Ok(Some(credentials))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read credential file '{}'", self.path.display())
            }),
        }
    }

    async fn persist(&self, credentials: &SessionCredentials) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        let bytes = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&self.path, bytes).await.with_context(|| {
            format!("failed to write credential file '{}'", self.path.display())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_session_dir() -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("wagate_creds_test_{suffix}"))
    }

    #[tokio::test]
    async fn load_returns_none_before_first_pairing() {
        let store = FileCredentialStore::new(temp_session_dir());
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips_across_instances() {
        let dir = temp_session_dir();
        let credentials =
            SessionCredentials(serde_json::json!({ "noiseKey": "abc", "registered": true }));

        let store = FileCredentialStore::new(&dir);
        store.persist(&credentials).await.expect("persist");

        let reopened = FileCredentialStore::new(&dir);
        let loaded = reopened.load().await.expect("load").expect("some");
        assert_eq!(loaded, credentials);
        assert!(loaded.is_registered());

        std::fs::remove_dir_all(dir).expect("cleanup");
    }

    #[tokio::test]
    async fn malformed_file_is_an_error_not_a_fresh_state() {
        let dir = temp_session_dir();
        std::fs::create_dir_all(&dir).expect("dir");
        std::fs::write(dir.join("creds.json"), b"not json").expect("write");

        let store = FileCredentialStore::new(&dir);
        assert!(store.load().await.is_err());

        std::fs::remove_dir_all(dir).expect("cleanup");
    }
}
