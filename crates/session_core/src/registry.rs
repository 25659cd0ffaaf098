use std::sync::Arc;

use tokio::sync::RwLock;
use transport::SessionHandle;

/// Single point of truth for "is there a usable connection, and what is it".
///
/// The connector is the only writer; any number of concurrent command
/// invocations read. Handles are replaced wholesale, never patched, so a
/// reader always observes either the previous or the next handle.
#[derive(Default)]
pub struct ConnectionRegistry {
    current: RwLock<Option<Arc<dyn SessionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, handle: Option<Arc<dyn SessionHandle>>) {
        *self.current.write().await = handle;
    }

    /// Snapshot of the current handle. Callers keep the snapshot for the
    /// duration of one operation and never re-fetch mid-call.
    pub async fn get(&self) -> Option<Arc<dyn SessionHandle>> {
        self.current.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }
}
