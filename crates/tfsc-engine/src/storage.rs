//! Object storage seam.
//!
//! The engine only ever reads objects by URI: Terraform outputs and stderr
//! captures written by the build, and provisioning artifacts downloaded for
//! parameter discovery. Backends implement [`ObjectStore`]; [`MemoryStore`]
//! is the in-process implementation used by tests and local tooling.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::uri::ObjectUri;

/// Read access to object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the entire object.
    ///
    /// Returns `EngineError::ObjectNotFound` if the object does not exist.
    async fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>>;

    /// Read the object as text. Invalid UTF-8 sequences are replaced.
    async fn get_text(&self, uri: &ObjectUri) -> Result<String> {
        let bytes = self.get(uri).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Download the object to a local file, replacing any existing file.
    async fn download(&self, uri: &ObjectUri, dest: &Path) -> Result<()> {
        let bytes = self.get(uri).await?;
        debug!(%uri, dest = %dest.display(), size = bytes.len(), "writing object to disk");
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

/// An object store that can be shared across tasks.
pub type SharedStore = Arc<dyn ObjectStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Memory Store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory object store.
///
/// Records every read so tests can assert which side-channel artifacts were
/// fetched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectUri, Vec<u8>>>,
    reads: Mutex<Vec<ObjectUri>>,
    failing: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` at `uri`. Panics if `uri` is not a valid S3 URI.
    pub fn with_object(self, uri: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(uri, data);
        self
    }

    /// Store `data` at `uri`. Panics if `uri` is not a valid S3 URI.
    pub fn insert(&self, uri: &str, data: impl Into<Vec<u8>>) {
        let uri = ObjectUri::parse(uri).unwrap_or_else(|e| panic!("MemoryStore: {e}"));
        self.objects.lock().insert(uri, data.into());
    }

    /// Make every subsequent read fail with a storage error.
    pub fn fail_reads(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// URIs read so far, in order.
    pub fn reads(&self) -> Vec<ObjectUri> {
        self.reads.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        self.reads.lock().push(uri.clone());
        if let Some(message) = self.failing.lock().clone() {
            return Err(EngineError::Storage(message));
        }
        self.objects
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| EngineError::ObjectNotFound(uri.to_string()))
    }
}
