use crate::traits::ObjectStore;
use agora_core::{AgoraError, AgoraResult, StoredObject};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Object store keeping buffers in memory and recording deletions.
pub struct InMemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

impl InMemoryObjectStore {
    /// Creates a store whose URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Stores a buffer under a known public ID.
    pub fn insert(&self, public_id: impl Into<String>, bytes: Vec<u8>) {
        self.objects.lock().insert(public_id.into(), bytes);
    }

    /// Returns true if an object exists.
    pub fn contains(&self, public_id: &str) -> bool {
        self.objects.lock().contains_key(public_id)
    }

    /// Public IDs passed to `delete`, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> AgoraResult<StoredObject> {
        if bytes.is_empty() {
            return Err(AgoraError::validation("Cannot upload an empty file"));
        }

        let public_id = format!("media/{}", Uuid::new_v4().simple());
        self.objects.lock().insert(public_id.clone(), bytes.to_vec());
        debug!(public_id = %public_id, file_name, mime_type, size = bytes.len(), "Object stored");

        Ok(StoredObject {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AgoraResult<()> {
        self.objects.lock().remove(public_id);
        self.deleted.lock().push(public_id.to_string());
        Ok(())
    }
}
