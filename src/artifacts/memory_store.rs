use crate::artifacts::ArtifactStore;
use crate::error::{AppError, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory artifact store (for tests and embedding)
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.remove(key).map(|(_, bytes)| bytes)
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Artifact(format!("Artifact '{}' not found", key)))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        tracing::debug!(key, size = bytes.len(), "Artifact saved");
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}
