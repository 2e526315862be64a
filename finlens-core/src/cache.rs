use crate::embedding::Embedder;
use crate::error::EmbeddingError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// SHA-256 of a chunk's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Session-scoped embedding cache, keyed by (embedder, text).
///
/// Filings repeat page headers and boilerplate, and chat users repeat
/// questions; neither needs a second embedding call. Lives in memory only.
#[derive(Clone, Default)]
pub struct EmbeddingCache {
    entries: Arc<Mutex<HashMap<String, Vec<f32>>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(embedder: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(embedder.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, embedder: &str, text: &str) -> Option<Vec<f32>> {
        let entries = self.entries.lock().ok()?;
        entries.get(&Self::key(embedder, text)).cloned()
    }

    pub fn insert(&self, embedder: &str, text: &str, vector: Vec<f32>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(Self::key(embedder, text), vector);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached vector, or embed and remember it.
    pub fn embed(&self, embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(vector) = self.get(embedder.name(), text) {
            return Ok(vector);
        }
        let vector = embedder.embed(text)?;
        self.insert(embedder.name(), text, vector.clone());
        Ok(vector)
    }
}
