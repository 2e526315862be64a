//! In-memory vector index over a document's chunks.
//!
//! Built once per document and never mutated afterwards, so one index can
//! serve concurrent queries behind an `Arc`.

use crate::cache::EmbeddingCache;
use crate::chunker::Chunker;
use crate::config::ChunkingConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{EmbeddingError, IndexError};
use crate::types::{ContentBlock, IndexUnit};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Receives progress while chunks are embedded.
pub trait ProgressSink: Send + Sync {
    fn on_start(&self, _total: usize) {}

    fn on_progress(&self, done: usize, total: usize);

    fn on_finish(&self) {}
}

/// Progress sink that ignores everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _done: usize, _total: usize) {}
}

/// Cooperative cancellation for long-running builds. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredUnit<'a> {
    pub unit: &'a IndexUnit,
    pub score: f32,
}

pub struct DocumentIndex {
    units: Vec<IndexUnit>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("units", &self.units.len())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl DocumentIndex {
    /// Embed every unit and build the index. No partial index on failure.
    pub fn build(
        units: Vec<IndexUnit>,
        embedder: Arc<dyn Embedder>,
        cache: EmbeddingCache,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Self, IndexError> {
        let start = Instant::now();
        let total = units.len();
        let done = AtomicUsize::new(0);
        progress.on_start(total);

        let vectors = units
            .par_iter()
            .map(|unit| {
                if cancel.is_cancelled() {
                    return Err(IndexError::Cancelled {
                        embedded: done.load(Ordering::SeqCst),
                        total,
                    });
                }
                let vector = cache.embed(embedder.as_ref(), &unit.text)?;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.on_progress(finished, total);
                Ok(vector)
            })
            .collect::<Result<Vec<_>, IndexError>>();
        progress.on_finish();

        let vectors = match vectors {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(error = %e, "index build failed");
                return Err(e);
            }
        };

        let expected = embedder
            .dimension()
            .or_else(|| vectors.first().map(Vec::len))
            .unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(IndexError::DimensionMismatch {
                expected,
                got: bad.len(),
            });
        }

        info!(
            chunks = total,
            embedder = embedder.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built document index"
        );

        Ok(Self {
            units,
            vectors,
            embedder,
            cache,
        })
    }

    /// The `top_k` most similar units, best first. Ties go to the earlier chunk.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredUnit<'_>>, EmbeddingError> {
        let query_vector = self.cache.embed(self.embedder.as_ref(), query)?;
        if let Some(first) = self.vectors.first() {
            if first.len() != query_vector.len() {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "query vector has dimension {}, index has {}",
                    query_vector.len(),
                    first.len()
                )));
            }
        }

        let mut scored: Vec<ScoredUnit<'_>> = self
            .units
            .iter()
            .zip(&self.vectors)
            .map(|(unit, vector)| ScoredUnit {
                unit,
                score: cosine_similarity(&query_vector, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.unit.id.cmp(&b.unit.id))
        });
        scored.truncate(top_k);

        debug!(
            query_chars = query.len(),
            retrieved = scored.len(),
            best = scored.first().map(|s| s.score),
            "retrieved chunks"
        );
        Ok(scored)
    }

    pub fn units(&self) -> &[IndexUnit] {
        &self.units
    }

    /// Raw text of every unit, in document order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.units().iter().map(|u| u.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }
}

/// Chunks content blocks and embeds them into a [`DocumentIndex`].
pub struct IndexBuilder {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

impl IndexBuilder {
    pub fn new(chunking: &ChunkingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunker: Chunker::new(chunking),
            embedder,
            cache: EmbeddingCache::new(),
        }
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(&self, blocks: &[ContentBlock]) -> Result<DocumentIndex, IndexError> {
        self.build_with_progress(blocks, &NoProgress, &CancellationToken::new())
    }

    pub fn build_with_progress(
        &self,
        blocks: &[ContentBlock],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentIndex, IndexError> {
        let units = self.chunker.chunk_blocks(blocks);
        DocumentIndex::build(units, self.embedder.clone(), self.cache.clone(), progress, cancel)
    }
}
