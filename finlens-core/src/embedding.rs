//! Text embedding capability.
//!
//! The same embedder must serve index construction and querying; vectors of
//! different models or dimensions are not comparable.

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Vector length, when known before the first call.
    fn dimension(&self) -> Option<usize>;

    /// Embedder identifier for logging and cache keys
    fn name(&self) -> &str;
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

// ===== LOCAL =====

/// Deterministic feature-hashing embedder. No model, no network.
///
/// Lowercased word unigrams and bigrams are hashed into a fixed number of
/// signed buckets, then the vector is L2-normalised. Good enough to rank
/// chunks by shared vocabulary, which is what filings Q&A mostly needs.
pub struct HashingEmbedder {
    dimension: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            name: format!("hashing-{dimension}"),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = xxh3_64(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ===== REMOTE =====

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `POST /embeddings` client. One attempt per call.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = ureq::post(&format!("{}/embeddings", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("content-type", "application/json")
            .timeout(self.timeout)
            .send_json(&request)
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => EmbeddingError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(transport) => EmbeddingError::Transport(transport.to_string()),
            })?;

        let response: EmbeddingResponse = response
            .into_json()
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding in response".to_string()))?;
        debug!(model = %self.model, dimension = vector.len(), "remote embedding");
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Embedder for the configured provider. `api_key` is only used by remote providers.
pub fn embedder_from_config(config: &EmbeddingConfig, api_key: Option<&str>) -> Box<dyn Embedder> {
    match config.provider {
        EmbeddingProvider::Local => Box::new(HashingEmbedder::new(config.dimension)),
        EmbeddingProvider::OpenAi => Box::new(OpenAiEmbedder::new(
            &config.base_url,
            &config.model,
            api_key.unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )),
    }
}
