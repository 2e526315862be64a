//! Error types for the analysis pipeline.
//!
//! Each stage returns its own error so callers can decide how to degrade:
//! extraction and indexing failures end the session, query failures end one
//! exchange, metrics failures fall back to an empty record.

use std::path::PathBuf;
use thiserror::Error;

/// Document could not be opened or read. Fatal to the session.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O error while reading the document.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No document source handles this file type.
    #[error("unsupported document type: {0}")]
    UnsupportedFileType(PathBuf),

    /// The PDF could not be parsed by one of the extraction views.
    #[error("failed to parse PDF ({view} view): {message}")]
    Pdf { view: &'static str, message: String },

    /// A view failed to produce text for a page.
    #[error("failed to read page {page}: {message}")]
    Page { page: u32, message: String },
}

/// The embedding capability failed.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(String),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Index construction failed. No partial index is returned.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("index build cancelled after {embedded} of {total} chunks")]
    Cancelled { embedded: usize, total: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// The language-model capability failed.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Transport(String),

    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed language model response: {0}")]
    MalformedResponse(String),
}

/// One question/answer exchange failed. The index stays valid.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] EmbeddingError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("invalid query options: {0}")]
    InvalidOptions(String),

    #[error("index contains no chunks to ground an answer")]
    EmptyIndex,

    #[error("query cancelled after {completed} model calls")]
    Cancelled { completed: usize },
}

/// The schema-guided extraction response was not usable JSON.
#[derive(Debug, Error)]
pub enum MetricsParseError {
    #[error("no JSON object found in model response")]
    NoJsonObject,

    #[error("invalid JSON in model response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model response JSON is not an object")]
    NotAnObject,
}

/// Metrics extraction degraded to an empty record for this reason.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics query failed: {0}")]
    Query(#[from] QueryError),

    #[error(transparent)]
    Parse(#[from] MetricsParseError),
}

/// Whole-document pipeline failure: no document, no index.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
