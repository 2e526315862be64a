// FinLens Core Library
//
// Question answering over financial filings: extract text and tables from a
// PDF, index the chunks, and answer role-tailored questions through a
// language model. Main interface is DocumentAnalyzer / AnalysisSession.

pub mod cache;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod processor;
pub mod prompts;
pub mod query;
pub mod session;
pub mod types;

// Re-export main types and functions for easy use
pub use types::*;
pub use config::{AnalyzerConfig, EmbeddingProvider, ResponseMode};
pub use error::{
    EmbeddingError, ExtractionError, IndexError, LlmError, MetricsError, MetricsParseError,
    PipelineError, QueryError,
};
pub use extraction::{clean_row, is_likely_table, ContentExtractor};
pub use embedding::{embedder_from_config, Embedder, HashingEmbedder, OpenAiEmbedder};
pub use index::{CancellationToken, DocumentIndex, IndexBuilder, NoProgress, ProgressSink};
pub use llm::{CompletionOptions, LanguageModel, ModelBackend, OpenRouterClient};
pub use metrics::{try_parse_embedded_json, MetricsExtraction, MetricsExtractor};
pub use processor::{AnalysisOptions, AnalysisOutcome, DocumentAnalyzer, StepProfiler};
pub use prompts::{compose, Role};
pub use query::{QueryEngine, QueryOptions, QueryResponse, SourceRef};
pub use session::{AnalysisSession, ChatHistory, ChatTurn, Speaker};
