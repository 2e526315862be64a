use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

// Default value functions for serde
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

// ===== EXTRACTION =====

fn default_table_keywords() -> Vec<String> {
    vec![
        "following table".to_string(),
        "following tables".to_string(),
        "as follows".to_string(),
        "consolidated".to_string(),
        "balance sheet".to_string(),
        "income statement".to_string(),
        "cash flows".to_string(),
        "assets".to_string(),
        "liabilities".to_string(),
        "net income".to_string(),
        "revenues".to_string(),
        "expenses".to_string(),
    ]
}

fn default_min_pattern_lines() -> usize {
    2 // lines carrying both a $/% sign and a digit
}

fn default_table_min_rows() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Case-insensitive phrases that mark a page as likely tabular
    #[serde(default = "default_table_keywords")]
    pub table_keywords: Vec<String>,

    /// Number of `$`/`%` + digit lines that mark a page as likely tabular
    #[serde(default = "default_min_pattern_lines")]
    pub min_pattern_lines: usize,

    /// Emit Table blocks whose rows were all cleaned away
    #[serde(default = "default_true")]
    pub emit_empty_tables: bool,

    /// Process pages on the rayon pool (page order is preserved)
    #[serde(default = "default_true")]
    pub parallel_pages: bool,

    /// Consecutive cell-split lines needed before the layout view reports a table
    #[serde(default = "default_table_min_rows")]
    pub table_min_rows: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            table_keywords: default_table_keywords(),
            min_pattern_lines: default_min_pattern_lines(),
            emit_empty_tables: true,
            parallel_pages: true,
            table_min_rows: default_table_min_rows(),
        }
    }
}

// ===== CHUNKING =====

fn default_max_chunk_chars() -> usize {
    1200
}

fn default_min_chunk_chars() -> usize {
    200
}

fn default_column_separator() -> String {
    " | ".to_string()
}

fn default_heading_patterns() -> Vec<String> {
    vec![
        r"^#{1,6}\s+\S".to_string(),                                // Markdown heading
        r"^[A-Z][A-Z0-9&,'\s\-]{2,}$".to_string(),                  // ALL CAPS
        r"^(?i:item)\s+\d+[A-Z]?\.".to_string(),                    // "Item 7." / "Item 1A."
        r"^(Part|PART)\s+[IVX]+\b".to_string(),                     // "Part II"
        r"^\d+\.\s+[A-Z][a-z]{3,}".to_string(),                     // "1. Title"
        r"^[A-Z][a-z]{2,}(?:\s+[A-Z][a-z]{2,})*:$".to_string(),    // "Title Case:"
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters in any chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Sections shorter than this run on into the next section instead of
    /// becoming their own chunk
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Split oversized paragraphs on sentence boundaries before falling back to words
    #[serde(default = "default_true")]
    pub preserve_sentences: bool,

    /// Separator placed between table cells when tables are flattened to text
    #[serde(default = "default_column_separator")]
    pub column_separator: String,

    /// Regex patterns for lines that open a new section
    #[serde(default = "default_heading_patterns")]
    pub heading_patterns: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            min_chunk_chars: default_min_chunk_chars(),
            preserve_sentences: true,
            column_separator: default_column_separator(),
            heading_patterns: default_heading_patterns(),
        }
    }
}

// ===== RETRIEVAL =====

/// How retrieved chunks are merged into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Pack chunks into as few prompts as fit, refining the answer across them
    #[default]
    Compact,
    /// Answer each batch, then combine answers pairwise until one remains
    TreeSummarize,
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "compact" => Ok(ResponseMode::Compact),
            "tree_summarize" => Ok(ResponseMode::TreeSummarize),
            other => Err(format!("unknown response mode '{other}'")),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_context_window_chars() -> usize {
    12_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub response_mode: ResponseMode,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Character budget for the retrieved context placed in one prompt
    #[serde(default = "default_context_window_chars")]
    pub context_window_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            response_mode: ResponseMode::Compact,
            max_output_tokens: default_max_output_tokens(),
            context_window_chars: default_context_window_chars(),
        }
    }
}

// ===== LANGUAGE MODEL =====

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_alternate_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint root
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used when the caller selects the alternate backend
    #[serde(default = "default_alternate_model")]
    pub alternate_model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            default_model: default_model(),
            alternate_model: default_alternate_model(),
            api_key_env: default_llm_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

// ===== EMBEDDING =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Feature-hashing embedder, no network
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_dimension() -> usize {
    512 // only used by the local embedder
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key_env: default_embedding_api_key_env(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl AnalyzerConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: AnalyzerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {path}"))?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!(path = p, error = %e, "failed to load config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}
