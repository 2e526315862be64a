//! Retrieval-augmented question answering over a [`DocumentIndex`].

use crate::config::{ResponseMode, RetrievalConfig};
use crate::error::QueryError;
use crate::index::{CancellationToken, DocumentIndex, ScoredUnit};
use crate::llm::{CompletionOptions, LanguageModel, ModelBackend};
use crate::types::BlockKind;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

const CONTEXT_RULE: &str = "---------------------";

fn qa_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n{CONTEXT_RULE}\n{context}\n{CONTEXT_RULE}\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\nAnswer: "
    )
}

fn refine_prompt(context: &str, query: &str, existing_answer: &str) -> String {
    format!(
        "The original query is as follows: {query}\n\
         We have provided an existing answer: {existing_answer}\n\
         We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
         {CONTEXT_RULE}\n{context}\n{CONTEXT_RULE}\n\
         Given the new context, refine the original answer to better answer the query. \
         If the context isn't useful, return the original answer.\n\
         Refined Answer: "
    )
}

fn summarize_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information from multiple sources is below.\n{CONTEXT_RULE}\n{context}\n{CONTEXT_RULE}\n\
         Given the information from multiple sources and not prior knowledge, answer the query.\n\
         Query: {query}\nAnswer: "
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Chunks retrieved per query
    pub top_k: usize,
    pub response_mode: ResponseMode,
    pub max_output_tokens: u32,
    pub backend: ModelBackend,
    /// Character budget for retrieved context in one prompt
    pub context_window_chars: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

impl QueryOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            response_mode: config.response_mode,
            max_output_tokens: config.max_output_tokens,
            backend: ModelBackend::Default,
            context_window_chars: config.context_window_chars,
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.top_k == 0 {
            return Err(QueryError::InvalidOptions("top_k must be at least 1".to_string()));
        }
        if self.max_output_tokens == 0 {
            return Err(QueryError::InvalidOptions(
                "max_output_tokens must be at least 1".to_string(),
            ));
        }
        if self.context_window_chars == 0 {
            return Err(QueryError::InvalidOptions(
                "context_window_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn completion(&self) -> CompletionOptions {
        CompletionOptions {
            max_output_tokens: self.max_output_tokens,
            backend: self.backend,
        }
    }
}

/// A chunk that grounded an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub chunk_id: usize,
    pub score: f32,
    pub page: u32,
    pub kind: BlockKind,
}

impl From<&ScoredUnit<'_>> for SourceRef {
    fn from(hit: &ScoredUnit<'_>) -> Self {
        Self {
            chunk_id: hit.unit.id,
            score: hit.score,
            page: hit.unit.metadata.page,
            kind: hit.unit.metadata.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieves chunks and asks the language model to answer from them.
#[derive(Clone)]
pub struct QueryEngine {
    llm: Arc<dyn LanguageModel>,
}

impl QueryEngine {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Answer text only.
    pub fn query(&self, index: &DocumentIndex, text: &str, options: &QueryOptions) -> Result<String, QueryError> {
        self.query_with_sources(index, text, options)
            .map(|response| response.answer)
    }

    pub fn query_with_sources(
        &self,
        index: &DocumentIndex,
        text: &str,
        options: &QueryOptions,
    ) -> Result<QueryResponse, QueryError> {
        self.query_cancellable(index, text, options, &CancellationToken::new())
    }

    /// Like [`query_with_sources`](Self::query_with_sources), checking `cancel`
    /// before every model call. A cancelled query makes no further calls.
    pub fn query_cancellable(
        &self,
        index: &DocumentIndex,
        text: &str,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        let result = self.run(index, text, options, cancel);
        if let Err(e) = &result {
            error!(error = %e, model = self.llm.name(), "query failed");
        }
        result
    }

    fn run(
        &self,
        index: &DocumentIndex,
        text: &str,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        options.validate()?;
        if index.is_empty() {
            return Err(QueryError::EmptyIndex);
        }

        let start = Instant::now();
        let hits = index.retrieve(text, options.top_k)?;
        let batches = pack_context(
            hits.iter().map(|hit| hit.unit.text.as_str()),
            options.context_window_chars,
        );
        debug!(
            retrieved = hits.len(),
            batches = batches.len(),
            mode = ?options.response_mode,
            "synthesizing answer"
        );

        let mut calls = ModelCalls {
            llm: self.llm.as_ref(),
            options: options.completion(),
            cancel,
            completed: 0,
        };
        let answer = match options.response_mode {
            ResponseMode::Compact => compact(&mut calls, &batches, text)?,
            ResponseMode::TreeSummarize => tree_summarize(&mut calls, batches, text)?,
        };

        info!(
            model = self.llm.name(),
            calls = calls.completed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "answered query"
        );

        Ok(QueryResponse {
            answer: answer.trim().to_string(),
            sources: hits.iter().map(SourceRef::from).collect(),
        })
    }
}

/// Model calls for one query, stopping once the token is cancelled.
struct ModelCalls<'a> {
    llm: &'a dyn LanguageModel,
    options: CompletionOptions,
    cancel: &'a CancellationToken,
    completed: usize,
}

impl ModelCalls<'_> {
    fn complete(&mut self, prompt: &str) -> Result<String, QueryError> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled {
                completed: self.completed,
            });
        }
        let reply = self.llm.complete(prompt, &self.options)?;
        self.completed += 1;
        Ok(reply)
    }
}

/// First batch answers, later batches refine.
fn compact(calls: &mut ModelCalls<'_>, batches: &[String], query: &str) -> Result<String, QueryError> {
    let mut answer: Option<String> = None;
    for batch in batches {
        let prompt = match &answer {
            None => qa_prompt(batch, query),
            Some(existing) => refine_prompt(batch, query, existing),
        };
        answer = Some(calls.complete(&prompt)?);
    }
    Ok(answer.unwrap_or_default())
}

/// Answer each batch, then merge answers pairwise until one is left.
fn tree_summarize(calls: &mut ModelCalls<'_>, batches: Vec<String>, query: &str) -> Result<String, QueryError> {
    let mut level = Vec::with_capacity(batches.len());
    for batch in &batches {
        level.push(calls.complete(&summarize_prompt(batch, query))?);
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => {
                    let context = format!("{left}\n\n{right}");
                    next.push(calls.complete(&summarize_prompt(&context, query))?);
                }
                [single] => next.push(single.clone()),
                _ => {}
            }
        }
        level = next;
    }

    Ok(level.pop().unwrap_or_default())
}

/// Join chunk texts into batches that fit the window. A chunk larger than
/// the window gets a batch of its own.
pub fn pack_context<'a>(texts: impl Iterator<Item = &'a str>, window_chars: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for text in texts {
        let needed = if current.is_empty() { text.len() } else { current.len() + 2 + text.len() };
        if !current.is_empty() && needed > window_chars {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(text);
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
