//! Per-document analysis session.
//!
//! One session per user and document: it owns the index, the selected role,
//! the chat history and the extracted metrics. Nothing here is shared
//! between sessions.

use crate::error::QueryError;
use crate::index::{CancellationToken, DocumentIndex};
use crate::prompts::{compose, Role};
use crate::query::{QueryEngine, QueryOptions, QueryResponse};
use crate::types::{MetricsRecord, RiskSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            speaker,
            text: text.into(),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

pub struct AnalysisSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    document: PathBuf,
    index: Arc<DocumentIndex>,
    engine: QueryEngine,
    role: Role,
    history: ChatHistory,
    metrics: MetricsRecord,
    risks: Option<RiskSummary>,
    options: QueryOptions,
}

impl AnalysisSession {
    pub fn new(
        document: impl Into<PathBuf>,
        index: Arc<DocumentIndex>,
        engine: QueryEngine,
        options: QueryOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            document: document.into(),
            index,
            engine,
            role: Role::default(),
            history: ChatHistory::default(),
            metrics: MetricsRecord::default(),
            risks: None,
            options,
        }
    }

    /// Ask with the session's role and query defaults.
    ///
    /// Both turns are recorded only when the answer arrives; a failed query
    /// leaves the history as it was.
    pub fn ask(&mut self, question: &str) -> Result<QueryResponse, QueryError> {
        let options = self.options.clone();
        self.ask_with(question, &options)
    }

    pub fn ask_with(&mut self, question: &str, options: &QueryOptions) -> Result<QueryResponse, QueryError> {
        self.ask_cancellable(question, options, &CancellationToken::new())
    }

    /// Ask, giving up before the next model call once `cancel` fires.
    pub fn ask_cancellable(
        &mut self,
        question: &str,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        let prompt = compose(self.role, question);
        let response = self
            .engine
            .query_cancellable(&self.index, &prompt, options, cancel)?;

        self.history.push(Speaker::User, question);
        self.history.push(Speaker::Assistant, response.answer.clone());
        debug!(session = %self.id, turns = self.history.len(), "recorded exchange");
        Ok(response)
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_metrics(&mut self, metrics: MetricsRecord) {
        self.metrics = metrics;
    }

    pub fn set_risks(&mut self, risks: Option<RiskSummary>) {
        self.risks = risks;
    }

    pub fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn metrics(&self) -> &MetricsRecord {
        &self.metrics
    }

    pub fn risks(&self) -> Option<&RiskSummary> {
        self.risks.as_ref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }
}
