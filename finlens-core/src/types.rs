use serde::{Deserialize, Serialize};
use std::fmt;

// ===== EXTRACTED CONTENT =====

/// Kind of a content block; also recorded on every chunk derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Table,
}

/// Payload of a content block. Serializes as `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum BlockContent {
    /// Trimmed page prose
    Text(String),
    /// Rows of non-empty, trimmed cells
    Table(Vec<Vec<String>>),
}

/// One typed unit of extracted document content.
///
/// The extractor produces these in page order, and within a page the text
/// block always precedes the tables found on that page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Page number (1-indexed)
    pub page: u32,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl ContentBlock {
    pub fn text(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            content: BlockContent::Text(text.into()),
        }
    }

    pub fn table(page: u32, rows: Vec<Vec<String>>) -> Self {
        Self {
            page,
            content: BlockContent::Table(rows),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self.content {
            BlockContent::Text(_) => BlockKind::Text,
            BlockContent::Table(_) => BlockKind::Table,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Text(text) => Some(text),
            BlockContent::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Vec<String>]> {
        match &self.content {
            BlockContent::Table(rows) => Some(rows),
            BlockContent::Text(_) => None,
        }
    }
}

/// A table grid as reported by a layout view, before cleaning.
/// `None` marks a cell the view found no content for.
pub type RawTable = Vec<Vec<Option<String>>>;

// ===== INDEX UNITS =====

/// Where a chunk came from inside the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMetadata {
    pub kind: BlockKind,
    /// Position of the source block in the extracted block sequence
    pub block_index: usize,
    pub page: u32,
    /// Nearest heading above the chunk, for text chunks
    pub heading: Option<String>,
    /// SHA-256 of the chunk text
    pub content_hash: String,
}

/// A bounded span of document text prepared for embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexUnit {
    /// Position in document order (0-indexed)
    pub id: usize,
    pub text: String,
    pub metadata: UnitMetadata,
}

// ===== METRICS =====

/// A metric reported for the current and the previous fiscal period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub current: Option<f64>,
    pub previous: Option<f64>,
}

impl MetricPair {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.previous.is_none()
    }
}

/// Key financial metrics pulled from a filing.
///
/// Numeric fields are either a finite number or `None`, never a string.
/// Money amounts are in millions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub company_name: Option<String>,
    pub fiscal_year: Option<String>,
    pub assets: Option<f64>,
    pub revenue: MetricPair,
    pub net_profit: MetricPair,
    pub profit_margin: MetricPair,
    pub eps: MetricPair,
}

impl MetricsRecord {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Classify the current-period net profit.
    pub fn profitability(&self) -> Profitability {
        match self.net_profit.current {
            Some(value) if value > 0.0 => Profitability::Profitable,
            Some(value) if value < 0.0 => Profitability::LossMaking,
            Some(_) => Profitability::Breakeven,
            None => Profitability::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profitability {
    Profitable,
    LossMaking,
    Breakeven,
    Unknown,
}

impl fmt::Display for Profitability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Profitability::Profitable => "Profitable",
            Profitability::LossMaking => "Loss-making",
            Profitability::Breakeven => "Break-even",
            Profitability::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Free-text summary of company-specific risk factors and highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskSummary(pub String);

impl RiskSummary {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
