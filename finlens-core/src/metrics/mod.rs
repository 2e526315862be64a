//! Schema-guided metrics extraction and the risk-factor summary.

pub mod company;
pub mod json;

use crate::error::{MetricsError, QueryError};
use crate::index::{CancellationToken, DocumentIndex};
use crate::query::{QueryEngine, QueryOptions};
use crate::types::{MetricsRecord, RiskSummary};
use tracing::{debug, info, warn};

pub use company::find_company_name;
pub use json::{try_parse_embedded_json, ParsedMetrics};

const COMPANY_PLACEHOLDER: &str = "<company name exactly as written in the document>";

const RISK_PROMPT: &str = "Identify the major company-specific risk factors and highlights in this document. \
For each one, include the quantitative detail the document gives (amounts, percentages, dates). \
Exclude generic boilerplate that would apply to any company.";

/// The metrics extraction prompt. A known company name is written into the
/// schema as a literal the model must keep.
pub fn metrics_prompt(company_name: Option<&str>) -> String {
    let company_value = match company_name {
        Some(name) => serde_json::Value::String(name.to_string()).to_string(),
        None => format!("\"{COMPANY_PLACEHOLDER}\""),
    };

    let mut prompt = format!(
        "Extract the key financial metrics from this document.\n\
         Search the whole document, including every table, before answering.\n\
         Return a single JSON object with exactly this structure:\n\
         {{\n\
         \x20 \"company_name\": {company_value},\n\
         \x20 \"fiscal_year\": \"<fiscal year or period covered>\",\n\
         \x20 \"assets\": <total assets>,\n\
         \x20 \"revenue\": {{\"current\": <number>, \"previous\": <number>}},\n\
         \x20 \"net_profit\": {{\"current\": <number>, \"previous\": <number>}},\n\
         \x20 \"profit_margin\": {{\"current\": <number>, \"previous\": <number>}},\n\
         \x20 \"eps\": {{\"current\": <number>, \"previous\": <number>}}\n\
         }}\n\
         Rules:\n\
         - \"current\" is the most recent fiscal period, \"previous\" the one before it.\n\
         - Express money amounts in millions as plain numbers: no currency symbols, no commas, no percent signs.\n\
         - Express profit_margin as a plain number of percent (12.5 means 12.5%).\n\
         - Use null for anything the document does not state. Never guess.\n"
    );
    if company_name.is_some() {
        prompt.push_str(
            "- company_name is already filled in. Under no circumstances change it or invent another name.\n",
        );
    }
    prompt
}

/// Outcome of a metrics extraction. `record` is always usable; `error`
/// says why it came back empty.
#[derive(Debug)]
pub struct MetricsExtraction {
    pub record: MetricsRecord,
    pub error: Option<MetricsError>,
    pub rejected_fields: Vec<String>,
}

impl MetricsExtraction {
    fn failed(error: MetricsError) -> Self {
        warn!(error = %error, "metrics extraction failed, returning empty record");
        Self {
            record: MetricsRecord::default(),
            error: Some(error),
            rejected_fields: Vec::new(),
        }
    }
}

pub struct MetricsExtractor {
    engine: QueryEngine,
    options: QueryOptions,
    cancel: CancellationToken,
}

impl MetricsExtractor {
    pub fn new(engine: QueryEngine) -> Self {
        Self::with_options(engine, QueryOptions::default())
    }

    pub fn with_options(engine: QueryEngine, options: QueryOptions) -> Self {
        Self {
            engine,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Both extractions stop before their next model call once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn ask(&self, index: &DocumentIndex, prompt: &str) -> Result<String, QueryError> {
        self.engine
            .query_cancellable(index, prompt, &self.options, &self.cancel)
            .map(|response| response.answer)
    }

    /// Never fails: any error yields the empty record, reported in `error`.
    pub fn extract_metrics(&self, index: &DocumentIndex) -> MetricsExtraction {
        let all_text = index.texts().collect::<Vec<_>>().join("\n");
        let company_name = find_company_name(&all_text);
        debug!(company = ?company_name, "company name pre-pass");

        let prompt = metrics_prompt(company_name.as_deref());
        let response = match self.ask(index, &prompt) {
            Ok(response) => response,
            Err(e) => return MetricsExtraction::failed(e.into()),
        };

        let parsed = match try_parse_embedded_json(&response) {
            Ok(parsed) => parsed,
            Err(e) => return MetricsExtraction::failed(e.into()),
        };

        let mut record = parsed.record;
        if company_name.is_some() {
            record.company_name = company_name;
        }
        info!(
            company = ?record.company_name,
            rejected = parsed.rejected_fields.len(),
            "extracted metrics"
        );

        MetricsExtraction {
            record,
            error: None,
            rejected_fields: parsed.rejected_fields,
        }
    }

    /// Model's risk-factor summary, verbatim.
    pub fn extract_risk_factors(&self, index: &DocumentIndex) -> Result<RiskSummary, QueryError> {
        self.ask(index, RISK_PROMPT).map(RiskSummary)
    }
}
