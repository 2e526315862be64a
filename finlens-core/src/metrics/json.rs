//! Recovery of the metrics JSON object from free-form model output.

use crate::error::MetricsParseError;
use crate::types::{MetricPair, MetricsRecord};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::warn;

/// First `{` through last `}`, across lines.
static BRACE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

const PLACEHOLDERS: [&str; 5] = ["n/a", "na", "null", "none", "unknown"];

/// A parsed record plus the fields whose values had to be discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetrics {
    pub record: MetricsRecord,
    /// Dotted paths of fields that held a value of the wrong type
    pub rejected_fields: Vec<String>,
}

/// Parse the JSON object embedded in `text`, ignoring surrounding prose.
///
/// Numeric fields take numbers or null. Any other value (a string such as
/// `"$1,200"` included) is dropped to `None` for that field alone and listed
/// in `rejected_fields`.
pub fn try_parse_embedded_json(text: &str) -> Result<ParsedMetrics, MetricsParseError> {
    let span = BRACE_SPAN
        .find(text)
        .ok_or(MetricsParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(span.as_str())?;
    let object = value.as_object().ok_or(MetricsParseError::NotAnObject)?;

    let mut rejected = Vec::new();
    let record = MetricsRecord {
        company_name: text_field(object, "company_name", &mut rejected),
        fiscal_year: text_field(object, "fiscal_year", &mut rejected),
        assets: number_field(object.get("assets"), "assets", &mut rejected),
        revenue: pair_field(object, "revenue", &mut rejected),
        net_profit: pair_field(object, "net_profit", &mut rejected),
        profit_margin: pair_field(object, "profit_margin", &mut rejected),
        eps: pair_field(object, "eps", &mut rejected),
    };

    for field in &rejected {
        warn!(field = %field, "discarding metrics field with wrong type");
    }

    Ok(ParsedMetrics {
        record,
        rejected_fields: rejected,
    })
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty() || lowered.starts_with('<') || PLACEHOLDERS.contains(&lowered.as_str())
}

/// Strings, plus plain numbers for fields like `"fiscal_year": 2024`.
fn text_field(object: &Map<String, Value>, field: &str, rejected: &mut Vec<String>) -> Option<String> {
    match object.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if is_placeholder(s) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            rejected.push(field.to_string());
            None
        }
    }
}

fn number_field(value: Option<&Value>, path: &str, rejected: &mut Vec<String>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(x) if x.is_finite() => Some(x),
            _ => {
                rejected.push(path.to_string());
                None
            }
        },
        Some(_) => {
            rejected.push(path.to_string());
            None
        }
    }
}

fn pair_field(object: &Map<String, Value>, field: &str, rejected: &mut Vec<String>) -> MetricPair {
    match object.get(field) {
        None | Some(Value::Null) => MetricPair::default(),
        Some(Value::Object(pair)) => MetricPair {
            current: number_field(pair.get("current"), &format!("{field}.current"), rejected),
            previous: number_field(pair.get("previous"), &format!("{field}.previous"), rejected),
        },
        Some(_) => {
            rejected.push(field.to_string());
            MetricPair::default()
        }
    }
}
