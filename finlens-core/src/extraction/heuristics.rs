//! Per-page "is this probably a table?" decision.
//!
//! Cheap and biased toward firing: a false positive only routes the page
//! through the slower layout view, it never loses content.

use crate::config::ExtractionConfig;

/// Keyword and pattern signals for table-like pages.
#[derive(Debug, Clone)]
pub struct TableHeuristic {
    keywords: Vec<String>,
    min_pattern_lines: usize,
}

impl Default for TableHeuristic {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl TableHeuristic {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            keywords: config
                .table_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            min_pattern_lines: config.min_pattern_lines,
        }
    }

    pub fn is_likely_table(&self, page_text: &str) -> bool {
        let lowered = page_text.to_lowercase();
        if self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return true;
        }

        let pattern_lines = page_text.lines().filter(|line| is_figure_line(line)).count();
        pattern_lines >= self.min_pattern_lines
    }
}

/// A line carrying a currency or percent sign together with a digit.
fn is_figure_line(line: &str) -> bool {
    line.contains(['$', '%']) && line.chars().any(|c| c.is_ascii_digit())
}

/// Default-configured heuristic.
pub fn is_likely_table(page_text: &str) -> bool {
    TableHeuristic::default().is_likely_table(page_text)
}
