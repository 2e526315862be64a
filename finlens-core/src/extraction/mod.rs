//! Content extraction: document file → ordered text and table blocks.

pub mod heuristics;
pub mod normalize;
pub mod pdf;
pub mod tables;
pub mod text;
pub mod views;

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::types::ContentBlock;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub use heuristics::{is_likely_table, TableHeuristic};
pub use normalize::{clean_row, clean_table};
pub use pdf::PdfSource;
pub use tables::GridDetector;
pub use text::TextSource;
pub use views::{DocumentSource, FastTextView, LayoutView, OpenedDocument, PagedText};

/// Walks a document page by page and emits typed content blocks.
///
/// Blocks come out in page order. Within a page the text block precedes the
/// page's tables.
pub struct ContentExtractor {
    config: ExtractionConfig,
    heuristic: TableHeuristic,
    sources: Vec<Box<dyn DocumentSource>>,
}

impl ContentExtractor {
    /// Extractor for PDF and plain-text files.
    pub fn new(config: &ExtractionConfig) -> Self {
        let sources: Vec<Box<dyn DocumentSource>> = vec![
            Box::new(PdfSource::new(config.table_min_rows)),
            Box::new(TextSource::new(config.table_min_rows)),
        ];
        Self::with_sources(config, sources)
    }

    pub fn with_sources(config: &ExtractionConfig, sources: Vec<Box<dyn DocumentSource>>) -> Self {
        Self {
            config: config.clone(),
            heuristic: TableHeuristic::new(config),
            sources,
        }
    }

    pub fn supports_file_type(&self, path: &Path) -> bool {
        self.sources.iter().any(|s| s.supports_file_type(path))
    }

    /// Extract every page of the file. All or nothing: one bad page fails the call.
    pub fn extract(&self, path: &Path) -> Result<Vec<ContentBlock>, ExtractionError> {
        let result = self.open(path).and_then(|document| self.extract_from(&document));
        match &result {
            Ok(blocks) => info!(path = %path.display(), blocks = blocks.len(), "extracted document"),
            Err(e) => error!(path = %path.display(), error = %e, "extraction failed"),
        }
        result
    }

    fn open(&self, path: &Path) -> Result<OpenedDocument, ExtractionError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.supports_file_type(path))
            .ok_or_else(|| ExtractionError::UnsupportedFileType(path.to_path_buf()))?;
        debug!(path = %path.display(), source = source.name(), "opening document");
        source.open(path)
    }

    /// Extract from already-opened views.
    pub fn extract_from(&self, document: &OpenedDocument) -> Result<Vec<ContentBlock>, ExtractionError> {
        let page_count = document.fast.page_count();
        let layout_count = document.layout.page_count();
        if layout_count != page_count {
            warn!(
                fast_pages = page_count,
                layout_pages = layout_count,
                "extraction views disagree on page count"
            );
        }

        let per_page: Vec<Vec<ContentBlock>> = if self.config.parallel_pages {
            (1..=page_count)
                .into_par_iter()
                .map(|page| self.extract_page(document, page))
                .collect::<Result<_, _>>()?
        } else {
            (1..=page_count)
                .map(|page| self.extract_page(document, page))
                .collect::<Result<_, _>>()?
        };

        Ok(per_page.into_iter().flatten().collect())
    }

    fn extract_page(&self, document: &OpenedDocument, page: u32) -> Result<Vec<ContentBlock>, ExtractionError> {
        let fast_text = document.fast.page_text(page)?;

        if !self.heuristic.is_likely_table(&fast_text) {
            return Ok(vec![ContentBlock::text(page, fast_text.trim())]);
        }

        if page > document.layout.page_count() {
            warn!(page, "layout view has no such page, keeping fast-view text");
            return Ok(vec![ContentBlock::text(page, fast_text.trim())]);
        }

        let mut blocks = Vec::new();
        let layout_text = document.layout.page_text(page)?;
        let layout_text = layout_text.trim();
        if !layout_text.is_empty() {
            blocks.push(ContentBlock::text(page, layout_text));
        }

        for table in document.layout.page_tables(page)? {
            let rows = clean_table(&table);
            if rows.is_empty() && !self.config.emit_empty_tables {
                debug!(page, "skipping table with no surviving rows");
                continue;
            }
            blocks.push(ContentBlock::table(page, rows));
        }

        debug!(page, blocks = blocks.len(), "table-like page");
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockKind, RawTable};

    fn opened(fast: Vec<&str>, layout: PagedText) -> OpenedDocument {
        OpenedDocument {
            fast: Box::new(PagedText::new(fast.into_iter().map(String::from).collect())),
            layout: Box::new(layout),
        }
    }

    fn cell(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_plain_pages_yield_one_text_block_each() {
        let pages = vec!["Letter to shareholders.", "  Our strategy.  ", "Outlook."];
        let layout = PagedText::new(pages.iter().map(|s| s.to_string()).collect());
        let extractor = ContentExtractor::new(&ExtractionConfig::default());
        let blocks = extractor.extract_from(&opened(pages, layout)).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks.iter().map(|b| b.page).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(blocks[1].as_text(), Some("Our strategy."));
    }

    #[test]
    fn test_table_page_emits_text_then_tables() {
        let pages = vec!["Intro", "Consolidated balance sheet", "Closing"];
        let tables: Vec<Vec<RawTable>> = vec![
            vec![],
            vec![
                vec![vec![cell("Cash"), cell("$"), cell("10")]],
                vec![vec![cell("Debt"), None, cell("4")]],
            ],
        ];
        let layout = PagedText::with_tables(
            vec!["Intro".into(), "BALANCE SHEET (layout)".into(), "Closing".into()],
            tables,
        );
        let extractor = ContentExtractor::new(&ExtractionConfig::default());
        let blocks = extractor.extract_from(&opened(pages, layout)).unwrap();

        let kinds: Vec<(u32, BlockKind)> = blocks.iter().map(|b| (b.page, b.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, BlockKind::Text),
                (2, BlockKind::Text),
                (2, BlockKind::Table),
                (2, BlockKind::Table),
                (3, BlockKind::Text),
            ]
        );
        assert_eq!(blocks[1].as_text(), Some("BALANCE SHEET (layout)"));
        assert_eq!(blocks[3].as_table().unwrap(), &[vec!["Debt".to_string(), "4".to_string()]]);
    }

    #[test]
    fn test_empty_tables_follow_config() {
        let pages = vec!["net income"];
        let tables: Vec<Vec<RawTable>> = vec![vec![vec![vec![cell("$"), None]]]];

        let emit = ContentExtractor::new(&ExtractionConfig::default());
        let layout = PagedText::with_tables(vec!["net income".into()], tables.clone());
        let blocks = emit.extract_from(&opened(pages.clone(), layout)).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].as_table().map(|t| t.len()), Some(0));

        let skip = ContentExtractor::new(&ExtractionConfig {
            emit_empty_tables: false,
            ..ExtractionConfig::default()
        });
        let layout = PagedText::with_tables(vec!["net income".into()], tables);
        let blocks = skip.extract_from(&opened(pages, layout)).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_short_layout_view_falls_back_to_fast_text() {
        let pages = vec!["Intro", "Total assets"];
        let layout = PagedText::new(vec!["Intro".into()]);
        let extractor = ContentExtractor::new(&ExtractionConfig::default());
        let blocks = extractor.extract_from(&opened(pages, layout)).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].as_text(), Some("Total assets"));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let pages: Vec<String> = (1..=40)
            .map(|i| {
                if i % 3 == 0 {
                    format!("Revenues\nSegment A  $  {i},000\nSegment B  $  {},500", i + 1)
                } else {
                    format!("Narrative page {i}")
                }
            })
            .collect();
        let open = || OpenedDocument {
            fast: Box::new(PagedText::new(pages.clone())),
            layout: Box::new(PagedText::new(pages.clone())),
        };

        let parallel = ContentExtractor::new(&ExtractionConfig::default())
            .extract_from(&open())
            .unwrap();
        let sequential = ContentExtractor::new(&ExtractionConfig {
            parallel_pages: false,
            ..ExtractionConfig::default()
        })
        .extract_from(&open())
        .unwrap();

        assert_eq!(parallel, sequential);
        assert!(parallel.iter().any(|b| b.kind() == BlockKind::Table));
    }

    #[test]
    fn test_unsupported_extension() {
        let extractor = ContentExtractor::new(&ExtractionConfig::default());
        let err = extractor.extract(Path::new("filing.docx")).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFileType(_)));
    }
}
