use crate::error::ExtractionError;
use crate::extraction::tables::GridDetector;
use crate::extraction::views::{has_extension, DocumentSource, OpenedDocument, PagedText};
use std::path::Path;

/// Page break in plain-text exports of filings.
pub const PAGE_BREAK: char = '\x0c';

/// Plain-text source. Pages are separated by form feeds; a file without any
/// is one page.
pub struct TextSource {
    table_min_rows: usize,
}

impl TextSource {
    pub fn new(table_min_rows: usize) -> Self {
        Self { table_min_rows }
    }
}

pub fn split_pages(content: &str) -> Vec<String> {
    content.split(PAGE_BREAK).map(str::to_string).collect()
}

impl DocumentSource for TextSource {
    fn open(&self, path: &Path) -> Result<OpenedDocument, ExtractionError> {
        let content = std::fs::read_to_string(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pages = split_pages(&content);

        Ok(OpenedDocument {
            fast: Box::new(PagedText::new(pages.clone())),
            layout: Box::new(PagedText::with_detector(
                pages,
                GridDetector::new(self.table_min_rows),
            )),
        })
    }

    fn name(&self) -> &str {
        "text"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }
}
