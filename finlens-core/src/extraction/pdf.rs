//! PDF document source.
//!
//! The fast view reads each page's text through `lopdf`. The layout view uses
//! `pdf-extract`, which keeps positional spacing between columns, and runs
//! the grid detector over it.

use crate::error::ExtractionError;
use crate::extraction::tables::GridDetector;
use crate::extraction::views::{has_extension, DocumentSource, OpenedDocument, PagedText};
use lopdf::Document;
use std::path::Path;
use tracing::debug;

pub struct PdfSource {
    table_min_rows: usize,
}

impl PdfSource {
    pub fn new(table_min_rows: usize) -> Self {
        Self { table_min_rows }
    }
}

impl DocumentSource for PdfSource {
    fn open(&self, path: &Path) -> Result<OpenedDocument, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let fast_pages = fast_pages(&bytes)?;
        let layout_pages = layout_pages(&bytes)?;
        debug!(
            fast_pages = fast_pages.len(),
            layout_pages = layout_pages.len(),
            "opened PDF views"
        );

        Ok(OpenedDocument {
            fast: Box::new(PagedText::new(fast_pages)),
            layout: Box::new(PagedText::with_detector(
                layout_pages,
                GridDetector::new(self.table_min_rows),
            )),
        })
    }

    fn name(&self) -> &str {
        "pdf"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        has_extension(path, "pdf")
    }
}

/// Per-page plain text via lopdf. Any unreadable page fails the document.
fn fast_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf {
        view: "fast",
        message: e.to_string(),
    })?;

    document
        .get_pages()
        .keys()
        .map(|&page| {
            document
                .extract_text(&[page])
                .map_err(|e| ExtractionError::Page {
                    page,
                    message: e.to_string(),
                })
        })
        .collect()
}

/// Per-page positional text via pdf-extract.
fn layout_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    // pdf-extract can panic on malformed PDFs
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionError::Pdf {
            view: "layout",
            message: e.to_string(),
        }),
        Err(_) => Err(ExtractionError::Pdf {
            view: "layout",
            message: "extractor panicked (malformed PDF)".to_string(),
        }),
    }
}
