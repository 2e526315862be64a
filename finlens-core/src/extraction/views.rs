//! Page-addressable document views.
//!
//! A document is read through two independent views over the same page
//! sequence: a fast plain-text view used for every page, and a layout-aware
//! view consulted only for pages that look tabular. Both are addressed by
//! explicit 1-indexed page number.

use crate::error::ExtractionError;
use crate::extraction::tables::GridDetector;
use crate::types::RawTable;
use std::path::Path;

/// Fast plain-text pass over a document.
pub trait FastTextView: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_text(&self, page: u32) -> Result<String, ExtractionError>;
}

/// Layout-aware pass: page prose plus detected table grids.
pub trait LayoutView: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_text(&self, page: u32) -> Result<String, ExtractionError>;

    /// Tables on the page, top to bottom.
    fn page_tables(&self, page: u32) -> Result<Vec<RawTable>, ExtractionError>;
}

/// Both views of one opened document.
pub struct OpenedDocument {
    pub fast: Box<dyn FastTextView>,
    pub layout: Box<dyn LayoutView>,
}

/// Opens files of one type into their two views.
pub trait DocumentSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<OpenedDocument, ExtractionError>;

    /// Source name for logging
    fn name(&self) -> &str;

    fn supports_file_type(&self, path: &Path) -> bool;
}

pub(crate) fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

enum PageTables {
    Detect(GridDetector),
    Fixed(Vec<Vec<RawTable>>),
}

/// Page texts held in memory, usable as either view.
///
/// Tables come from running a [`GridDetector`] over the page text, or from a
/// fixed per-page list when the caller already knows the grids.
pub struct PagedText {
    pages: Vec<String>,
    tables: PageTables,
}

impl PagedText {
    pub fn new(pages: Vec<String>) -> Self {
        Self::with_detector(pages, GridDetector::new(2))
    }

    pub fn with_detector(pages: Vec<String>, detector: GridDetector) -> Self {
        Self {
            pages,
            tables: PageTables::Detect(detector),
        }
    }

    /// `tables[i]` holds the grids of page `i + 1`; missing entries mean no tables.
    pub fn with_tables(pages: Vec<String>, tables: Vec<Vec<RawTable>>) -> Self {
        Self {
            pages,
            tables: PageTables::Fixed(tables),
        }
    }

    fn page(&self, page: u32) -> Result<&str, ExtractionError> {
        let index = (page as usize).checked_sub(1);
        index
            .and_then(|i| self.pages.get(i))
            .map(String::as_str)
            .ok_or_else(|| ExtractionError::Page {
                page,
                message: format!("page out of range (document has {} pages)", self.pages.len()),
            })
    }

    fn count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }
}

impl FastTextView for PagedText {
    fn page_count(&self) -> u32 {
        self.count()
    }

    fn page_text(&self, page: u32) -> Result<String, ExtractionError> {
        self.page(page).map(str::to_string)
    }
}

impl LayoutView for PagedText {
    fn page_count(&self) -> u32 {
        self.count()
    }

    fn page_text(&self, page: u32) -> Result<String, ExtractionError> {
        self.page(page).map(str::to_string)
    }

    fn page_tables(&self, page: u32) -> Result<Vec<RawTable>, ExtractionError> {
        let text = self.page(page)?;
        Ok(match &self.tables {
            PageTables::Detect(detector) => detector.detect(text),
            PageTables::Fixed(per_page) => per_page
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default(),
        })
    }
}
