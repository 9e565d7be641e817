use pdf_engine::{PdfDocument, PdfEngineError, PdfPage};

pub const DEFAULT_SEARCH_PAGE_LIMIT: u32 = 50;

const EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub page_number: u32,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStart {
    /// Blank query or no document: results were cleared, nothing scanned.
    Cleared,
    Started,
    /// A scan is running; this query replaces any earlier pending one and
    /// starts once the running scan finishes.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// No scan is active.
    Idle,
    Scanned { page_number: u32, matched: bool },
    /// The page could not be read and was left out of the results.
    Skipped { page_number: u32 },
    /// The scan ran past its last page and its matches were committed.
    Finished { matches: usize },
}

#[derive(Debug)]
pub(crate) struct SearchScan {
    pub(crate) query: String,
    needle: String,
    next_page: u32,
    last_page: u32,
    pub(crate) matches: Vec<SearchMatch>,
}

impl SearchScan {
    pub(crate) fn new(query: &str, total_pages: u32, page_limit: u32) -> Self {
        Self {
            query: query.to_owned(),
            needle: query.to_lowercase(),
            next_page: 1,
            last_page: total_pages.min(page_limit),
            matches: Vec::new(),
        }
    }

    pub(crate) fn advance(&mut self) -> Option<u32> {
        if self.next_page > self.last_page {
            return None;
        }

        let page_number = self.next_page;
        self.next_page += 1;
        Some(page_number)
    }

    pub(crate) fn needle(&self) -> &str {
        &self.needle
    }
}

/// Returns the excerpt for `page_number` when its text contains `needle`.
pub(crate) fn scan_page<D: PdfDocument>(
    document: &D,
    page_number: u32,
    needle: &str,
) -> Result<Option<String>, PdfEngineError> {
    let page = document.page(page_number)?;
    let text = page.text()?.joined().to_lowercase();

    if !text.contains(needle) {
        return Ok(None);
    }

    let mut excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    excerpt.push_str("...");
    Ok(Some(excerpt))
}
