//! Scripted in-memory backend for session tests.

use chrono::Utc;
use doc_model::{DocumentContent, DocumentId, DocumentRecord};
use pdf_engine::{
    PageSize, PageText, PdfBackend, PdfDocument, PdfEngineError, PdfPage, RgbaImage, Viewport,
};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ScriptedPage {
    fragments: Option<Vec<String>>,
    render_fails: bool,
}

impl ScriptedPage {
    pub fn text(text: &str) -> Self {
        Self { fragments: Some(vec![text.to_owned()]), render_fails: false }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self {
            fragments: Some(fragments.iter().map(|f| (*f).to_owned()).collect()),
            render_fails: false,
        }
    }

    pub fn unreadable() -> Self {
        Self { fragments: None, render_fails: false }
    }

    pub fn failing_render(mut self) -> Self {
        self.render_fails = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pages: Vec<ScriptedPage>,
    fail_decode: Rc<Cell<bool>>,
    decodes: Rc<Cell<usize>>,
    fetches: Rc<Cell<usize>>,
}

impl ScriptedBackend {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self { pages, ..Self::default() }
    }

    pub fn with_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| ScriptedPage::text(text)).collect())
    }

    pub fn decode_failure_switch(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.fail_decode)
    }

    pub fn decode_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.decodes)
    }

    /// Counts `PdfDocument::page` calls across every decoded document.
    pub fn fetch_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.fetches)
    }
}

pub struct ScriptedDocument {
    pages: Vec<ScriptedPage>,
    fetches: Rc<Cell<usize>>,
}

pub struct ScriptedPageRef<'a> {
    page: &'a ScriptedPage,
    number: u32,
}

impl PdfBackend for ScriptedBackend {
    type Document = ScriptedDocument;

    fn decode(&self, _bytes: &[u8]) -> Result<ScriptedDocument, PdfEngineError> {
        self.decodes.set(self.decodes.get() + 1);

        if self.fail_decode.get() {
            return Err(PdfEngineError::Backend("corrupt cross-reference table".to_owned()));
        }

        Ok(ScriptedDocument { pages: self.pages.clone(), fetches: Rc::clone(&self.fetches) })
    }
}

impl PdfDocument for ScriptedDocument {
    type Page<'a> = ScriptedPageRef<'a>;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn metadata_title(&self) -> Option<String> {
        None
    }

    fn page(&self, page_number: u32) -> Result<ScriptedPageRef<'_>, PdfEngineError> {
        self.fetches.set(self.fetches.get() + 1);

        let page = page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .ok_or(PdfEngineError::PageOutOfRange {
                page: page_number,
                page_count: self.page_count(),
            })?;

        Ok(ScriptedPageRef { page, number: page_number })
    }
}

impl PdfPage for ScriptedPageRef<'_> {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        PageSize { width_pt: 100.0, height_pt: 200.0 }
    }

    fn render(&self, viewport: &Viewport) -> Result<RgbaImage, PdfEngineError> {
        if self.page.render_fails {
            return Err(PdfEngineError::Backend("invalid content stream".to_owned()));
        }

        Ok(RgbaImage::new(viewport.width_px, viewport.height_px))
    }

    fn text(&self) -> Result<PageText, PdfEngineError> {
        self.page
            .fragments
            .clone()
            .map(|fragments| PageText { fragments })
            .ok_or_else(|| PdfEngineError::Backend("no text layer".to_owned()))
    }
}

pub fn record_with_content(id: &str) -> DocumentRecord {
    DocumentRecord {
        content: Some(DocumentContent::new(b"%PDF-1.7".to_vec())),
        ..stale_record(id)
    }
}

pub fn stale_record(id: &str) -> DocumentRecord {
    DocumentRecord {
        id: DocumentId::from(id),
        display_name: format!("{id}.pdf"),
        title: id.to_owned(),
        content: None,
        thumbnail: String::new(),
        uploaded_at: Utc::now(),
    }
}
