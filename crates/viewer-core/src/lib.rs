mod render;
mod search;

pub use render::{RenderApply, RenderOutcome, RenderTicket, RenderedPage};
pub use search::{SearchMatch, SearchStart, SearchStep, DEFAULT_SEARCH_PAGE_LIMIT};

use doc_model::{
    apply_reader_action, DocumentId, DocumentRecord, ReaderAction, ReaderState, Rotation, Zoom,
};
use pdf_engine::{PdfBackend, PdfDocument};
use search::{scan_page, SearchScan};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("File not available. Please re-upload the PDF. (document {id})")]
    ContentUnavailable { id: DocumentId },
    #[error("{0}")]
    Load(String),
    #[error("no document has been opened in this session")]
    NothingToRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    Loading,
    Ready,
    LoadError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    Idle,
    Rendering,
    Rendered,
    RenderError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Highest page number a text search will look at.
    pub search_page_limit: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self { search_page_limit: DEFAULT_SEARCH_PAGE_LIMIT }
    }
}

/// State of the one open document: navigation, zoom, rotation, render
/// sequencing and text search.
///
/// Every change to the page, zoom or rotation while a document is loaded
/// issues a [`RenderTicket`]. Tickets carry increasing sequence numbers and
/// only the most recently issued one may update the pixel surface; results
/// of older tickets are dropped when they complete.
pub struct ViewingSession<B: PdfBackend> {
    backend: B,
    limits: SessionLimits,
    record: Option<DocumentRecord>,
    document: Option<B::Document>,
    phase: SessionPhase,
    page_phase: PagePhase,
    reader: ReaderState,
    total_pages: u32,
    load_error: Option<String>,
    render_error: Option<String>,
    surface: Option<RenderedPage>,
    next_render_sequence: u64,
    latest_render: Option<u64>,
    search_query: String,
    search_matches: Vec<SearchMatch>,
    active_scan: Option<SearchScan>,
    pending_query: Option<String>,
}

impl<B: PdfBackend> ViewingSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_limits(backend, SessionLimits::default())
    }

    pub fn with_limits(backend: B, limits: SessionLimits) -> Self {
        Self {
            backend,
            limits,
            record: None,
            document: None,
            phase: SessionPhase::Empty,
            page_phase: PagePhase::Idle,
            reader: ReaderState::default(),
            total_pages: 0,
            load_error: None,
            render_error: None,
            surface: None,
            next_render_sequence: 0,
            latest_render: None,
            search_query: String::new(),
            search_matches: Vec::new(),
            active_scan: None,
            pending_query: None,
        }
    }

    /// Decodes the record's content and, on success, requests the first
    /// page. A record without live content is rejected before anything is
    /// decoded and leaves the current session untouched.
    pub fn open(&mut self, record: &DocumentRecord) -> Result<RenderTicket, SessionError> {
        let Some(content) = record.content.clone() else {
            warn!(id = %record.id, "record has no live content");
            return Err(SessionError::ContentUnavailable { id: record.id.clone() });
        };

        if self.phase != SessionPhase::Empty {
            self.close();
        }

        self.record = Some(record.clone());
        self.phase = SessionPhase::Loading;

        match self.backend.decode(content.bytes()) {
            Ok(document) => {
                self.total_pages = document.page_count();
                self.reader = ReaderState::default();
                self.document = Some(document);
                self.phase = SessionPhase::Ready;

                info!(id = %record.id, pages = self.total_pages, "opened document");
                Ok(self.issue_render())
            }
            Err(err) => {
                let message = format!("Error loading PDF: {err}");
                warn!(id = %record.id, error = %err, "failed to load document");

                self.load_error = Some(message.clone());
                self.phase = SessionPhase::LoadError;
                Err(SessionError::Load(message))
            }
        }
    }

    /// Opens the last record again, typically after a load error.
    pub fn retry(&mut self) -> Result<RenderTicket, SessionError> {
        let record = self.record.clone().ok_or(SessionError::NothingToRetry)?;
        self.close();
        self.open(&record)
    }

    /// Drops the document and returns every attribute to its initial value.
    /// Outstanding render tickets and any running scan become stale.
    pub fn close(&mut self) {
        if let Some(record) = self.record.take() {
            info!(id = %record.id, "closed viewing session");
        }

        self.document = None;
        self.phase = SessionPhase::Empty;
        self.page_phase = PagePhase::Idle;
        self.reader = ReaderState::default();
        self.total_pages = 0;
        self.load_error = None;
        self.render_error = None;
        self.surface = None;
        self.latest_render = None;
        self.search_query.clear();
        self.search_matches.clear();
        self.active_scan = None;
        self.pending_query = None;
    }

    /// Applies a navigation, zoom or rotation change. Without a loaded
    /// document nothing changes.
    pub fn apply(&mut self, action: ReaderAction) -> Option<RenderTicket> {
        self.document.as_ref()?;

        if !apply_reader_action(&mut self.reader, self.total_pages, action) {
            return None;
        }

        self.request_render()
    }

    pub fn go_to_page(&mut self, page_number: u32) -> Option<RenderTicket> {
        self.apply(ReaderAction::GoToPage(page_number))
    }

    pub fn next_page(&mut self) -> Option<RenderTicket> {
        self.apply(ReaderAction::NextPage)
    }

    pub fn previous_page(&mut self) -> Option<RenderTicket> {
        self.apply(ReaderAction::PreviousPage)
    }

    pub fn zoom_in(&mut self) -> Option<RenderTicket> {
        self.apply(ReaderAction::ZoomIn)
    }

    pub fn zoom_out(&mut self) -> Option<RenderTicket> {
        self.apply(ReaderAction::ZoomOut)
    }

    pub fn rotate(&mut self) -> Option<RenderTicket> {
        self.apply(ReaderAction::Rotate)
    }

    /// Issues a render for the current parameters, if a document is loaded.
    pub fn request_render(&mut self) -> Option<RenderTicket> {
        self.document.as_ref()?;
        Some(self.issue_render())
    }

    pub fn execute_render(&self, ticket: &RenderTicket) -> RenderOutcome {
        match &self.document {
            Some(document) => ticket.execute(document),
            None => RenderOutcome::closed(ticket),
        }
    }

    pub fn complete_render(&mut self, outcome: RenderOutcome) -> RenderApply {
        if self.latest_render != Some(outcome.sequence) {
            debug!(
                sequence = outcome.sequence,
                latest = ?self.latest_render,
                "discarding superseded render"
            );
            return RenderApply::Discarded;
        }

        match outcome.result {
            Ok(page) => {
                debug!(
                    page = page.page_number,
                    width = page.viewport.width_px,
                    height = page.viewport.height_px,
                    "rendered page"
                );
                self.surface = Some(page);
                self.render_error = None;
                self.page_phase = PagePhase::Rendered;
                RenderApply::Applied
            }
            Err(err) => {
                warn!(page = outcome.page_number, error = %err, "failed to render page");
                self.render_error = Some(format!("Error rendering page: {err}"));
                self.page_phase = PagePhase::RenderError;
                RenderApply::Failed
            }
        }
    }

    pub fn run_render(&mut self, ticket: RenderTicket) -> RenderApply {
        let outcome = self.execute_render(&ticket);
        self.complete_render(outcome)
    }

    pub fn render_current_page(&mut self) -> Option<RenderApply> {
        let ticket = self.request_render()?;
        Some(self.run_render(ticket))
    }

    pub fn begin_search(&mut self, query: &str) -> SearchStart {
        if query.trim().is_empty() || self.document.is_none() {
            self.search_query = query.to_owned();
            self.search_matches.clear();
            self.active_scan = None;
            self.pending_query = None;
            return SearchStart::Cleared;
        }

        if self.active_scan.is_some() {
            debug!(query, "search already running; queued");
            self.pending_query = Some(query.to_owned());
            return SearchStart::Queued;
        }

        debug!(query, pages = self.total_pages.min(self.limits.search_page_limit), "starting search");
        self.search_query = query.to_owned();
        self.active_scan =
            Some(SearchScan::new(query, self.total_pages, self.limits.search_page_limit));
        SearchStart::Started
    }

    /// Scans the next page of the running search.
    pub fn step_search(&mut self) -> SearchStep {
        let Some(document) = self.document.as_ref() else {
            return SearchStep::Idle;
        };
        let Some(scan) = self.active_scan.as_mut() else {
            return SearchStep::Idle;
        };

        if let Some(page_number) = scan.advance() {
            return match scan_page(document, page_number, scan.needle()) {
                Ok(Some(excerpt)) => {
                    scan.matches.push(SearchMatch { page_number, excerpt });
                    SearchStep::Scanned { page_number, matched: true }
                }
                Ok(None) => SearchStep::Scanned { page_number, matched: false },
                Err(err) => {
                    debug!(page_number, error = %err, "skipping unreadable page during search");
                    SearchStep::Skipped { page_number }
                }
            };
        }

        let Some(finished) = self.active_scan.take() else {
            return SearchStep::Idle;
        };

        let matches = finished.matches.len();
        info!(query = %finished.query, matches, "search finished");
        self.search_query = finished.query;
        self.search_matches = finished.matches;

        if let Some(pending) = self.pending_query.take() {
            self.begin_search(&pending);
        }

        SearchStep::Finished { matches }
    }

    /// Runs a search, and any query queued behind it, to completion.
    pub fn search(&mut self, query: &str) -> &[SearchMatch] {
        self.begin_search(query);
        while self.step_search() != SearchStep::Idle {}
        &self.search_matches
    }

    pub fn is_searching(&self) -> bool {
        self.active_scan.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn page_phase(&self) -> PagePhase {
        self.page_phase
    }

    pub fn reader(&self) -> ReaderState {
        self.reader
    }

    pub fn current_page(&self) -> u32 {
        self.reader.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn zoom(&self) -> Zoom {
        self.reader.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.reader.rotation
    }

    pub fn can_zoom_in(&self) -> bool {
        self.reader.zoom.can_zoom_in()
    }

    pub fn can_zoom_out(&self) -> bool {
        self.reader.zoom.can_zoom_out()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_matches(&self) -> &[SearchMatch] {
        &self.search_matches
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn render_error(&self) -> Option<&str> {
        self.render_error.as_deref()
    }

    pub fn surface(&self) -> Option<&RenderedPage> {
        self.surface.as_ref()
    }

    pub fn record(&self) -> Option<&DocumentRecord> {
        self.record.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    fn issue_render(&mut self) -> RenderTicket {
        self.next_render_sequence += 1;
        let sequence = self.next_render_sequence;

        self.latest_render = Some(sequence);
        self.page_phase = PagePhase::Rendering;

        RenderTicket {
            sequence,
            page_number: self.reader.current_page,
            zoom: self.reader.zoom,
            rotation: self.reader.rotation,
        }
    }
}

#[cfg(test)]
mod testing;
