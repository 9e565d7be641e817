use doc_model::{Rotation, Zoom};
use pdf_engine::{PdfDocument, PdfEngineError, PdfPage, RgbaImage, Viewport};

/// A render request for one set of view parameters. The sequence number
/// decides whether the eventual result is still worth showing.
#[must_use = "a render ticket does nothing until it is executed and completed"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    pub(crate) sequence: u64,
    pub(crate) page_number: u32,
    pub(crate) zoom: Zoom,
    pub(crate) rotation: Rotation,
}

impl RenderTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Fetches the page, builds its viewport and rasterizes it.
    pub fn execute<D: PdfDocument>(&self, document: &D) -> RenderOutcome {
        RenderOutcome {
            sequence: self.sequence,
            page_number: self.page_number,
            result: render_page(document, self),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_number: u32,
    pub viewport: Viewport,
    pub image: RgbaImage,
}

#[derive(Debug)]
pub struct RenderOutcome {
    pub(crate) sequence: u64,
    pub(crate) page_number: u32,
    pub(crate) result: Result<RenderedPage, PdfEngineError>,
}

impl RenderOutcome {
    pub(crate) fn closed(ticket: &RenderTicket) -> Self {
        Self {
            sequence: ticket.sequence,
            page_number: ticket.page_number,
            result: Err(PdfEngineError::Backend("document is closed".to_owned())),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// What `complete_render` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderApply {
    /// The image became the current surface.
    Applied,
    /// The render failed and the error is now shown for the page.
    Failed,
    /// A newer request was issued after this one; the result was dropped.
    Discarded,
}

fn render_page<D: PdfDocument>(
    document: &D,
    ticket: &RenderTicket,
) -> Result<RenderedPage, PdfEngineError> {
    let page = document.page(ticket.page_number)?;
    let viewport = page.viewport(ticket.zoom.factor(), ticket.rotation.degrees());
    let image = page.render(&viewport)?;

    Ok(RenderedPage { page_number: ticket.page_number, viewport, image })
}
