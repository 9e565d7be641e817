//! Backend that rasterizes page content through a PDFium shared library.

use image::imageops;
use pdfium_render::prelude as pdfium;
use tracing::debug;

use crate::{PageSize, PageText, PdfBackend, PdfDocument, PdfEngineError, PdfPage, RgbaImage, Viewport};

#[derive(Clone, Copy)]
pub struct PdfiumBackend {
    pdfium: &'static pdfium::Pdfium,
}

impl PdfiumBackend {
    /// Binds PDFium from the executable's directory, then the working
    /// directory, then the system library path. The binding is kept for
    /// the rest of the process, so bind once and copy the backend.
    pub fn bind() -> Result<Self, PdfEngineError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(ToOwned::to_owned));

        if let Some(ref dir) = exe_dir {
            if let Ok(bindings) = pdfium::Pdfium::bind_to_library(
                pdfium::Pdfium::pdfium_platform_library_name_at_path(dir),
            ) {
                return Ok(Self::keep(bindings));
            }
        }

        let bindings = pdfium::Pdfium::bind_to_library(
            pdfium::Pdfium::pdfium_platform_library_name_at_path("./"),
        )
        .or_else(|_| pdfium::Pdfium::bind_to_system_library())
        .map_err(|err| PdfEngineError::Backend(format!("failed to bind pdfium library: {err}")))?;

        Ok(Self::keep(bindings))
    }

    fn keep(bindings: Box<dyn pdfium::PdfiumLibraryBindings>) -> Self {
        let pdfium: &'static pdfium::Pdfium = Box::leak(Box::new(pdfium::Pdfium::new(bindings)));
        Self { pdfium }
    }
}

pub struct PdfiumDocument {
    document: pdfium::PdfDocument<'static>,
    page_sizes: Vec<PageSize>,
}

pub struct PdfiumPage {
    page: pdfium::PdfPage<'static>,
    number: u32,
    size: PageSize,
}

impl PdfBackend for PdfiumBackend {
    type Document = PdfiumDocument;

    fn decode(&self, bytes: &[u8]) -> Result<PdfiumDocument, PdfEngineError> {
        let document = self.pdfium.load_pdf_from_byte_vec(bytes.to_vec(), None).map_err(backend_error)?;

        let page_sizes: Vec<PageSize> = document
            .pages()
            .iter()
            .map(|page| PageSize { width_pt: page.width().value, height_pt: page.height().value })
            .collect();

        if page_sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        debug!(pages = page_sizes.len(), "decoded PDF with pdfium");
        Ok(PdfiumDocument { document, page_sizes })
    }
}

impl PdfDocument for PdfiumDocument {
    type Page<'a> = PdfiumPage;

    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn metadata_title(&self) -> Option<String> {
        self.document
            .metadata()
            .get(pdfium::PdfDocumentMetadataTagType::Title)
            .map(|tag| tag.value().to_string())
    }

    fn page(&self, page_number: u32) -> Result<PdfiumPage, PdfEngineError> {
        let out_of_range =
            PdfEngineError::PageOutOfRange { page: page_number, page_count: self.page_count() };

        let Some(size) = page_number
            .checked_sub(1)
            .and_then(|index| self.page_sizes.get(index as usize))
            .copied()
        else {
            return Err(out_of_range);
        };

        let index = u16::try_from(page_number - 1).map_err(|_| out_of_range)?;
        let page = self.document.pages().get(index).map_err(backend_error)?;

        Ok(PdfiumPage { page, number: page_number, size })
    }
}

impl PdfPage for PdfiumPage {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        self.size
    }

    fn render(&self, viewport: &Viewport) -> Result<RgbaImage, PdfEngineError> {
        let quarter_turns = (viewport.rotation_degrees / 90) % 4;
        let (width, height) = if quarter_turns % 2 == 1 {
            (viewport.height_px, viewport.width_px)
        } else {
            (viewport.width_px, viewport.height_px)
        };

        let config = pdfium::PdfRenderConfig::new()
            .set_target_width(width.max(1) as i32)
            .set_target_height(height.max(1) as i32);

        let bitmap = self.page.render_with_config(&config).map_err(backend_error)?;
        let upright = RgbaImage::from_raw(
            bitmap.width() as u32,
            bitmap.height() as u32,
            bitmap.as_rgba_bytes().to_vec(),
        )
        .ok_or_else(|| PdfEngineError::Backend("pdfium bitmap has an unexpected size".to_owned()))?;

        Ok(match quarter_turns {
            1 => imageops::rotate90(&upright),
            2 => imageops::rotate180(&upright),
            3 => imageops::rotate270(&upright),
            _ => upright,
        })
    }

    fn text(&self) -> Result<PageText, PdfEngineError> {
        let raw = self.page.text().map_err(backend_error)?.all();
        let fragments = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Ok(PageText { fragments })
    }
}

fn backend_error(err: pdfium::PdfiumError) -> PdfEngineError {
    PdfEngineError::Backend(err.to_string())
}
