use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
#[cfg(feature = "pdfium")]
pub mod pdfium;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Pixel dimensions of a page under a given scale and rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub rotation_degrees: u16,
    pub width_px: u32,
    pub height_px: u32,
}

impl Viewport {
    pub fn for_page(size: PageSize, scale: f32, rotation_degrees: u16) -> Self {
        let scale = if scale <= 0.0 { 1.0 } else { scale };
        let rotation_degrees = rotation_degrees % 360;

        let width = (size.width_pt * scale).round().max(1.0) as u32;
        let height = (size.height_pt * scale).round().max(1.0) as u32;

        let (width_px, height_px) = match rotation_degrees {
            90 | 270 => (height, width),
            _ => (width, height),
        };

        Self { scale, rotation_degrees, width_px, height_px }
    }
}

/// Text content of a single page, as the fragments the backend reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    pub fragments: Vec<String>,
}

impl PageText {
    pub fn joined(&self) -> String {
        self.fragments.join(" ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Entry point into a PDF library: turns raw bytes into a document handle.
pub trait PdfBackend {
    type Document: PdfDocument;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError>;
}

pub trait PdfDocument {
    type Page<'a>: PdfPage
    where
        Self: 'a;

    fn page_count(&self) -> u32;

    /// The `Title` entry of the document information dictionary, if any.
    fn metadata_title(&self) -> Option<String>;

    /// Fetches a page by its 1-based number.
    fn page(&self, page_number: u32) -> Result<Self::Page<'_>, PdfEngineError>;
}

pub trait PdfPage {
    fn page_number(&self) -> u32;

    fn size(&self) -> PageSize;

    fn viewport(&self, scale: f32, rotation_degrees: u16) -> Viewport {
        Viewport::for_page(self.size(), scale, rotation_degrees)
    }

    /// Rasterizes the page at the viewport's size and rotation. The lopdf
    /// backend has no content rasterizer and draws a blank white page with
    /// a gray border; build with the `pdfium` feature for real output.
    fn render(&self, viewport: &Viewport) -> Result<RgbaImage, PdfEngineError>;

    fn text(&self) -> Result<PageText, PdfEngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
pub struct LopdfDocument {
    doc: Document,
    page_sizes: Vec<PageSize>,
    title: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct LopdfPage<'a> {
    document: &'a LopdfDocument,
    number: u32,
    size: PageSize,
}

impl LopdfDocument {
    fn parse(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut page_sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            page_sizes.push(media_box_size(dict).unwrap_or(DEFAULT_PAGE_SIZE));
        }

        if page_sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        let title = info_title(&doc);

        Ok(Self { doc, page_sizes, title })
    }
}

impl PdfBackend for LopdfBackend {
    type Document = LopdfDocument;

    fn decode(&self, bytes: &[u8]) -> Result<LopdfDocument, PdfEngineError> {
        let document = LopdfDocument::parse(bytes)?;
        debug!(pages = document.page_sizes.len(), "decoded PDF");
        Ok(document)
    }
}

impl PdfDocument for LopdfDocument {
    type Page<'a> = LopdfPage<'a>;

    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn metadata_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn page(&self, page_number: u32) -> Result<LopdfPage<'_>, PdfEngineError> {
        let size = page_number
            .checked_sub(1)
            .and_then(|index| self.page_sizes.get(index as usize))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange {
                page: page_number,
                page_count: self.page_count(),
            })?;

        Ok(LopdfPage { document: self, number: page_number, size })
    }
}

impl PdfPage for LopdfPage<'_> {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        self.size
    }

    fn render(&self, viewport: &Viewport) -> Result<RgbaImage, PdfEngineError> {
        let width = viewport.width_px.max(1);
        let height = viewport.height_px.max(1);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn text(&self) -> Result<PageText, PdfEngineError> {
        let raw = self.document.doc.extract_text(&[self.number])?;
        let fragments = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Ok(PageText { fragments })
    }
}

fn media_box_size(dict: &Dictionary) -> Option<PageSize> {
    let array = dict.get(b"MediaBox").ok()?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

fn info_title(doc: &Document) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    match info.get(b"Title").ok()? {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte order mark,
/// otherwise bytes are taken as Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&byte| byte as char).collect()
}

pub fn default_backend() -> LopdfBackend {
    LopdfBackend::new()
}
