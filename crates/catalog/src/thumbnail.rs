use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgba};
use pdf_engine::{PdfDocument, PdfPage, RgbaImage};
use std::io::Cursor;
use tracing::warn;

use crate::settings::format_bytes;
use crate::CatalogError;

/// Scale at which the first page is rendered for a library thumbnail.
pub const THUMBNAIL_SCALE: f32 = 0.5;

const BACKGROUND: Rgba<u8> = Rgba([0xf8, 0xfa, 0xfc, 0xff]);
const BORDER: Rgba<u8> = Rgba([0xe2, 0xe8, 0xf0, 0xff]);
const ICON: Rgba<u8> = Rgba([0x64, 0x74, 0x8b, 0xff]);
const LABEL: Rgba<u8> = Rgba([0x47, 0x55, 0x69, 0xff]);
const CAPTION: Rgba<u8> = Rgba([0x94, 0xa3, 0xb8, 0xff]);

const MIN_PLACEHOLDER_WIDTH: u32 = 20;
const MIN_PLACEHOLDER_HEIGHT: u32 = 28;
const MAX_PLACEHOLDER_SIDE: u32 = 2048;
const LABEL_NAME_CHARS: usize = 17;
const LABEL_MAX_CHARS: usize = LABEL_NAME_CHARS + 3;

/// Dimensions of the synthesized placeholder thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 200, height_px: 280 }
    }
}

pub fn render_thumbnail<D: PdfDocument>(document: &D) -> Result<String, CatalogError> {
    let page = document.page(1)?;
    let viewport = page.viewport(THUMBNAIL_SCALE, 0);
    let image = page.render(&viewport)?;

    Ok(png_data_uri(&image)?)
}

/// Draws a plain document card: border, an icon block standing in for the
/// "PDF" label, and two bars laid out where the file name and file size
/// go. No glyphs are drawn; the bar widths follow the name (cut to 17
/// characters plus "...") and the formatted size.
pub fn placeholder_thumbnail(size: ThumbnailSize, file_name: &str, file_size: u64) -> String {
    let width = size.width_px.clamp(MIN_PLACEHOLDER_WIDTH, MAX_PLACEHOLDER_SIDE);
    let height = size.height_px.clamp(MIN_PLACEHOLDER_HEIGHT, MAX_PLACEHOLDER_SIDE);
    let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);

    for inset in 0..2 {
        stroke_rect(&mut image, inset, inset, width - 2 * inset, height - 2 * inset, BORDER);
    }

    let icon_width = width / 4;
    let icon_height = height / 6;
    fill_rect(&mut image, (width - icon_width) / 2, height * 3 / 10, icon_width, icon_height, ICON);

    let usable = width.saturating_sub(20).max(4);
    let label_width = bar_width(label_chars(file_name), usable);
    fill_rect(&mut image, (width - label_width) / 2, height * 55 / 100, label_width, 6, LABEL);

    let caption_width = bar_width(format_bytes(file_size).chars().count(), usable);
    fill_rect(&mut image, (width - caption_width) / 2, height * 63 / 100, caption_width, 4, CAPTION);

    match png_data_uri(&image) {
        Ok(uri) => uri,
        Err(err) => {
            warn!(error = %err, "failed to encode placeholder thumbnail");
            String::new()
        }
    }
}

pub fn png_data_uri(image: &RgbaImage) -> Result<String, image::ImageError> {
    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png_bytes)))
}

/// Characters the card caption would show for `file_name`.
fn label_chars(file_name: &str) -> usize {
    let count = file_name.chars().count();
    if count > LABEL_NAME_CHARS {
        LABEL_MAX_CHARS
    } else {
        count.max(1)
    }
}

/// Width of a bar standing for `chars` characters out of a full line of
/// `LABEL_MAX_CHARS` spanning `usable` pixels.
fn bar_width(chars: usize, usable: u32) -> u32 {
    let chars = chars.min(LABEL_MAX_CHARS) as u32;
    (chars * usable / LABEL_MAX_CHARS as u32).max(4)
}

fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = (x + width).min(image.width());
    let y_end = (y + height).min(image.height());

    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, color);
        }
    }
}

fn stroke_rect(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    if width == 0 || height == 0 {
        return;
    }

    fill_rect(image, x, y, width, 1, color);
    fill_rect(image, x, y + height - 1, width, 1, color);
    fill_rect(image, x, y, 1, height, color);
    fill_rect(image, x + width - 1, y, 1, height, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::fixtures::FixturePdf;
    use pdf_engine::{default_backend, PdfBackend};

    fn decode_data_uri(uri: &str) -> image::DynamicImage {
        let payload = uri.strip_prefix("data:image/png;base64,").expect("png data uri expected");
        let bytes = STANDARD.decode(payload).expect("valid base64");
        image::load_from_memory(&bytes).expect("valid png")
    }

    #[test]
    fn placeholder_has_requested_dimensions() {
        let uri = placeholder_thumbnail(ThumbnailSize::default(), "report.pdf", 2048);
        let image = decode_data_uri(&uri);

        assert_eq!((image.width(), image.height()), (200, 280));
    }

    #[test]
    fn placeholder_draws_border_and_icon() {
        let uri = placeholder_thumbnail(ThumbnailSize::default(), "report.pdf", 2048);
        let image = decode_data_uri(&uri).to_rgba8();

        assert_eq!(*image.get_pixel(0, 0), BORDER);
        assert_eq!(*image.get_pixel(1, 140), BORDER);
        assert_eq!(*image.get_pixel(10, 10), BACKGROUND);
        assert_eq!(*image.get_pixel(100, 90), ICON);
    }

    #[test]
    fn narrow_sizes_are_widened_to_a_drawable_card() {
        for size in [
            ThumbnailSize { width_px: 16, height_px: 280 },
            ThumbnailSize { width_px: 0, height_px: 0 },
            ThumbnailSize { width_px: 19, height_px: 27 },
            ThumbnailSize { width_px: u32::MAX, height_px: 30 },
        ] {
            let uri = placeholder_thumbnail(size, "a-rather-long-report-name.pdf", u64::MAX);
            let image = decode_data_uri(&uri);

            assert!((20..=2048).contains(&image.width()));
            assert!((28..=2048).contains(&image.height()));
        }
    }

    #[test]
    fn label_bar_tracks_truncated_file_name() {
        assert_eq!(label_chars(""), 1);
        assert_eq!(label_chars("report.pdf"), 10);
        assert_eq!(label_chars("exactly-17-chars."), 17);
        assert_eq!(label_chars("a-rather-long-report-name.pdf"), 20);
        assert!(bar_width(label_chars("report.pdf"), 180) < bar_width(20, 180));
        assert_eq!(bar_width(20, 180), 180);
    }

    #[test]
    fn rendered_thumbnail_is_half_scale_first_page() {
        let bytes = FixturePdf::new().page("cover").page("body").build();
        let document = default_backend().decode(&bytes).expect("decode should succeed");

        let uri = render_thumbnail(&document).expect("thumbnail should render");
        let image = decode_data_uri(&uri);

        assert_eq!((image.width(), image.height()), (306, 396));
    }
}
