use pdf_engine::{PdfDocument, PdfPage};
use tracing::debug;

use crate::CatalogError;

/// Collects the text of every page under a `--- Page N ---` header.
pub fn extract_text<D: PdfDocument>(document: &D) -> Result<String, CatalogError> {
    let mut output = String::new();

    for page_number in 1..=document.page_count() {
        let text = document.page(page_number)?.text()?;
        output.push_str(&format!("\n--- Page {page_number} ---\n{}\n", text.joined()));
    }

    debug!(pages = document.page_count(), chars = output.len(), "extracted text");
    Ok(output)
}

/// `report.pdf` becomes `report_extracted_text.txt`. Only the first
/// `.pdf` is removed.
pub fn extracted_text_file_name(display_name: &str) -> String {
    format!("{}_extracted_text.txt", display_name.replacen(".pdf", "", 1))
}
