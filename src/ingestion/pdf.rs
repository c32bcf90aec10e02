use log::debug;
use lopdf::Document;

use crate::error::{Result, TaxExtractorError};

/// Extracts the text of every page, in page order, one page per line block.
///
/// A page whose content stream cannot be decoded contributes an empty string; only a
/// document that cannot be loaded at all is an error.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let document = Document::load_mem(bytes)
        .map_err(|e| TaxExtractorError::parsing(format!("Failed to load PDF: {}", e)))?;

    let pages = document.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => page_texts.push(text),
            Err(e) => {
                debug!("Page {} yielded no text: {}", page_number, e);
                page_texts.push(String::new());
            }
        }
    }

    Ok(page_texts.join("\n"))
}
