//! Plain-text extraction from client documents.
//!
//! Every supported format is reduced to a single text blob. Failures are never fatal for
//! the batch: a document that cannot be read contributes empty text and a warning.

mod docx;
mod pdf;
mod spreadsheet;
mod text;

use log::{debug, info, warn};

use crate::error::TaxExtractorError;
use crate::schema::{Document, DocumentKind, Warning, WarningKind};

pub use docx::extract_docx_text;
pub use pdf::extract_pdf_text;
pub use spreadsheet::extract_spreadsheet_text;
pub use text::{extract_json_text, extract_plain_text};

/// Text recovered from one document plus anything worth telling the operator.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Text of a whole batch, each document framed by start/end markers.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBatch {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Extracts text from one document, converting any failure into a warning.
pub fn extract_text(document: &Document) -> ExtractedText {
    let kind = document.kind();
    debug!(
        "Extracting {} ({} bytes) as {}",
        document.filename,
        document.bytes.len(),
        kind.label()
    );

    let mut warnings = Vec::new();
    let result = match &kind {
        DocumentKind::Pdf => extract_pdf_text(&document.bytes),
        DocumentKind::Docx => extract_docx_text(&document.bytes),
        DocumentKind::Xlsx | DocumentKind::Xls => {
            extract_spreadsheet_text(&document.bytes, &kind)
        }
        DocumentKind::Text => Ok(extract_plain_text(&document.bytes)),
        DocumentKind::Json => {
            let (text, parse_error) = extract_json_text(&document.bytes);
            if let Some(reason) = parse_error {
                warnings.push(Warning::new(
                    WarningKind::ExtractionFailed,
                    format!(
                        "Error parsing JSON file '{}': {}. Using raw text instead.",
                        document.filename, reason
                    ),
                ));
            }
            Ok(text)
        }
        DocumentKind::Unknown(extension) => {
            Err(TaxExtractorError::UnsupportedFileKind(extension.clone()))
        }
    };

    let text = match result {
        Ok(text) => text,
        Err(TaxExtractorError::UnsupportedFileKind(extension)) => {
            warn!("Skipping {}: unsupported file type", document.filename);
            warnings.push(Warning::new(
                WarningKind::UnsupportedFile,
                format!(
                    "Unsupported file type: '{}' ({})",
                    extension, document.filename
                ),
            ));
            String::new()
        }
        Err(e) => {
            warn!("Text extraction failed for {}: {}", document.filename, e);
            warnings.push(Warning::new(
                WarningKind::ExtractionFailed,
                format!(
                    "Error extracting text from {} file '{}': {}",
                    kind.label().to_uppercase(),
                    document.filename,
                    e
                ),
            ));
            String::new()
        }
    };

    ExtractedText { text, warnings }
}

impl ExtractedBatch {
    /// Extracts `document` and appends its framed text and warnings to the batch.
    pub fn add(&mut self, document: &Document) {
        let extracted = extract_text(document);
        info!(
            "Extracted {} characters from {}",
            extracted.text.chars().count(),
            document.filename
        );
        self.text
            .push_str(&frame_document(&document.filename, &extracted.text));
        self.warnings.extend(extracted.warnings);
    }
}

/// Extracts and concatenates a batch in upload order.
pub fn extract_documents(documents: &[Document]) -> ExtractedBatch {
    let mut batch = ExtractedBatch::default();
    for document in documents {
        batch.add(document);
    }
    batch
}

pub fn frame_document(filename: &str, text: &str) -> String {
    format!(
        "\n\n--- START OF DOCUMENT: {name} ---\n\n{text}\n\n--- END OF DOCUMENT: {name} ---\n\n",
        name = filename,
        text = text
    )
}
