use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{Result, TaxExtractorError};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts paragraph text from a DOCX archive, one paragraph per line, in document order.
///
/// Runs inside a paragraph are concatenated; a run's `<w:tab/>` becomes a tab and `<w:br/>` a
/// newline. Paragraphs nested in text boxes get their own line after the enclosing paragraph.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TaxExtractorError::parsing(format!("Failed to open DOCX as ZIP: {}", e)))?;

    let mut document_xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| TaxExtractorError::parsing(format!("Missing {}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut document_xml)?;

    paragraphs_from_xml(&document_xml).map(|paragraphs| paragraphs.join("\n"))
}

fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    // Slots in `paragraphs` of the paragraphs still open, innermost last.
    let mut open_paragraphs: Vec<usize> = Vec::new();
    let mut elements: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"w:p" {
                    open_paragraphs.push(paragraphs.len());
                    paragraphs.push(String::new());
                }
                elements.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let in_run = matches!(elements.last().map(Vec::as_slice), Some(b"w:r"));
                match e.name().as_ref() {
                    b"w:p" => paragraphs.push(String::new()),
                    b"w:tab" if in_run => {
                        if let Some(paragraph) = innermost(&mut paragraphs, &open_paragraphs) {
                            paragraph.push('\t');
                        }
                    }
                    b"w:br" | b"w:cr" if in_run => {
                        if let Some(paragraph) = innermost(&mut paragraphs, &open_paragraphs) {
                            paragraph.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t))
                if matches!(elements.last().map(Vec::as_slice), Some(b"w:t")) =>
            {
                let text = t
                    .unescape()
                    .map_err(|e| TaxExtractorError::parsing(format!("Invalid DOCX text: {}", e)))?;
                if let Some(paragraph) = innermost(&mut paragraphs, &open_paragraphs) {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"w:p" {
                    open_paragraphs.pop();
                }
                elements.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TaxExtractorError::parsing(format!(
                    "Malformed DOCX XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn innermost<'a>(paragraphs: &'a mut [String], open: &[usize]) -> Option<&'a mut String> {
    open.last().and_then(|&slot| paragraphs.get_mut(slot))
}
