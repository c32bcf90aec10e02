use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::io::{Cursor, Read, Seek};

use crate::error::{Result, TaxExtractorError};
use crate::schema::DocumentKind;

/// Renders every sheet as a `--- Sheet: <name> ---` section with one pipe-joined line per
/// row that has at least one non-blank cell. Sections are separated by a blank line.
pub fn extract_spreadsheet_text(bytes: &[u8], kind: &DocumentKind) -> Result<String> {
    let cursor = Cursor::new(bytes);

    match kind {
        DocumentKind::Xlsx => {
            let workbook = Xlsx::new(cursor)
                .map_err(|e| TaxExtractorError::parsing(format!("Failed to parse XLSX: {}", e)))?;
            render_workbook(workbook)
        }
        DocumentKind::Xls => {
            let workbook = Xls::new(cursor)
                .map_err(|e| TaxExtractorError::parsing(format!("Failed to parse XLS: {}", e)))?;
            render_workbook(workbook)
        }
        other => Err(TaxExtractorError::UnsupportedFileKind(
            other.label().to_string(),
        )),
    }
}

fn render_workbook<RS, R>(mut workbook: R) -> Result<String>
where
    RS: Read + Seek,
    R: Reader<RS>,
{
    let sheet_names = workbook.sheet_names();
    let mut sections = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        let range = workbook.worksheet_range(name).map_err(|e| {
            TaxExtractorError::parsing(format!("Failed to read sheet '{}': {:?}", name, e))
        })?;
        sections.push(render_sheet(name, &range));
    }

    Ok(sections.join("\n\n"))
}

fn render_sheet(name: &str, range: &Range<Data>) -> String {
    let mut section = format!("\n--- Sheet: {} ---\n", name);

    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(format_cell).collect();
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        section.push_str(&cells.join(" | "));
        section.push('\n');
    }

    section
}

fn format_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR: {:?}", e),
    }
}
