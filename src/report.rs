//! Renderings of a validated entry set: the "IRPP <year>" workbook and the filing feed.

use log::info;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::schema::{ExportFormat, FilingFeedItem, IncomeEntry};

/// Workbook columns, in order, with their display widths.
pub const COLUMNS: [(&str, f64); 10] = [
    ("Description", 30.0),
    ("Form", 8.0),
    ("Code", 8.0),
    ("Code Description", 25.0),
    ("Source Currency", 10.0),
    ("Amount (Source)", 15.0),
    ("Amount (€)", 15.0),
    ("Taxable in France (€)", 15.0),
    ("Taxable in Source Country (€)", 15.0),
    ("Notes", 40.0),
];

pub fn sheet_name(tax_year: i32) -> String {
    format!("IRPP {}", tax_year)
}

/// Whatever `export` produced for the requested format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportBundle {
    /// `.xlsx` bytes.
    pub workbook: Option<Vec<u8>>,
    /// Pretty-printed filing feed JSON.
    pub filing_feed: Option<String>,
}

pub fn export(
    entries: &[IncomeEntry],
    tax_year: i32,
    format: ExportFormat,
) -> Result<ExportBundle> {
    let mut bundle = ExportBundle::default();
    if format.includes_workbook() {
        bundle.workbook = Some(build_workbook(entries, tax_year)?);
    }
    if format.includes_filing_feed() {
        bundle.filing_feed = Some(filing_feed_json(entries)?);
    }
    Ok(bundle)
}

/// Builds a single-sheet workbook: one bold header row, then one row per entry.
pub fn build_workbook(entries: &[IncomeEntry], tax_year: i32) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(tax_year))?;

    for (col, (title, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, *width)?;
        worksheet.write_string_with_format(0, col, *title, &header)?;
    }

    for (index, entry) in entries.iter().enumerate() {
        write_entry(worksheet, index as u32 + 1, entry)?;
    }

    let bytes = workbook.save_to_buffer()?;
    info!(
        "Built workbook '{}' with {} rows ({} bytes)",
        sheet_name(tax_year),
        entries.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn write_entry(worksheet: &mut Worksheet, row: u32, entry: &IncomeEntry) -> Result<()> {
    worksheet.write_string(row, 0, entry.description.as_str())?;
    worksheet.write_string(row, 1, entry.form.as_str())?;
    worksheet.write_string(row, 2, entry.code.as_str())?;
    worksheet.write_string(row, 3, entry.code_description.as_str())?;
    worksheet.write_string(row, 4, entry.source_currency.as_str())?;
    write_amount(worksheet, row, 5, Some(entry.amount_source))?;
    write_amount(worksheet, row, 6, Some(entry.amount_eur))?;
    write_amount(worksheet, row, 7, entry.taxable_france)?;
    write_amount(worksheet, row, 8, entry.taxable_source_country)?;
    worksheet.write_string(row, 9, entry.notes.as_str())?;
    Ok(())
}

// Blank amounts leave the cell empty.
fn write_amount(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    amount: Option<Decimal>,
) -> Result<()> {
    if let Some(value) = amount.and_then(|a| a.to_f64()) {
        worksheet.write_number(row, col, value)?;
    }
    Ok(())
}

/// Entries with a taxable amount, as `{form, code, description, value}` items.
///
/// The France-taxable amount wins when both are present.
pub fn build_filing_feed(entries: &[IncomeEntry]) -> Vec<FilingFeedItem> {
    entries
        .iter()
        .filter_map(|entry| {
            let value = entry
                .taxable_france
                .or(entry.taxable_source_country)?
                .to_f64()?;
            Some(FilingFeedItem {
                form: entry.form.clone(),
                code: entry.code.clone(),
                description: entry.description.clone(),
                value,
            })
        })
        .collect()
}

pub fn filing_feed_json(entries: &[IncomeEntry]) -> Result<String> {
    let feed = build_filing_feed(entries);
    Ok(serde_json::to_string_pretty(&feed)?)
}

/// JSON Schema of a single filing feed item.
pub fn filing_feed_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(FilingFeedItem)
}
