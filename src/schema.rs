use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;

// Field names of the JSON objects the extraction model is asked to produce.
pub const FIELD_DESCRIPTION: &str = "Description";
pub const FIELD_FORM: &str = "Form";
pub const FIELD_CODE: &str = "Code";
pub const FIELD_SOURCE_CURRENCY: &str = "Source Currency";
pub const FIELD_AMOUNT_SOURCE: &str = "Amount (Source)";
pub const FIELD_AMOUNT_EUR: &str = "Amount (€)";
pub const FIELD_TAXABLE_FRANCE: &str = "Taxable in France (€)";
pub const FIELD_TAXABLE_SOURCE: &str = "Taxable in Source Country (€)";
pub const FIELD_NOTES: &str = "Notes";

pub const REQUIRED_FIELDS: [&str; 5] = [
    FIELD_DESCRIPTION,
    FIELD_FORM,
    FIELD_CODE,
    FIELD_SOURCE_CURRENCY,
    FIELD_AMOUNT_SOURCE,
];

/// One element of the array recovered from the model response, before validation.
pub type CandidateEntry = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Xlsx,
    Xls,
    Text,
    Json,
    /// Carries the lowercased extension (with its leading dot) for diagnostics.
    Unknown(String),
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            "txt" => Self::Text,
            "json" => Self::Json,
            "" => Self::Unknown(String::new()),
            other => Self::Unknown(format!(".{}", other)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Text => "text",
            Self::Json => "json",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// An uploaded client document. Lives for a single pipeline run.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self { filename, bytes })
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_filename(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abatement {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub taxable_after: Decimal,
}

/// A validated, normalized income line ready for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeEntry {
    pub description: String,
    pub form: String,
    pub code: String,
    /// Looked up from the reference taxonomy; empty when the form/code pair is unknown.
    pub code_description: String,
    pub source_currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_source: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_eur: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub taxable_france: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub taxable_source_country: Option<Decimal>,
    pub notes: String,
    pub valid_code: bool,
    #[serde(default)]
    pub abatement: Option<Abatement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    MissingFields,
    UnparseableNumber,
    UnknownCurrency,
    UnknownCode,
    UnknownForm,
    ExtractionFailed,
    UnsupportedFile,
}

/// A non-fatal anomaly found while extracting or validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilingFeedItem {
    #[schemars(description = "French tax form identifier, e.g. \"2042\"")]
    pub form: String,

    #[schemars(description = "Box code within the form, uppercase alphanumerics, e.g. \"1AJ\"")]
    pub code: String,

    #[schemars(
        description = "Description of the income line as extracted from the client documents"
    )]
    pub description: String,

    #[schemars(
        description = "Amount in euros to declare. The France-taxable amount when present, otherwise the source-country taxable amount."
    )]
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerInfo {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Operator-supplied context for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default)]
    pub taxpayer: Option<TaxpayerInfo>,
    #[serde(default)]
    pub additional_context: String,
}

impl RunContext {
    /// Text handed to the model as "additional context about this taxpayer".
    pub fn model_context(&self, tax_year: i32) -> String {
        let taxpayer = self
            .taxpayer
            .as_ref()
            .filter(|info| !info.name.trim().is_empty());

        match taxpayer {
            Some(info) => {
                let header = format!("Client: {}\nTax Year: {}\n", info.name.trim(), tax_year);
                if self.additional_context.trim().is_empty() {
                    header
                } else {
                    format!("{}\n{}", header, self.additional_context)
                }
            }
            None => self.additional_context.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    #[default]
    Excel,
    Json,
    Both,
}

impl ExportFormat {
    pub fn includes_workbook(self) -> bool {
        matches!(self, Self::Excel | Self::Both)
    }

    pub fn includes_filing_feed(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }
}
