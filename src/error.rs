use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxExtractorError {
    #[error("API key is required to query the extraction model")]
    MissingApiKey,

    #[error("Extraction service error (status {status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("Extraction service returned an unusable response: {0}")]
    InvalidServiceResponse(String),

    #[cfg(feature = "openai")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Model output could not be parsed as a JSON array: {0}")]
    UnparseableResponse(String),

    #[error("Document parse error: {0}")]
    DocumentParse(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileKind(String),

    #[error("Invalid exchange rate {rate} for currency {currency}: must be greater than zero")]
    InvalidExchangeRate { currency: String, rate: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Workbook export error: {0}")]
    ExportError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TaxExtractorError {
    pub fn parsing(reason: impl ToString) -> Self {
        Self::DocumentParse(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaxExtractorError>;
