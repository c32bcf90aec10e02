//! # IRPP Extractor
//!
//! A library for turning a client's tax documents into validated income lines for the
//! French income tax return (IRPP).
//!
//! ## Core Concepts
//!
//! - **Documents**: PDF, DOCX, XLSX/XLS, TXT and JSON files are reduced to plain text. A file
//!   that cannot be read becomes a warning, never a failed run.
//! - **Extraction**: the combined text is sent once to a chat-completions model, which is
//!   asked for a JSON array of income entries.
//! - **Validation**: entries are normalized, converted to euros with the run's exchange
//!   rates, classified against the reference taxonomy of forms and codes, and passed through
//!   special fiscal rules (e.g. the 71% abatement on 2042/5TE).
//! - **Reports**: an `IRPP <year>` workbook and a filing feed JSON.
//!
//! ## Example
//!
//! ```rust,ignore
//! use irpp_extractor::*;
//!
//! let config = ExtractorConfig::from_env()?;
//! let pipeline = TaxPipeline::from_config(&config)?;
//!
//! let documents = vec![Document::from_path("questionnaire.pdf".as_ref())?];
//! let output = pipeline.run(&documents, &RunContext::default(), None).await?;
//!
//! for warning in &output.warnings {
//!     println!("warning: {}", warning);
//! }
//! let bundle = output.export(ExportFormat::Both)?;
//! ```

pub mod accounts;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod parser;
pub mod report;
pub mod rules;
pub mod schema;
pub mod taxonomy;
pub mod utils;
pub mod validation;

pub use accounts::{extract_bank_accounts, BankAccount};
pub use config::{check_tax_year, current_tax_year, supported_tax_years, ExtractorConfig};
pub use currency::{Conversion, CurrencyTable};
pub use engine::{PipelineEvent, PipelineOutput, TaxPipeline};
pub use error::{Result, TaxExtractorError};
pub use ingestion::{extract_documents, extract_text, ExtractedBatch, ExtractedText};
pub use llm::{CompletionBackend, CompletionRequest, IncomeExtractor};
pub use parser::parse_model_output;
pub use report::{build_filing_feed, build_workbook, export, filing_feed_json, ExportBundle};
pub use rules::{AbatementRule, FiscalRule, FiscalRules};
pub use schema::*;
pub use taxonomy::{Classification, Taxonomy};
pub use utils::{coerce_decimal, normalize_code};
pub use validation::{validate_entries, ValidationContext};

#[cfg(feature = "openai")]
pub use llm::OpenAiClient;

/// Runs a batch through a pipeline built from `config`.
#[cfg(feature = "openai")]
pub async fn extract_income(
    documents: &[Document],
    context: &RunContext,
    config: &ExtractorConfig,
    progress: Option<tokio::sync::mpsc::Sender<PipelineEvent>>,
) -> Result<PipelineOutput> {
    TaxPipeline::from_config(config)?
        .run(documents, context, progress)
        .await
}
