use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

use crate::accounts::{extract_bank_accounts, BankAccount};
use crate::config::{check_tax_year, ExtractorConfig};
use crate::currency::CurrencyTable;
use crate::error::{Result, TaxExtractorError};
use crate::ingestion::ExtractedBatch;
use crate::llm::client::CompletionBackend;
use crate::llm::extractor::IncomeExtractor;
use crate::parser::parse_model_output;
use crate::report::{self, ExportBundle};
use crate::rules::FiscalRules;
use crate::schema::{Document, ExportFormat, FilingFeedItem, IncomeEntry, RunContext, Warning};
use crate::taxonomy::Taxonomy;
use crate::validation::{validate_entries, ValidationContext};

/// Progress of a pipeline run, in the order events are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    Starting,
    ExtractingDocument {
        filename: String,
        index: usize,
        total: usize,
    },
    QueryingModel,
    ParsingResponse,
    Validating { candidates: usize },
    Completed { entries: usize, warnings: usize },
    Failed { reason: String },
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub tax_year: i32,
    pub entries: Vec<IncomeEntry>,
    /// Extraction warnings first, then validation warnings, each in encounter order.
    pub warnings: Vec<Warning>,
    pub bank_accounts: Vec<BankAccount>,
    /// Framed text of every document, as sent to the model.
    pub document_text: String,
}

impl PipelineOutput {
    pub fn filing_feed(&self) -> Vec<FilingFeedItem> {
        report::build_filing_feed(&self.entries)
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportBundle> {
        report::export(&self.entries, self.tax_year, format)
    }
}

/// Runs documents through extraction, the model, parsing and validation.
///
/// A pipeline holds its own copy of the exchange rates and tax year. Both can be changed
/// between runs; `run` borrows the pipeline immutably, so they cannot change during one.
pub struct TaxPipeline {
    extractor: IncomeExtractor,
    tax_year: i32,
    rates: CurrencyTable,
    taxonomy: Taxonomy,
    rules: FiscalRules,
}

impl TaxPipeline {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: IncomeExtractor::from_config(backend, config),
            tax_year: config.tax_year,
            rates: config.exchange_rates.clone(),
            taxonomy: Taxonomy::standard(),
            rules: FiscalRules::standard(),
        })
    }

    /// Pipeline backed by the chat-completions client described by `config`.
    #[cfg(feature = "openai")]
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        let client = crate::llm::client::OpenAiClient::from_config(config)?;
        Self::new(Arc::new(client), config)
    }

    pub fn with_rules(mut self, rules: FiscalRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn tax_year(&self) -> i32 {
        self.tax_year
    }

    pub fn exchange_rates(&self) -> &CurrencyTable {
        &self.rates
    }

    pub fn set_exchange_rates(&mut self, rates: CurrencyTable) -> Result<()> {
        rates.validate()?;
        self.rates = rates;
        Ok(())
    }

    pub fn set_tax_year(&mut self, tax_year: i32) -> Result<()> {
        check_tax_year(tax_year)?;
        self.tax_year = tax_year;
        Ok(())
    }

    pub async fn run(
        &self,
        documents: &[Document],
        context: &RunContext,
        progress: Option<Sender<PipelineEvent>>,
    ) -> Result<PipelineOutput> {
        self.send_event(&progress, PipelineEvent::Starting).await;

        let total = documents.len();
        let mut batch = ExtractedBatch::default();

        for (index, document) in documents.iter().enumerate() {
            self.send_event(
                &progress,
                PipelineEvent::ExtractingDocument {
                    filename: document.filename.clone(),
                    index,
                    total,
                },
            )
            .await;

            batch.add(document);
        }
        let ExtractedBatch {
            text: document_text,
            mut warnings,
        } = batch;
        info!(
            "Extracted {} documents ({} chars, {} warnings)",
            total,
            document_text.chars().count(),
            warnings.len()
        );

        self.send_event(&progress, PipelineEvent::QueryingModel).await;
        let model_context = context.model_context(self.tax_year);
        let raw = match self
            .extractor
            .extract(&document_text, &model_context, self.tax_year, &self.rates)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(&progress, e).await),
        };

        self.send_event(&progress, PipelineEvent::ParsingResponse).await;
        let candidates = match parse_model_output(&raw) {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.fail(&progress, e).await),
        };

        self.send_event(
            &progress,
            PipelineEvent::Validating {
                candidates: candidates.len(),
            },
        )
        .await;
        let (entries, validation_warnings) = validate_entries(
            &candidates,
            ValidationContext {
                rates: &self.rates,
                taxonomy: &self.taxonomy,
                rules: &self.rules,
            },
        );
        warnings.extend(validation_warnings);

        let bank_accounts = extract_bank_accounts(&document_text);

        self.send_event(
            &progress,
            PipelineEvent::Completed {
                entries: entries.len(),
                warnings: warnings.len(),
            },
        )
        .await;

        Ok(PipelineOutput {
            tax_year: self.tax_year,
            entries,
            warnings,
            bank_accounts,
            document_text,
        })
    }

    async fn fail(
        &self,
        sender: &Option<Sender<PipelineEvent>>,
        error: TaxExtractorError,
    ) -> TaxExtractorError {
        warn!("Run aborted: {}", error);
        self.send_event(
            sender,
            PipelineEvent::Failed {
                reason: error.to_string(),
            },
        )
        .await;
        error
    }

    async fn send_event(&self, sender: &Option<Sender<PipelineEvent>>, event: PipelineEvent) {
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::current_tax_year;
    use crate::llm::types::CompletionRequest;
    use async_trait::async_trait;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(reply: &'static str) -> TaxPipeline {
        TaxPipeline::new(Arc::new(FixedBackend(reply)), &ExtractorConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let docs = vec![
            Document::new("a.txt", b"Interest 350 EUR".to_vec()),
            Document::new("b.txt", b"nothing".to_vec()),
        ];

        let output = pipeline("[]")
            .run(&docs, &RunContext::default(), Some(tx))
            .await
            .unwrap();
        assert!(output.entries.is_empty());

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                PipelineEvent::Starting,
                PipelineEvent::ExtractingDocument {
                    filename: "a.txt".to_string(),
                    index: 0,
                    total: 2
                },
                PipelineEvent::ExtractingDocument {
                    filename: "b.txt".to_string(),
                    index: 1,
                    total: 2
                },
                PipelineEvent::QueryingModel,
                PipelineEvent::ParsingResponse,
                PipelineEvent::Validating { candidates: 0 },
                PipelineEvent::Completed {
                    entries: 0,
                    warnings: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_run_sends_the_framed_batch_text() {
        let docs = vec![
            Document::new("a.txt", b"Interest 350 EUR".to_vec()),
            Document::new("scan.png", vec![0x89, b'P', b'N', b'G']),
        ];
        let batch = crate::ingestion::extract_documents(&docs);

        let output = pipeline("[]")
            .run(&docs, &RunContext::default(), None)
            .await
            .unwrap();
        assert_eq!(output.document_text, batch.text);
        assert_eq!(output.warnings, batch.warnings);
    }

    #[tokio::test]
    async fn test_parse_failure_emits_failed_and_errors() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let result = pipeline("I cannot help with that.")
            .run(&[], &RunContext::default(), Some(tx))
            .await;

        assert!(matches!(result, Err(TaxExtractorError::UnparseableResponse(_))));
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(PipelineEvent::Failed { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExtractorConfig {
            max_tokens: 0,
            ..ExtractorConfig::default()
        };
        assert!(TaxPipeline::new(Arc::new(FixedBackend("[]")), &config).is_err());
    }

    #[test]
    fn test_exchange_rates_replaced_between_runs() {
        let mut pipeline = pipeline("[]");
        let rates = CurrencyTable::euro_only()
            .with_rate("GBP", rust_decimal::Decimal::new(117, 2))
            .unwrap();
        pipeline.set_exchange_rates(rates.clone()).unwrap();
        assert_eq!(pipeline.exchange_rates(), &rates);
    }

    #[test]
    fn test_set_tax_year_accepts_only_supported_years() {
        let mut pipeline = pipeline("[]");
        let previous = current_tax_year() - 1;
        pipeline.set_tax_year(previous).unwrap();
        assert_eq!(pipeline.tax_year(), previous);

        let result = pipeline.set_tax_year(1999);
        assert!(matches!(result, Err(TaxExtractorError::InvalidConfig(_))));
        assert_eq!(pipeline.tax_year(), previous);
    }
}
