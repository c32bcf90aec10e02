use log::{debug, info};
use std::sync::Arc;

use crate::config::ExtractorConfig;
use crate::currency::CurrencyTable;
use crate::error::Result;
use crate::llm::client::CompletionBackend;
use crate::llm::prompts::{build_extraction_prompt, SYSTEM_PROMPT};
use crate::llm::types::CompletionRequest;
use crate::taxonomy::Taxonomy;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Asks the model for income entries found in a batch of document text.
///
/// Returns the model's raw answer; turning it into entries is the parser's job.
#[derive(Clone)]
pub struct IncomeExtractor {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
    taxonomy: Taxonomy,
}

impl IncomeExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: SYSTEM_PROMPT.to_string(),
            taxonomy: Taxonomy::standard(),
        }
    }

    pub fn from_config(backend: Arc<dyn CompletionBackend>, config: &ExtractorConfig) -> Self {
        Self::new(backend)
            .with_model(config.model.as_str())
            .with_sampling(config.temperature, config.max_tokens)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Replaces the system message, e.g. to test alternative wording.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request(
        &self,
        document_text: &str,
        context: &str,
        tax_year: i32,
        rates: &CurrencyTable,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: build_extraction_prompt(
                document_text,
                context,
                tax_year,
                rates,
                &self.taxonomy,
            ),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub async fn extract(
        &self,
        document_text: &str,
        context: &str,
        tax_year: i32,
        rates: &CurrencyTable,
    ) -> Result<String> {
        let request = self.request(document_text, context, tax_year, rates);
        info!(
            "Querying {} for tax year {} ({} chars of document text)",
            self.model,
            tax_year,
            document_text.chars().count()
        );

        let raw = self.backend.complete(&request).await?;
        debug!("Model returned {} chars", raw.len());
        Ok(raw)
    }
}
