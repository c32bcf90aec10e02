use chrono::{Datelike, Local};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::currency::CurrencyTable;
use crate::error::{Result, TaxExtractorError};
use crate::llm::extractor::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::schema::ExportFormat;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_TAX_YEAR: &str = "IRPP_TAX_YEAR";

pub fn current_tax_year() -> i32 {
    Local::now().year()
}

/// The current year and the two before it, most recent first.
pub fn supported_tax_years() -> Vec<i32> {
    let current = current_tax_year();
    (0..3).map(|offset| current - offset).collect()
}

/// Rejects a year outside `supported_tax_years()`.
pub fn check_tax_year(tax_year: i32) -> Result<()> {
    let years = supported_tax_years();
    if !years.contains(&tax_year) {
        return Err(TaxExtractorError::InvalidConfig(format!(
            "tax year {} is not one of {:?}",
            tax_year, years
        )));
    }
    Ok(())
}

/// Settings for one extraction run, supplied by the operator before the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Credential for the extraction service. Required only when a run reaches the model.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tax_year: i32,
    pub exchange_rates: CurrencyTable,
    pub export_format: ExportFormat,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            tax_year: current_tax_year(),
            exchange_rates: CurrencyTable::default(),
            export_format: ExportFormat::default(),
        }
    }
}

impl ExtractorConfig {
    /// Defaults overlaid with `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL` and
    /// `IRPP_TAX_YEAR` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = read(ENV_API_KEY) {
            config.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = read(ENV_BASE_URL) {
            config.base_url = url.trim().to_string();
        }
        if let Some(model) = read(ENV_MODEL) {
            config.model = model.trim().to_string();
        }
        if let Some(year) = read(ENV_TAX_YEAR) {
            config.tax_year = year.trim().parse().map_err(|_| {
                TaxExtractorError::InvalidConfig(format!(
                    "{} must be a year, got '{}'",
                    ENV_TAX_YEAR, year
                ))
            })?;
        }

        debug!(
            "Loaded config from environment (model {}, tax year {}, api key {})",
            config.model,
            config.tax_year,
            if config.api_key.is_some() { "set" } else { "missing" }
        );
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_tax_year(mut self, tax_year: i32) -> Self {
        self.tax_year = tax_year;
        self
    }

    pub fn with_exchange_rate(mut self, currency: &str, rate: Decimal) -> Result<Self> {
        self.exchange_rates.set_rate(currency, rate)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TaxExtractorError::InvalidConfig(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(TaxExtractorError::InvalidConfig(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(TaxExtractorError::InvalidConfig("model must not be empty".to_string()));
        }
        check_tax_year(self.tax_year)?;
        self.exchange_rates.validate()
    }
}
