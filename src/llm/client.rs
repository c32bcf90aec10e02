use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::CompletionRequest;

/// Anything able to answer a single-turn completion request with raw text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[cfg(feature = "openai")]
pub use openai::OpenAiClient;

#[cfg(feature = "openai")]
mod openai {
    use async_trait::async_trait;
    use log::debug;
    use reqwest::Client;

    use super::CompletionBackend;
    use crate::config::{ExtractorConfig, DEFAULT_BASE_URL};
    use crate::error::{Result, TaxExtractorError};
    use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest};

    /// Chat-completions client for OpenAI or any service exposing the same API.
    #[derive(Clone)]
    pub struct OpenAiClient {
        client: Client,
        api_key: String,
        base_url: String,
    }

    impl OpenAiClient {
        pub fn new(api_key: impl Into<String>) -> Result<Self> {
            Self::with_base_url(api_key, DEFAULT_BASE_URL)
        }

        pub fn with_base_url(
            api_key: impl Into<String>,
            base_url: impl Into<String>,
        ) -> Result<Self> {
            let api_key = api_key.into();
            if api_key.trim().is_empty() {
                return Err(TaxExtractorError::MissingApiKey);
            }

            Ok(Self {
                client: Client::new(),
                api_key,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            })
        }

        pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or(TaxExtractorError::MissingApiKey)?;
            Self::with_base_url(api_key, config.base_url.as_str())
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }
    }

    #[async_trait]
    impl CompletionBackend for OpenAiClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let url = format!("{}/chat/completions", self.base_url);
            let payload = ChatCompletionRequest::from(request);

            debug!(
                "POST {} (model {}, prompt {} chars)",
                url,
                request.model,
                request.user_prompt.len()
            );

            let res = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await?;
            let status = res.status();

            if !status.is_success() {
                let body = res.text().await?;
                return Err(TaxExtractorError::ServiceError {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: ChatCompletionResponse = res.json().await?;
            body.first_content().ok_or_else(|| {
                TaxExtractorError::InvalidServiceResponse("No message content returned".to_string())
            })
        }
    }

}
