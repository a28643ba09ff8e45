//! OpenRouter API client

use crate::config::OpenRouterConfig;
use crate::error::{Error, Result};
use crate::llm::types::*;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenRouter API client
#[derive(Clone)]
pub struct OpenRouterClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        // Add authorization header
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!(
                "Bearer {}",
                config.api_key.expose_secret()
            ))
            .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        // Add OpenRouter-specific headers
        if let Some(ref site_url) = config.site_url {
            if let Ok(value) = header::HeaderValue::from_str(site_url) {
                headers.insert("HTTP-Referer", value);
            }
        }
        if let Some(ref site_name) = config.site_name {
            if let Ok(value) = header::HeaderValue::from_str(site_name) {
                headers.insert("X-Title", value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenRouterClient { client, config })
    }

    /// Provider configuration
    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    /// Run a chat completion and return the first choice's text
    pub async fn complete(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: GenerationOptions,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self.send_request(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("Completion returned no choices".into()))
    }

    /// Send a request to the OpenRouter API
    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!("Sending request to OpenRouter: model={}", request.model);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.json::<ChatCompletionResponse>().await?;

            if let Some(ref usage) = body.usage {
                debug!(
                    "OpenRouter response: model={}, tokens={}",
                    body.model, usage.total_tokens
                );
            }

            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                warn!("Rate limit exceeded: {}", error_text);
                Err(Error::RateLimit(error_text))
            } else if status.as_u16() == 401 {
                Err(Error::Unauthorized("Invalid API key".to_string()))
            } else {
                Err(Error::Provider(format!(
                    "OpenRouter API error ({}): {}",
                    status, error_text
                )))
            }
        }
    }
}
