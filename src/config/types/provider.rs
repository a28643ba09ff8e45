//! Provider configuration types
//!
//! Configuration for the LLM provider backing text expansion and
//! relationship classification.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenRouter configuration; without it expansion is a passthrough and
    /// every match is classified as similar
    pub openrouter: Option<OpenRouterConfig>,
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// OpenRouter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Default model
    #[serde(default = "default_openrouter_model")]
    pub default_model: String,
    /// Model used for expansion, if different from the default
    pub expander_model: Option<String>,
    /// Model used for classification, if different from the default
    pub classifier_model: Option<String>,
    /// Base URL
    #[serde(default = "default_openrouter_url")]
    pub base_url: String,
    /// Site URL for rankings
    pub site_url: Option<String>,
    /// Site name for rankings
    pub site_name: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl OpenRouterConfig {
    /// Configuration with the given key and defaults elsewhere
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenRouterConfig {
            api_key: SecretString::from(api_key.into()),
            default_model: default_openrouter_model(),
            expander_model: None,
            classifier_model: None,
            base_url: default_openrouter_url(),
            site_url: None,
            site_name: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Model for text expansion
    pub fn expander_model(&self) -> &str {
        self.expander_model.as_deref().unwrap_or(&self.default_model)
    }

    /// Model for relationship classification
    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.default_model)
    }
}

fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}
