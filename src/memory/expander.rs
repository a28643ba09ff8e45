//! LLM-backed text expansion
//!
//! Rewrites terse statements ("use vim") into a self-contained sentence so
//! that the embedding captures who and what the statement is about.

use async_trait::async_trait;
use tracing::debug;

use crate::core::provider::TextExpander;
use crate::error::{Error, Result};
use crate::llm::{GenerationOptions, Message, OpenRouterClient};

const EXPAND_PROMPT: &str = r#"Rewrite the user's statement about themselves as one clear, self-contained sentence in the same language.
Keep every fact, add none, and spell out abbreviations.
Respond ONLY with the rewritten sentence (no quotes, no explanation)."#;

/// Expander that asks an OpenRouter model for the rewrite
#[derive(Clone)]
pub struct LlmExpander {
    client: OpenRouterClient,
    model: String,
}

impl LlmExpander {
    /// Create an expander using the client's configured expander model
    pub fn new(client: OpenRouterClient) -> Self {
        let model = client.config().expander_model().to_string();
        LlmExpander { client, model }
    }
}

#[async_trait]
impl TextExpander for LlmExpander {
    async fn expand(&self, text: &str) -> Result<String> {
        let reply = self
            .client
            .complete(
                &self.model,
                vec![Message::system(EXPAND_PROMPT), Message::user(text)],
                GenerationOptions::precise().with_max_tokens(256),
            )
            .await?;

        let expanded = reply.trim().trim_matches('"').trim();
        if expanded.is_empty() {
            return Err(Error::Provider("Expander returned an empty reply".into()));
        }

        debug!("Expanded {} chars into {} chars", text.len(), expanded.len());
        Ok(expanded.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenRouterConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn expander_replying(content: &str) -> (MockServer, LlmExpander) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&server)
            .await;

        let mut config = OpenRouterConfig::new("test-key");
        config.base_url = server.uri();
        let expander = LlmExpander::new(OpenRouterClient::new(config).unwrap());
        (server, expander)
    }

    #[tokio::test]
    async fn test_expand_trims_reply() {
        let (_server, expander) = expander_replying("  \"The user uses the vim editor.\"\n").await;
        let expanded = expander.expand("use vim").await.unwrap();
        assert_eq!(expanded, "The user uses the vim editor.");
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let (_server, expander) = expander_replying("   ").await;
        assert!(matches!(expander.expand("use vim").await, Err(Error::Provider(_))));
    }
}
