//! LLM-backed relationship classification

use async_trait::async_trait;
use tracing::debug;

use crate::core::provider::RelationshipClassifier;
use crate::core::types::Relationship;
use crate::error::{Error, Result};
use crate::llm::{GenerationOptions, Message, OpenRouterClient};

const CLASSIFY_PROMPT: &str = r#"You compare two statements a user made about themselves.

- "update": the new statement corrects or replaces the existing one (the existing one is no longer true)
- "extend": the new statement adds detail to the existing one (both remain true)
- "similar": the statements are related but independent

Respond with exactly one word: update, extend, or similar."#;

/// Classifier that asks an OpenRouter model for a verdict
#[derive(Clone)]
pub struct LlmClassifier {
    client: OpenRouterClient,
    model: String,
}

impl LlmClassifier {
    /// Create a classifier using the client's configured classifier model
    pub fn new(client: OpenRouterClient) -> Self {
        let model = client.config().classifier_model().to_string();
        LlmClassifier { client, model }
    }
}

#[async_trait]
impl RelationshipClassifier for LlmClassifier {
    async fn classify(&self, existing_text: &str, new_text: &str) -> Result<Relationship> {
        let prompt = format!(
            "Existing statement:\n{}\n\nNew statement:\n{}",
            existing_text, new_text
        );

        let reply = self
            .client
            .complete(
                &self.model,
                vec![Message::system(CLASSIFY_PROMPT), Message::user(prompt)],
                GenerationOptions::precise().with_max_tokens(8),
            )
            .await?;

        let verdict = parse_relationship(&reply)?;
        debug!("Classifier verdict: {}", verdict);
        Ok(verdict)
    }
}

/// Parse a reply consisting of exactly one verdict keyword
///
/// Surrounding whitespace, quotes and punctuation are ignored. A reply that
/// mentions more than a single keyword is rejected rather than guessed at.
pub fn parse_relationship(reply: &str) -> Result<Relationship> {
    let word = reply.trim().trim_matches(|c: char| !c.is_alphanumeric());

    word.parse::<Relationship>()
        .map_err(|_| Error::Provider(format!("Unrecognized classifier reply: {}", reply.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenRouterConfig;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_relationship() {
        assert_eq!(parse_relationship("update").unwrap(), Relationship::Update);
        assert_eq!(parse_relationship(" Extend.\n").unwrap(), Relationship::Extend);
        assert_eq!(parse_relationship("SIMILAR").unwrap(), Relationship::Similar);
        assert_eq!(parse_relationship("\"update\"").unwrap(), Relationship::Update);
        assert!(matches!(parse_relationship("unrelated"), Err(Error::Provider(_))));
        assert!(parse_relationship("").is_err());
    }

    #[test]
    fn test_hedged_reply_is_rejected() {
        for reply in [
            "Not an update, similar",
            "similar, not an update",
            "update or extend",
            "The new statement extends the old one.",
        ] {
            assert!(
                matches!(parse_relationship(reply), Err(Error::Provider(_))),
                "{}",
                reply
            );
        }
    }

    #[tokio::test]
    async fn test_classify_hedged_reply_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Not an update, similar"}}]
            })))
            .mount(&server)
            .await;

        let mut config = OpenRouterConfig::new("test-key");
        config.base_url = server.uri();
        let classifier = LlmClassifier::new(OpenRouterClient::new(config).unwrap());

        let result = classifier.classify("I use vim", "I use neovim sometimes").await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[tokio::test]
    async fn test_classify_sends_both_statements() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("I use vim"))
            .and(body_string_contains("I switched to neovim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "update"}}]
            })))
            .mount(&server)
            .await;

        let mut config = OpenRouterConfig::new("test-key");
        config.base_url = server.uri();
        let classifier = LlmClassifier::new(OpenRouterClient::new(config).unwrap());

        let verdict = classifier
            .classify("I use vim", "I switched to neovim")
            .await
            .unwrap();
        assert_eq!(verdict, Relationship::Update);
    }
}
