//! Chat-completion providers.

use async_trait::async_trait;
use pdfrag_shared::{ChatMessage, PdfRagError, Result, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::OpenAiClient;

/// A structured completion request: one system instruction followed by
/// role-tagged turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// Generates text for a prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// `POST /chat/completions` on an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: OpenAiClient,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(skip_all, fields(model = %self.model, turns = prompt.messages.len()))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        messages.push(WireMessage {
            role: Role::System.as_str(),
            content: &prompt.system,
        });
        messages.extend(prompt.messages.iter().map(|m| WireMessage {
            role: m.role().as_str(),
            content: m.content(),
        }));

        let request = CompletionRequest {
            model: &self.model,
            messages,
        };
        let response: CompletionResponse =
            self.client.post_json("chat/completions", &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| PdfRagError::Provider("completion returned no content".into()))?;

        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat_model(server: &wiremock::MockServer) -> OpenAiChatModel {
        let client = OpenAiClient::new(format!("{}/v1/", server.uri()), "test-key").unwrap();
        OpenAiChatModel::new(client, "gpt-4o-mini")
    }

    #[tokio::test]
    async fn test_complete_sends_system_then_turns() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer test-key"))
            .and(wiremock::matchers::body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "hello" },
                    { "role": "user", "content": "how are you?" }
                ]
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "fine" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompt = Prompt::new("be brief")
            .with_messages([ChatMessage::user("hi"), ChatMessage::assistant("hello")])
            .with_message(ChatMessage::user("how are you?"));

        let answer = chat_model(&server).complete(&prompt).await.unwrap();
        assert_eq!(answer, "fine");
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = chat_model(&server)
            .complete(&Prompt::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PdfRagError::Provider(_)));
    }

    #[tokio::test]
    async fn test_complete_blank_content_is_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "" } }]
            })))
            .mount(&server)
            .await;

        let err = chat_model(&server)
            .complete(&Prompt::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PdfRagError::Provider(_)));
    }

    #[tokio::test]
    async fn test_complete_server_error_propagates() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = chat_model(&server)
            .complete(&Prompt::new("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
