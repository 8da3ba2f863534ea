mod error;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::CompletionError;
pub use openai::{extract_first_message, ChatCompletionResponse, OpenAiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of one chat-completion call. Serializes to the wire format directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// A request carrying exactly one user-role message.
    pub fn single(
        model: impl Into<String>,
        temperature: f32,
        prompt: impl Into<String>,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            model: model.into(),
            temperature,
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
        }
    }

    pub fn prompt(&self) -> &str {
        self.messages
            .first()
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}
