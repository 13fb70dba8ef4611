pub mod client;
pub mod ollama;
#[cfg(test)]
pub mod scripted;

use serde::{Deserialize, Serialize};

pub use client::LlmClient;
pub use ollama::OllamaClient;

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion returned by the model service.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    /// Assistant content, tool-call markup included.
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}
