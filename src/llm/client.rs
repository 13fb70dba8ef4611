//! `LlmClient` trait: the seam between the agent loop and the model service.

use anyhow::Result;
use async_trait::async_trait;

use super::{LlmResponse, Message};
use crate::skills::ToolDescriptor;

/// Abstraction over the model service.
///
/// The agent hands over the full ordered history and every tool descriptor
/// on each request and only reads back the assistant text. Any `Err` is a
/// service failure: the caller ends the current loop with it and never
/// retries.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<LlmResponse>;

    /// Human-readable description of the backend and model, e.g. `"ollama (llama3.2)"`.
    fn description(&self) -> String;
}
