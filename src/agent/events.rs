use async_trait::async_trait;
use serde_json::{Map, Value};

/// Intermediate progress of one prompt, emitted before the final reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Reasoning text around a tool call, markup removed.
    Thinking(String),
    ToolCall {
        tool: String,
        args: Map<String, Value>,
    },
    ToolOutput {
        tool: String,
        content: String,
    },
}

/// Human-in-the-loop check consulted before a command runs.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Returns `true` to let `command` run.
    async fn approve(&self, command: &str) -> bool;
}

/// Receiver of intermediate [`AgentEvent`]s.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: AgentEvent);
}
