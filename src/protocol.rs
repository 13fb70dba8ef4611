//! Line-delimited JSON protocol between host and sandbox.
//!
//! Every message is one JSON object on one line with a mandatory `type`
//! field. The host sends [`HostMessage`]s on the child's stdin; the sandbox
//! answers with [`SandboxMessage`]s on stdout. Each prompt produces zero or
//! more progress messages followed by exactly one terminal `response` or
//! `error`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::agent::AgentEvent;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Message has no 'type' field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed '{kind}' message: {detail}")]
    Malformed { kind: String, detail: String },

    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// Host → sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Prompt {
        #[serde(default)]
        content: String,
    },
    Reset,
    Exit,
    ApprovalGranted,
    ApprovalDenied,
}

impl HostMessage {
    const TYPES: &'static [&'static str] =
        &["prompt", "reset", "exit", "approval_granted", "approval_denied"];

    pub fn prompt(content: impl Into<String>) -> Self {
        HostMessage::Prompt {
            content: content.into(),
        }
    }
}

/// Sandbox → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxMessage {
    Status {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ollama_host: Option<String>,
    },
    Thinking {
        content: String,
    },
    ToolCall {
        tool: String,
        #[serde(default)]
        args: Map<String, Value>,
    },
    ToolOutput {
        tool: String,
        content: String,
    },
    ApprovalRequest {
        command: String,
    },
    Response {
        content: String,
    },
    Error {
        message: String,
    },
}

pub const STATUS_READY: &str = "ready";
pub const STATUS_RESET: &str = "reset";
pub const STATUS_EXITING: &str = "exiting";
pub const STATUS_INTERRUPTED: &str = "interrupted";

impl SandboxMessage {
    const TYPES: &'static [&'static str] = &[
        "status",
        "thinking",
        "tool_call",
        "tool_output",
        "approval_request",
        "response",
        "error",
    ];

    pub fn status(status: &str) -> Self {
        SandboxMessage::Status {
            status: status.to_string(),
            model: None,
            ollama_host: None,
        }
    }

    pub fn ready(model: &str, ollama_host: &str) -> Self {
        SandboxMessage::Status {
            status: STATUS_READY.to_string(),
            model: Some(model.to_string()),
            ollama_host: Some(ollama_host.to_string()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SandboxMessage::Error {
            message: message.into(),
        }
    }

    /// `response` and `error` end the message stream of a prompt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SandboxMessage::Response { .. } | SandboxMessage::Error { .. })
    }
}

impl From<AgentEvent> for SandboxMessage {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::Thinking(content) => SandboxMessage::Thinking { content },
            AgentEvent::ToolCall { tool, args } => SandboxMessage::ToolCall { tool, args },
            AgentEvent::ToolOutput { tool, content } => SandboxMessage::ToolOutput { tool, content },
        }
    }
}

/// Serializes `message` as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message).map_err(ProtocolError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Strictly decodes a host message.
pub fn decode_host_line(line: &str) -> Result<HostMessage, ProtocolError> {
    decode_typed(line, HostMessage::TYPES)
}

/// Strictly decodes a sandbox message.
pub fn decode_sandbox_line(line: &str) -> Result<SandboxMessage, ProtocolError> {
    decode_typed(line, SandboxMessage::TYPES)
}

/// Decodes a sandbox line, wrapping anything that is not a valid message
/// into a `response` carrying the raw line.
pub fn decode_sandbox_line_lossy(line: &str) -> SandboxMessage {
    let line = line.trim_end_matches(['\r', '\n']);
    match decode_sandbox_line(line) {
        Ok(message) => message,
        Err(e) => {
            debug!("Non-protocol output from sandbox ({e}), relaying as response");
            SandboxMessage::Response {
                content: line.to_string(),
            }
        }
    }
}

fn decode_typed<T: DeserializeOwned>(line: &str, known: &[&str]) -> Result<T, ProtocolError> {
    let value: Value = serde_json::from_str(line.trim()).map_err(ProtocolError::InvalidJson)?;
    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(ProtocolError::MissingType),
    };
    if !known.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed {
        kind,
        detail: e.to_string(),
    })
}
