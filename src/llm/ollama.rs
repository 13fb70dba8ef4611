//! Model service backed by a local Ollama daemon.
//!
//! One non-streaming `POST {host}/api/chat` per completion:
//!
//! - the whole conversation, preamble included, goes in `messages`
//! - tool descriptors are sent in the `{type: "function", function: {...}}` shape
//! - token counts come back as `prompt_eval_count` / `eval_count`, either may be missing
//!
//! Models served with native tool support answer with structured `tool_calls`
//! instead of marker text. The first such call is rendered into the bracketed
//! `[TOOL_CALL]name({...})[/TOOL_CALL]` form and appended to the content, so the
//! agent parses one text format and the history records what was invoked.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::client::LlmClient;
use super::{LlmResponse, Message};
use crate::agent::invocation::{ToolInvocation, TOOL_CALL_START};
use crate::config::LlmConfig;
use crate::skills::ToolDescriptor;

// ── Wire types: request ─────────────────────────────────

/// Body of `/api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    options: GenerationOptions,
}

/// A tool as `/api/chat` expects it.
#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

impl From<&ToolDescriptor> for WireTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: descriptor.name,
                description: descriptor.description,
                parameters: descriptor.parameters_schema(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    num_predict: u32,
}

// ── Wire types: response ────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// The assistant turn inside a [`ChatResponse`].
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<StructuredCall>>,
}

/// A tool call returned in structured form.
#[derive(Debug, Deserialize)]
struct StructuredCall {
    function: CalledFunction,
}

#[derive(Debug, Deserialize)]
struct CalledFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// ── Client ──────────────────────────────────────────────

/// [`LlmClient`] over Ollama's chat endpoint.
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
    host: String,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Self {
        // `{host}/api/chat` must not end up with a double slash
        let host = config.host.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            config,
            host,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            tools: tools.iter().map(WireTool::from).collect(),
            options: GenerationOptions {
                num_predict: self.config.max_tokens_per_request,
            },
        };

        let url = format!("{}/api/chat", self.host);
        debug!(
            "Calling Ollama API ({}) with {} messages + {} tools",
            self.config.model,
            messages.len(),
            tools.len()
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {detail}");
        }

        let body: ChatResponse = response.json().await?;
        let input_tokens = body.prompt_eval_count.unwrap_or_default();
        let output_tokens = body.eval_count.unwrap_or_default();
        info!(input_tokens, output_tokens, "Completion received");

        Ok(LlmResponse {
            text: completion_text(body.message),
            input_tokens,
            output_tokens,
        })
    }

    fn description(&self) -> String {
        format!("ollama ({})", self.config.model)
    }
}

/// Folds structured tool calls into the completion text.
///
/// Content that already carries a bracketed marker is returned untouched.
fn completion_text(message: ReplyMessage) -> String {
    let mut text = message.content;
    if text.contains(TOOL_CALL_START) {
        return text;
    }
    let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) else {
        return text;
    };

    let invocation = ToolInvocation {
        name: call.function.name,
        arguments: arguments_object(call.function.arguments),
    };
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&invocation.render());
    text
}

/// Ollama usually returns an object; some models send it JSON-encoded as a string.
fn arguments_object(arguments: Value) -> Map<String, Value> {
    match arguments {
        Value::Object(map) => map,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::invocation::parse_invocation;
    use crate::skills::{Param, ParamType};

    fn config(host: &str) -> LlmConfig {
        LlmConfig {
            host: host.to_string(),
            model: "llama3.2".to_string(),
            max_tokens_per_request: 4096,
        }
    }

    // ── OllamaClient ─────────────────────────────────────

    #[test]
    fn test_description_names_model() {
        let client = OllamaClient::new(config("http://localhost:11434"));
        assert_eq!(client.description(), "ollama (llama3.2)");
    }

    #[test]
    fn test_host_trailing_slash_dropped() {
        let client = OllamaClient::new(config("http://gpu-box:11434/"));
        assert_eq!(client.host, "http://gpu-box:11434");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error() {
        // Port 9 (discard) on localhost is not an Ollama server.
        let client = OllamaClient::new(config("http://127.0.0.1:9"));
        let result = client.complete(&[Message::user("hi")], &[]).await;
        assert!(result.is_err());
    }

    // ── Wire format ──────────────────────────────────────

    #[test]
    fn test_descriptor_to_wire_tool() {
        const PARAMS: &[Param] = &[Param::required("query", ParamType::String, "Search query")];
        let descriptor = ToolDescriptor {
            name: "web_search",
            description: "Search the web",
            parameters: PARAMS,
        };

        let wire = serde_json::to_value(WireTool::from(&descriptor)).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "web_search",
                    "description": "Search the web",
                    "parameters": descriptor.parameters_schema(),
                }
            })
        );
        assert_eq!(wire["function"]["parameters"]["required"][0], "query");
    }

    #[test]
    fn test_request_without_tools() {
        let messages = [Message::system("Be terse."), Message::user("Hello")];
        let request = ChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: false,
            tools: Vec::new(),
            options: GenerationOptions { num_predict: 4096 },
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama3.2",
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "Hello"},
                ],
                "stream": false,
                "options": {"num_predict": 4096},
            })
        );
    }

    #[test]
    fn test_request_carries_every_builtin() {
        let registry = crate::skills::SkillRegistry::with_builtins();
        let request = ChatRequest {
            model: "llama3.2",
            messages: &[],
            stream: false,
            tools: registry.descriptors().iter().map(WireTool::from).collect(),
            options: GenerationOptions { num_predict: 4096 },
        };
        let body = serde_json::to_value(&request).unwrap();
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), registry.len());
        assert_eq!(tools[0]["function"]["name"], "read_file");
    }

    // ── Completions ──────────────────────────────────────

    #[test]
    fn test_plain_completion() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"model": "llama3.2", "message": {"role": "assistant", "content": "Paris."},
                "done": true, "prompt_eval_count": 31, "eval_count": 3}"#,
        )
        .unwrap();
        assert_eq!((body.prompt_eval_count, body.eval_count), (Some(31), Some(3)));
        assert_eq!(completion_text(body.message), "Paris.");
    }

    #[test]
    fn test_counts_and_tool_calls_optional() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"message": {"role": "assistant"}}"#).unwrap();
        assert_eq!(body.prompt_eval_count, None);
        assert_eq!(body.eval_count, None);
        assert!(body.message.content.is_empty());
        assert!(body.message.tool_calls.is_none());
    }

    // ── Structured tool calls ────────────────────────────

    #[test]
    fn test_structured_tool_call_rendered_as_marker() {
        let json = r#"{
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "list_files", "arguments": {"path": "."}}},
                    {"function": {"name": "read_file", "arguments": {"path": "a.txt"}}}
                ]
            }
        }"#;
        let body: ChatResponse = serde_json::from_str(json).unwrap();
        let text = completion_text(body.message);
        assert!(text.starts_with(TOOL_CALL_START));

        let invocation = parse_invocation(&text).unwrap();
        assert_eq!(invocation.name, "list_files");
        assert_eq!(invocation.arguments["path"], ".");
    }

    #[test]
    fn test_structured_tool_call_keeps_reasoning() {
        let message = ReplyMessage {
            content: "Let me look around.".to_string(),
            tool_calls: Some(vec![StructuredCall {
                function: CalledFunction {
                    name: "list_files".into(),
                    arguments: Value::String(r#"{"path": "src"}"#.to_string()),
                },
            }]),
        };
        let text = completion_text(message);
        assert!(text.starts_with("Let me look around.\n[TOOL_CALL]"));
        assert_eq!(parse_invocation(&text).unwrap().arguments["path"], "src");
    }

    #[test]
    fn test_existing_marker_not_duplicated() {
        let content = r#"[TOOL_CALL]read_file({"path": "a.txt"})[/TOOL_CALL]"#;
        let message = ReplyMessage {
            content: content.to_string(),
            tool_calls: Some(vec![StructuredCall {
                function: CalledFunction {
                    name: "read_file".to_string(),
                    arguments: serde_json::json!({"path": "a.txt"}),
                },
            }]),
        };
        assert_eq!(completion_text(message), content);
    }
}
