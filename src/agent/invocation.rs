//! Tool-call extraction from model completions.
//!
//! Two textual forms are recognized, tried in order:
//!
//! 1. Bracketed: `[TOOL_CALL]name({"arg": "value"})[/TOOL_CALL]`. The name is
//!    the text before the first `(`, the arguments are the JSON object between
//!    that `(` and the last `)` of the block.
//! 2. Embedded object: when the text mentions `tool_use` or `tool_call`
//!    (any case), the span from the first `{` to the last `}` is parsed as
//!    `{"name": ..., "arguments": {...}}`.
//!
//! The keyword trigger of the second form is a heuristic and can fire on
//! prose that merely talks about tool calls. It only yields an invocation
//! when the embedded object also has both fields.

use serde_json::{Map, Value};

pub const TOOL_CALL_START: &str = "[TOOL_CALL]";
pub const TOOL_CALL_END: &str = "[/TOOL_CALL]";

const FALLBACK_KEYWORDS: [&str; 2] = ["tool_use", "tool_call"];

/// A request, parsed from model output, to run a named tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Bracketed text form of this invocation.
    pub fn render(&self) -> String {
        let args = Value::Object(self.arguments.clone());
        format!("{TOOL_CALL_START}{}({args}){TOOL_CALL_END}", self.name)
    }

    /// The literal `cmd` argument, as shown to the approval gate.
    pub fn command_text(&self) -> String {
        match self.arguments.get("cmd") {
            Some(Value::String(cmd)) => cmd.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Extracts the tool invocation from a completion, if it holds one.
pub fn parse_invocation(text: &str) -> Option<ToolInvocation> {
    if text.is_empty() {
        return None;
    }
    parse_bracketed(text).or_else(|| parse_embedded(text))
}

fn parse_bracketed(text: &str) -> Option<ToolInvocation> {
    let start = text.find(TOOL_CALL_START)? + TOOL_CALL_START.len();
    let end = start + text[start..].find(TOOL_CALL_END)?;
    let block = text[start..end].trim();

    let open = block.find('(')?;
    let close = block.rfind(')')?;
    if close < open {
        return None;
    }

    let name = block[..open].trim();
    if name.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&block[open + 1..close]) {
        Ok(Value::Object(arguments)) => Some(ToolInvocation {
            name: name.to_string(),
            arguments,
        }),
        _ => None,
    }
}

fn parse_embedded(text: &str) -> Option<ToolInvocation> {
    let lower = text.to_lowercase();
    if !FALLBACK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if close < open {
        return None;
    }

    let Value::Object(mut object) = serde_json::from_str::<Value>(&text[open..=close]).ok()? else {
        return None;
    };
    let name = match object.remove("name")? {
        Value::String(name) => name,
        _ => return None,
    };
    match object.remove("arguments")? {
        Value::Object(arguments) => Some(ToolInvocation { name, arguments }),
        _ => None,
    }
}

/// Removes every bracketed tool-call block and trims the rest.
///
/// What remains is the model's reasoning around the call. An unterminated
/// start marker is left in place.
pub fn strip_tool_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(TOOL_CALL_START) {
        let after_start = start + TOOL_CALL_START.len();
        let Some(end) = rest[after_start..].find(TOOL_CALL_END) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[after_start + end + TOOL_CALL_END.len()..];
    }
    out.push_str(rest);
    out.trim().to_string()
}
