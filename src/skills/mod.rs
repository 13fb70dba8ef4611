pub mod builtin;
pub mod registry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::sandbox::{SandboxRoot, ToolError, ToolResult};

/// Runtime context passed to skill execution.
///
/// Every filesystem-touching skill resolves its paths through `root`.
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub root: SandboxRoot,
}

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
}

/// One declared parameter of a skill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl Param {
    pub const fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Model-facing description of a skill, declared statically per skill.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Parameters in declaration order.
    pub parameters: &'static [Param],
}

impl ToolDescriptor {
    /// JSON Schema for the parameters object (`{type, properties, required}`).
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.parameters {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind,
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A capability the model can invoke by name.
///
/// The runtime calls `execute()` when a parsed completion names this skill.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique identifier the model uses to invoke this skill.
    fn name(&self) -> &'static str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &'static str;

    /// Declared parameters, in order.
    fn parameters(&self) -> &'static [Param];

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Execute the skill with keyword-style arguments and return a text result.
    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String>;
}

/// Deserialize keyword arguments into a skill's typed argument struct.
///
/// A mismatch (missing required field, wrong type, unknown field) is an
/// `InvalidArguments` failure. `null` is treated as "no arguments".
pub fn parse_args<T: DeserializeOwned>(params: Value) -> ToolResult<T> {
    let params = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

pub use registry::SkillRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const PARAMS: &[Param] = &[
        Param::required("path", ParamType::String, "File path"),
        Param::optional("limit", ParamType::Integer, "Maximum lines"),
    ];

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "read_file",
            description: "Read a file",
            parameters: PARAMS,
        }
    }

    #[test]
    fn test_parameters_schema_shape() {
        let schema = descriptor().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn test_param_type_serialization() {
        assert_eq!(serde_json::to_value(ParamType::Boolean).unwrap(), "boolean");
        assert_eq!(serde_json::to_value(ParamType::Array).unwrap(), "array");
        assert_eq!(serde_json::to_value(ParamType::Number).unwrap(), "number");
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        path: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn test_parse_args_ok() {
        let args: Args = parse_args(json!({"path": "a.txt", "limit": 3})).unwrap();
        assert_eq!(args.path, "a.txt");
        assert_eq!(args.limit, Some(3));
    }

    #[test]
    fn test_parse_args_missing_field() {
        let err = parse_args::<Args>(json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_parse_args_unknown_field() {
        let err = parse_args::<Args>(json!({"path": "a", "bogus": 1})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_parse_args_null_is_empty() {
        #[derive(Deserialize)]
        struct NoArgs {}
        assert!(parse_args::<NoArgs>(Value::Null).is_ok());
    }
}
