//! Builtin skill: web search placeholder.
//!
//! No search backend ships with the sandbox. The skill keeps the model-facing
//! contract (a JSON document with `query` and `results`) so a provider can be
//! slotted in later, and tells the model that nothing was searched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::sandbox::{ToolError, ToolResult};
use crate::skills::{parse_args, Param, ParamType, Skill, SkillContext};

const DEFAULT_MAX_RESULTS: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: u32,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

/// A single search hit.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The document handed back to the model.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchDocument {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub note: String,
}

pub struct WebSearchSkill;

#[async_trait]
impl Skill for WebSearchSkill {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for current information. Returns a JSON document with the \
         query and a list of results."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[
            Param::required("query", ParamType::String, "The search query"),
            Param::optional(
                "max_results",
                ParamType::Integer,
                "Maximum number of results to return (default 5)",
            ),
        ];
        PARAMS
    }

    async fn execute(&self, params: Value, _context: &SkillContext) -> ToolResult<String> {
        let args: SearchArgs = parse_args(params)?;
        if args.query.trim().is_empty() {
            return Err(ToolError::invalid_arguments("'query' must not be empty"));
        }
        debug!(max_results = args.max_results, "Web search (offline): {}", args.query);

        let document = SearchDocument {
            query: args.query,
            results: Vec::new(),
            note: "Web search is a stub: no search backend is configured in this sandbox, \
                   so no results were fetched."
                .to_string(),
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| ToolError::io(format!("Failed to encode search results: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxRoot;
    use serde_json::json;

    fn context() -> SkillContext {
        SkillContext {
            root: SandboxRoot::new(std::env::temp_dir()).unwrap(),
        }
    }

    async fn search(params: Value) -> ToolResult<SearchDocument> {
        let raw = WebSearchSkill.execute(params, &context()).await?;
        Ok(serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_query_reflected_in_output() {
        let doc = search(json!({"query": "best coffee shops in Paris"}))
            .await
            .unwrap();
        assert_eq!(doc.query, "best coffee shops in Paris");
        assert!(doc.results.is_empty());
    }

    #[tokio::test]
    async fn test_max_results_respected() {
        let doc = search(json!({"query": "tokio", "max_results": 1})).await.unwrap();
        assert!(doc.results.len() <= 1);
    }

    #[tokio::test]
    async fn test_stub_note_present() {
        let doc = search(json!({"query": "anything"})).await.unwrap();
        assert!(doc.note.contains("stub"));
    }

    #[tokio::test]
    async fn test_missing_query() {
        let err = search(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        let err = search(json!({"query": "  "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
