use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::sandbox::{SandboxRoot, ToolError, ToolResult};
use crate::skills::{parse_args, Param, ParamType, Skill, SkillContext};

/// File name of the notes document under the workspace root.
pub const NOTES_FILE: &str = "notes.json";

/// A single persisted note.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Note {
    /// ISO-8601 UTC timestamp
    pub timestamp: String,
    pub content: String,
}

/// On-disk shape of `notes.json`.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct NotesDocument {
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Persistent notes kept as one JSON document in the workspace.
///
/// Every mutation rewrites the whole document. A missing file reads as an
/// empty store; an unparseable one is reported as an error, never repaired
/// silently.
pub struct NotesStore {
    path: PathBuf,
}

impl NotesStore {
    pub fn open(root: &SandboxRoot) -> ToolResult<Self> {
        Ok(Self {
            path: root.resolve(NOTES_FILE)?,
        })
    }

    pub fn load(&self) -> ToolResult<NotesDocument> {
        if !self.path.exists() {
            return Ok(NotesDocument::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ToolError::io(format!("Failed to read notes: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| ToolError::io(format!("Notes file is corrupted: {e}")))
    }

    /// Appends a note and returns the new total.
    pub fn append(&self, content: &str) -> ToolResult<usize> {
        let mut doc = self.load()?;
        doc.notes.push(Note {
            timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            content: content.to_string(),
        });
        self.save(&doc)?;
        Ok(doc.notes.len())
    }

    pub fn clear(&self) -> ToolResult<()> {
        self.save(&NotesDocument::default())
    }

    fn save(&self, doc: &NotesDocument) -> ToolResult<()> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| ToolError::io(format!("Failed to encode notes: {e}")))?;
        fs::write(&self.path, json).map_err(|e| ToolError::io(format!("Failed to write notes: {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotesArgs {
    action: String,
    #[serde(default)]
    content: Option<String>,
}

/// Skill that reads, appends to, or clears the persistent notes.
pub struct ManageNotesSkill;

#[async_trait]
impl Skill for ManageNotesSkill {
    fn name(&self) -> &'static str {
        "manage_notes"
    }

    fn description(&self) -> &'static str {
        "Manage persistent notes that survive across sessions. \
         Actions: 'read' lists all notes, 'append' saves 'content' as a new note, \
         'clear' deletes every note."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[
            Param::required("action", ParamType::String, "One of 'read', 'append', 'clear'"),
            Param::optional("content", ParamType::String, "Note text, required for 'append'"),
        ];
        PARAMS
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let args: NotesArgs = parse_args(params)?;
        let store = NotesStore::open(&context.root)?;

        match args.action.as_str() {
            "read" => {
                let doc = store.load()?;
                if doc.notes.is_empty() {
                    return Ok("No notes found.".to_string());
                }
                let mut result = format!("Notes ({}):\n", doc.notes.len());
                for (i, note) in doc.notes.iter().enumerate() {
                    result.push_str(&format!("{}. [{}] {}\n", i + 1, note.timestamp, note.content));
                }
                Ok(result)
            }
            "append" => {
                let content = args
                    .content
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        ToolError::invalid_arguments("'content' is required for action 'append'")
                    })?;
                let total = store.append(content)?;
                info!("Note saved ({total} total)");
                Ok(format!("Note saved. Total notes: {total}"))
            }
            "clear" => {
                store.clear()?;
                info!("Notes cleared");
                Ok("All notes cleared.".to_string())
            }
            other => Err(ToolError::invalid_arguments(format!(
                "Unknown action '{other}'. Use 'read', 'append' or 'clear'"
            ))),
        }
    }
}
