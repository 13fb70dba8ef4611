//! Builtin skills: read, write and list files inside the workspace.
//!
//! Every path goes through [`SandboxRoot::resolve`](crate::sandbox::SandboxRoot::resolve)
//! before anything is checked or touched on disk. All I/O uses `tokio::fs`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::sandbox::{ToolError, ToolResult};
use crate::skills::{parse_args, Param, ParamType, Skill, SkillContext};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListArgs {
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    ".".to_string()
}

/// Returns the contents of a text file.
pub struct ReadFileSkill;

#[async_trait]
impl Skill for ReadFileSkill {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read and return the contents of a file in the workspace."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[Param::required(
            "path",
            ParamType::String,
            "Relative or absolute path of the file inside the workspace",
        )];
        PARAMS
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let args: PathArgs = parse_args(params)?;
        let path = context.root.resolve(&args.path)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::file_not_found(&path));
            }
            Err(e) => return Err(ToolError::io(format!("Failed to read file: {e}"))),
        };
        if !metadata.is_file() {
            return Err(ToolError::io(format!("Path is not a file: {}", path.display())));
        }

        debug!("Reading {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::io(format!("Failed to read file: {e}")))
    }
}

/// Writes a file, creating parent directories as needed.
pub struct WriteFileSkill;

#[async_trait]
impl Skill for WriteFileSkill {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file in the workspace, creating parent directories as needed. \
         Existing files are overwritten."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[
            Param::required(
                "path",
                ParamType::String,
                "Relative or absolute path of the file inside the workspace",
            ),
            Param::required("content", ParamType::String, "The content to write"),
        ];
        PARAMS
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let args: WriteArgs = parse_args(params)?;
        let path = context.root.resolve(&args.path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(format!("Failed to write file: {e}")))?;
        }
        tokio::fs::write(&path, args.content.as_bytes())
            .await
            .map_err(|e| ToolError::io(format!("Failed to write file: {e}")))?;

        debug!("Wrote {} bytes to {}", args.content.len(), path.display());
        Ok(format!("File written successfully: {}", path.display()))
    }
}

/// Lists the entries of a directory, sorted by name.
pub struct ListFilesSkill;

#[async_trait]
impl Skill for ListFilesSkill {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files and directories in a workspace directory (defaults to the workspace root)."
    }

    fn parameters(&self) -> &'static [Param] {
        const PARAMS: &[Param] = &[Param::optional(
            "path",
            ParamType::String,
            "Directory to list, relative to the workspace root. Defaults to '.'",
        )];
        PARAMS
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let args: ListArgs = parse_args(params)?;
        let dir = context.root.resolve(&args.path)?;

        let metadata = match tokio::fs::metadata(&dir).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::dir_not_found(&dir));
            }
            Err(e) => return Err(ToolError::io(format!("Failed to list directory: {e}"))),
        };
        if !metadata.is_dir() {
            return Err(ToolError::io(format!(
                "Path is not a directory: {}",
                dir.display()
            )));
        }

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::io(format!("Failed to list directory: {e}")))?;
        let mut names = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::io(format!("Failed to list directory: {e}")))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        if names.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        Ok(names.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxRoot;
    use serde_json::json;

    fn test_context() -> (tempfile::TempDir, SkillContext) {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::new(dir.path().canonicalize().unwrap()).unwrap();
        (dir, SkillContext { root })
    }

    #[test]
    fn test_names() {
        assert_eq!(ReadFileSkill.name(), "read_file");
        assert_eq!(WriteFileSkill.name(), "write_file");
        assert_eq!(ListFilesSkill.name(), "list_files");
    }

    #[test]
    fn test_list_files_path_is_optional() {
        let schema = ListFilesSkill.descriptor().parameters_schema();
        assert_eq!(schema["required"], json!([]));
        assert_eq!(schema["properties"]["path"]["type"], "string");
    }

    #[tokio::test]
    async fn test_read_file_success() {
        let (dir, ctx) = test_context();
        std::fs::write(dir.path().join("hello.txt"), "Hello, World!").unwrap();

        let result = ReadFileSkill
            .execute(json!({"path": "hello.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let (_dir, ctx) = test_context();
        let err = ReadFileSkill
            .execute(json!({"path": "missing.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_read_directory_is_io_error() {
        let (dir, ctx) = test_context();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err = ReadFileSkill
            .execute(json!({"path": "sub"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io(_)));
    }

    #[tokio::test]
    async fn test_read_file_escape_rejected() {
        let (_dir, ctx) = test_context();
        for path in ["../../etc/passwd", "/etc/passwd"] {
            let err = ReadFileSkill
                .execute(json!({"path": path}), &ctx)
                .await
                .unwrap_err();
            assert!(err.is_validation(), "{path} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_write_file_creates_dirs() {
        let (dir, ctx) = test_context();
        let result = WriteFileSkill
            .execute(
                json!({"path": "deep/nested/file.txt", "content": "content"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.starts_with("File written successfully:"));
        let written = std::fs::read_to_string(dir.path().join("deep/nested/file.txt")).unwrap();
        assert_eq!(written, "content");
    }

    #[tokio::test]
    async fn test_write_file_escape_touches_nothing() {
        let (dir, ctx) = test_context();
        let outside_name = format!(
            "../{}-escape.txt",
            dir.path().file_name().unwrap().to_string_lossy()
        );
        let err = WriteFileSkill
            .execute(json!({"path": outside_name, "content": "x"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let would_be = dir
            .path()
            .parent()
            .unwrap()
            .join(format!("{}-escape.txt", dir.path().file_name().unwrap().to_string_lossy()));
        assert!(!would_be.exists());
    }

    #[tokio::test]
    async fn test_write_file_missing_content_is_invalid_arguments() {
        let (_dir, ctx) = test_context();
        let err = WriteFileSkill
            .execute(json!({"path": "a.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_list_files_sorted() {
        let (dir, ctx) = test_context();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("c")).unwrap();

        let result = ListFilesSkill.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(result, "a.txt\nb.txt\nc");
    }

    #[tokio::test]
    async fn test_list_files_empty_directory() {
        let (_dir, ctx) = test_context();
        let result = ListFilesSkill.execute(json!({"path": "."}), &ctx).await.unwrap();
        assert_eq!(result, "(empty directory)");
    }

    #[tokio::test]
    async fn test_list_files_not_found() {
        let (_dir, ctx) = test_context();
        let err = ListFilesSkill
            .execute(json!({"path": "nope"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_files_escape_rejected() {
        let (_dir, ctx) = test_context();
        let err = ListFilesSkill
            .execute(json!({"path": ".."}), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
