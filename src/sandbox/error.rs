//! Error taxonomy for capability execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single capability invocation.
///
/// These never abort the agent loop: the registry turns them into
/// observation text that is fed back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The path resolves outside the sandbox root.
    #[error("Path '{path}' escapes workspace root at {root}")]
    Validation { path: String, root: PathBuf },

    /// Missing file or directory.
    #[error("{kind} not found: {path}")]
    NotFound { kind: &'static str, path: PathBuf },

    /// Read, write or listing failure.
    #[error("{0}")]
    Io(String),

    /// The command exceeded its time budget and was killed.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The command exited with a non-zero status.
    #[error("Command failed with exit code {code}:\n{output}")]
    Execution { code: i32, output: String },

    /// Arguments do not match the capability's declared parameters.
    #[error("{0}")]
    InvalidArguments(String),
}

impl ToolError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            kind: "File",
            path: path.into(),
        }
    }

    pub fn dir_not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            kind: "Directory",
            path: path.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }

    /// Check if this error is a sandbox escape rejection
    #[cfg(test)]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a timeout
    #[cfg(test)]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
