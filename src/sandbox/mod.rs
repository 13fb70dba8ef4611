//! Execution sandbox: workspace containment and the capability error taxonomy.
//!
//! The security model is layered:
//!
//! 1. Container isolation: the agent runs in a child container that only
//!    sees a single bind-mounted workspace directory
//! 2. Path containment: every filesystem capability resolves its path
//!    arguments through [`SandboxRoot`] before any I/O
//! 3. Human approval: shell execution is gated on the host operator

pub mod error;
pub mod path;

pub use error::{ToolError, ToolResult};
pub use path::SandboxRoot;
