use std::path::Path;

use tracing::{debug, warn};

/// Name of the optional standing-instructions file in the workspace.
pub const PREAMBLE_FILE: &str = "system_context.txt";

/// Reads the context preamble from the workspace root.
///
/// Returns `None` when the file is missing, unreadable, or blank. An
/// unreadable file is logged and otherwise ignored.
pub fn load_preamble(root: &Path) -> Option<String> {
    let path = root.join(PREAMBLE_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No context preamble at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Ignoring unreadable context preamble {}: {e}", path.display());
            return None;
        }
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
