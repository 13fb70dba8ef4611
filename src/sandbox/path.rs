//! Workspace containment for filesystem capabilities.

use std::path::{Component, Path, PathBuf};

use super::error::{ToolError, ToolResult};

/// The directory every filesystem capability is confined to.
///
/// Resolution happens in two steps:
///
/// 1. Lexical: relative paths are joined onto the root, `.` and `..` are
///    folded, and the result must be the root or a descendant of it.
/// 2. Symlinks: the deepest existing ancestor of the lexical result is
///    canonicalized and must still live under the canonical root.
///
/// Both checks run before the caller performs any existence test or I/O
/// on the target itself.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
    canonical: PathBuf,
}

impl SandboxRoot {
    /// Create a sandbox root. The path must be absolute.
    pub fn new(root: impl Into<PathBuf>) -> ToolResult<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(ToolError::invalid_arguments(format!(
                "Sandbox root must be an absolute path: {}",
                root.display()
            )));
        }
        let root = normalize(&root);
        let canonical = root.canonicalize().unwrap_or_else(|_| root.clone());
        Ok(Self { root, canonical })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` inside the sandbox or reject it.
    pub fn resolve(&self, path: impl AsRef<Path>) -> ToolResult<PathBuf> {
        let requested = path.as_ref();
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let resolved = normalize(&joined);

        if !resolved.starts_with(&self.root) {
            return Err(self.escape(requested));
        }

        if let Some(real) = nearest_existing_ancestor(&resolved).and_then(|p| p.canonicalize().ok())
        {
            if !real.starts_with(&self.canonical) {
                return Err(self.escape(requested));
            }
        }

        Ok(resolved)
    }

    fn escape(&self, requested: &Path) -> ToolError {
        ToolError::Validation {
            path: requested.display().to_string(),
            root: self.root.clone(),
        }
    }
}

/// Fold `.` and `..` components without touching the filesystem.
/// `..` at the filesystem root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::new(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_relative_path_resolves_under_root() {
        let (_dir, root) = sandbox();
        let resolved = root.resolve("notes/today.txt").unwrap();
        assert_eq!(resolved, root.path().join("notes/today.txt"));
    }

    #[test]
    fn test_root_itself_is_allowed() {
        let (_dir, root) = sandbox();
        assert_eq!(root.resolve(".").unwrap(), root.path());
        assert_eq!(root.resolve(root.path()).unwrap(), root.path());
    }

    #[test]
    fn test_dotdot_traversal_rejected() {
        let (_dir, root) = sandbox();
        let err = root.resolve("../../etc/passwd").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_dotdot_that_stays_inside_is_allowed() {
        let (_dir, root) = sandbox();
        let resolved = root.resolve("a/b/../c.txt").unwrap();
        assert_eq!(resolved, root.path().join("a/c.txt"));
    }

    #[test]
    fn test_absolute_path_outside_rejected() {
        let (_dir, root) = sandbox();
        assert!(root.resolve("/etc/passwd").unwrap_err().is_validation());
        assert!(root.resolve("/").unwrap_err().is_validation());
    }

    #[test]
    fn test_absolute_path_inside_allowed() {
        let (_dir, root) = sandbox();
        let inside = root.path().join("x.txt");
        assert_eq!(root.resolve(&inside).unwrap(), inside);
    }

    #[test]
    fn test_sibling_with_common_prefix_rejected() {
        let (_dir, root) = sandbox();
        let sibling = format!("{}-evil/file", root.path().display());
        assert!(root.resolve(sibling).unwrap_err().is_validation());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (_dir, root) = sandbox();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        let err = root.resolve("link/secret.txt").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(SandboxRoot::new("workspace").is_err());
    }

    #[test]
    fn test_normalize_is_lexical() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
    }
}
