//! Path resolution and sandboxing for the filesystem tools.
//!
//! Paths from the model are resolved against a base directory and
//! normalised lexically, so `.` and `..` never reach the filesystem as-is.
//! When allowed roots are configured, the resolved path (and its
//! symlink-resolved form, if it exists) must sit under one of them.

use filescout_config::ToolsSettings;
use std::path::{Component, Path, PathBuf};

/// Error returned when a path is refused.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("access to '{path}' is outside the allowed directories")]
    OutsideAllowedRoots { path: String },
}

/// Where relative paths resolve and which directories tools may touch.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    base_dir: PathBuf,
    allowed_roots: Vec<PathBuf>,
}

impl PathPolicy {
    /// A policy rooted at `base_dir` with no restrictions.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: normalize(&base_dir.into()),
            allowed_roots: Vec::new(),
        }
    }

    /// Build from settings. Relative paths resolve against the configured
    /// `base_dir`, or the process working directory.
    pub fn from_settings(settings: &ToolsSettings) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let base = match &settings.base_dir {
            Some(dir) => join_absolute(&cwd, &expand_tilde(dir)),
            None => cwd,
        };
        let mut policy = Self::new(base);
        for root in &settings.allowed_roots {
            policy = policy.allow(root);
        }
        policy
    }

    /// Restrict access to `root` (and any other roots already allowed).
    pub fn allow(mut self, root: impl AsRef<Path>) -> Self {
        let resolved = self.resolve_raw(root.as_ref());
        self.allowed_roots.push(resolved);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a user-supplied path to an absolute, normalised path.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let raw = if raw.trim().is_empty() { "." } else { raw.trim() };
        self.resolve_raw(Path::new(raw))
    }

    fn resolve_raw(&self, raw: &Path) -> PathBuf {
        normalize(&join_absolute(&self.base_dir, &expand_tilde(raw)))
    }

    /// Check a resolved path against the allowed roots.
    pub async fn check(&self, resolved: &Path) -> Result<(), PathValidationError> {
        if self.allowed_roots.is_empty() {
            return Ok(());
        }

        let inside = |p: &Path| self.allowed_roots.iter().any(|root| p.starts_with(root));

        let mut allowed = inside(resolved);
        // A symlink inside a root may still point elsewhere
        if allowed {
            if let Ok(canonical) = tokio::fs::canonicalize(resolved).await {
                allowed = inside(&canonical)
                    || self.canonical_roots().await.iter().any(|r| canonical.starts_with(r));
            }
        }

        if allowed {
            Ok(())
        } else {
            tracing::warn!(path = %resolved.display(), "Path outside allowed roots refused");
            Err(PathValidationError::OutsideAllowedRoots {
                path: resolved.display().to_string(),
            })
        }
    }

    async fn canonical_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.allowed_roots.len());
        for root in &self.allowed_roots {
            if let Ok(canonical) = tokio::fs::canonicalize(root).await {
                roots.push(canonical);
            }
        }
        roots
    }
}

fn join_absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Lexically normalise a path: drop `.` and fold `..` into its parent.
/// `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if (s == "~" || s.starts_with("~/"))
        && let Some(home) = home_dir()
    {
        return PathBuf::from(s.replacen('~', &home, 1));
    }
    path.to_path_buf()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_base() {
        let policy = PathPolicy::new("/srv/data");
        assert_eq!(policy.resolve("."), PathBuf::from("/srv/data"));
        assert_eq!(policy.resolve(""), PathBuf::from("/srv/data"));
        assert_eq!(policy.resolve("logs/app.log"), PathBuf::from("/srv/data/logs/app.log"));
        assert_eq!(policy.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn dot_segments_are_folded() {
        let policy = PathPolicy::new("/srv/data");
        assert_eq!(policy.resolve("./a/../b/./c"), PathBuf::from("/srv/data/b/c"));
        assert_eq!(policy.resolve("../../../.."), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("../a/../../b")), PathBuf::from("../../b"));
    }

    #[tokio::test]
    async fn unrestricted_policy_allows_everything() {
        let policy = PathPolicy::new("/srv/data");
        assert!(policy.check(Path::new("/etc/passwd")).await.is_ok());
    }

    #[tokio::test]
    async fn traversal_out_of_root_is_refused() {
        let policy = PathPolicy::new("/srv/data").allow("/srv/data");
        let escaped = policy.resolve("../../etc/passwd");
        assert_eq!(escaped, PathBuf::from("/etc/passwd"));
        assert!(matches!(
            policy.check(&escaped).await,
            Err(PathValidationError::OutsideAllowedRoots { .. })
        ));
        assert!(policy.check(&policy.resolve("notes.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn sibling_with_common_prefix_is_not_inside_root() {
        let policy = PathPolicy::new("/").allow("/srv/data");
        assert!(policy.check(Path::new("/srv/database")).await.is_err());
    }

    #[tokio::test]
    async fn from_settings_uses_configured_base() {
        let settings = ToolsSettings {
            base_dir: Some(PathBuf::from("/srv/data")),
            allowed_roots: vec![PathBuf::from("reports")],
            ..ToolsSettings::default()
        };
        let policy = PathPolicy::from_settings(&settings);
        assert_eq!(policy.base_dir(), Path::new("/srv/data"));
        assert!(policy.check(Path::new("/srv/data/reports/q1.csv")).await.is_ok());
        assert!(policy.check(Path::new("/srv/data/private.txt")).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_root_is_refused() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let policy = PathPolicy::new(root.path()).allow(root.path());
        let target = policy.resolve("link/secret.txt");
        assert!(policy.check(&target).await.is_err());
    }
}
