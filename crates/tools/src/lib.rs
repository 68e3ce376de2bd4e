//! Built-in tool implementations for FileScout.
//!
//! Two read-only filesystem tools: `list_directory` and `read_file_tool`.
//! Both resolve paths through a shared [`PathPolicy`], which can confine
//! them to a set of allowed roots.

pub mod list_directory;
pub mod path;
pub mod read_file;

use filescout_config::ToolsSettings;
use filescout_core::tool::ToolRegistry;

pub use list_directory::ListDirectoryTool;
pub use path::{PathPolicy, PathValidationError};
pub use read_file::ReadFileTool;

/// Create the default tool registry from settings.
pub fn default_registry(settings: &ToolsSettings) -> ToolRegistry {
    registry_with_policy(PathPolicy::from_settings(settings), settings.max_read_chars)
}

/// Create the tool registry with an explicit path policy.
pub fn registry_with_policy(policy: PathPolicy, max_read_chars: usize) -> ToolRegistry {
    tracing::debug!(
        base_dir = %policy.base_dir().display(),
        max_read_chars,
        "Building tool registry"
    );
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListDirectoryTool::new(policy.clone())));
    registry.register(Box::new(ReadFileTool::new(policy, max_read_chars)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_tools() {
        let registry = default_registry(&ToolsSettings::default());
        assert_eq!(registry.names(), vec!["list_directory", "read_file_tool"]);
    }

    #[tokio::test]
    async fn registry_reads_through_policy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();
        let registry = registry_with_policy(PathPolicy::new(dir.path()), 3);

        let tool = registry.resolve("read_file_tool").unwrap();
        let result = tool
            .execute(serde_json::json!({"path": "hello.txt"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("hi \n\n[truncated: showing 3 of 8"));
    }
}
