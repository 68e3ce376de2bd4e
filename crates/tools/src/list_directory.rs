//! Directory listing tool.

use crate::path::PathPolicy;
use async_trait::async_trait;
use filescout_core::error::{ToolError, ToolFailure};
use filescout_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ListDirectoryArgs {
    #[serde(default = "default_path", alias = "directory_path")]
    path: String,
}

fn default_path() -> String {
    ".".into()
}

struct Entry {
    name: String,
    is_dir: bool,
    len: u64,
}

pub struct ListDirectoryTool {
    policy: PathPolicy,
}

impl ListDirectoryTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }

    async fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>> {
        let mut reader = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // Follow symlinks for the kind; fall back to the link itself when broken
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(_) => entry.metadata().await?,
            };
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                len: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

fn render(dir: &Path, entries: &[Entry]) -> String {
    let mut out = format!("Contents of directory '{}':", dir.display());
    if entries.is_empty() {
        out.push_str("\n(empty)");
    }
    for entry in entries {
        if entry.is_dir {
            out.push_str(&format!("\n[dir]  {}/", entry.name));
        } else {
            out.push_str(&format!("\n[file] {} ({} bytes)", entry.name, entry.len));
        }
    }
    out
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and subdirectories of a directory, with file sizes. \
         Relative paths are resolved against the working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list",
                    "default": "."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let arguments = if arguments.is_null() {
            serde_json::json!({})
        } else {
            arguments
        };
        let args: ListDirectoryArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                return Ok(ToolResult::failed(
                    ToolFailure::InvalidArguments,
                    format!("Error: invalid arguments for list_directory: {e}"),
                ));
            }
        };

        let dir = self.policy.resolve(&args.path);
        if let Err(e) = self.policy.check(&dir).await {
            return Ok(ToolResult::failed(
                ToolFailure::PermissionDenied,
                format!("Error: {e}"),
            ));
        }

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if !meta.is_dir() => {
                return Ok(ToolResult::failed(
                    ToolFailure::NotADirectory,
                    format!("Error: '{}' is not a directory", dir.display()),
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolResult::failed(
                    ToolFailure::PathNotFound,
                    format!("Error: directory '{}' does not exist", dir.display()),
                ));
            }
            Err(e) => {
                return Ok(ToolResult::failed(
                    ToolFailure::ExecutionFailed,
                    format!("Error: cannot access '{}': {e}", dir.display()),
                ));
            }
        }

        match self.list(&dir).await {
            Ok(entries) => {
                tracing::debug!(path = %dir.display(), entries = entries.len(), "Listed directory");
                Ok(ToolResult::ok(render(&dir, &entries)))
            }
            Err(e) => Ok(ToolResult::failed(
                ToolFailure::ExecutionFailed,
                format!("Error: failed to list directory '{}': {e}", dir.display()),
            )),
        }
    }
}
