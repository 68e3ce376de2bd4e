//! File read tool: UTF-8 text contents with a character cap.

use crate::path::PathPolicy;
use async_trait::async_trait;
use filescout_core::error::{ToolError, ToolFailure};
use filescout_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    #[serde(alias = "file_path")]
    path: String,
}

pub struct ReadFileTool {
    policy: PathPolicy,
    /// Maximum characters returned. 0 = unlimited.
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(policy: PathPolicy, max_chars: usize) -> Self {
        Self { policy, max_chars }
    }
}

/// Bytes pulled from the file per read.
const CHUNK_SIZE: usize = 64 * 1024;

/// What a bounded scan of a file found.
#[derive(Debug, PartialEq)]
enum Scanned {
    /// UTF-8 text: at most `max_chars` kept characters and the file's total.
    Text { kept: String, total_chars: usize },
    Binary,
}

/// Stream `reader` through a UTF-8 decoder, keeping only the first
/// `max_chars` characters (0 keeps everything) while counting the rest.
///
/// A code point split across two reads is carried over; one still
/// incomplete at end of file makes the file binary.
async fn scan_text<R>(mut reader: R, max_chars: usize) -> std::io::Result<Scanned>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut carry: Vec<u8> = Vec::new();
    let mut kept = String::new();
    let mut total_chars = 0usize;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&buf[..n]);

        let valid = match std::str::from_utf8(&carry) {
            Ok(text) => text,
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&carry[..e.valid_up_to()]).unwrap_or_default()
            }
            Err(_) => return Ok(Scanned::Binary),
        };
        for ch in valid.chars() {
            if max_chars == 0 || total_chars < max_chars {
                kept.push(ch);
            }
            total_chars += 1;
        }
        let consumed = valid.len();
        carry.drain(..consumed);
    }

    if carry.is_empty() {
        Ok(Scanned::Text { kept, total_chars })
    } else {
        Ok(Scanned::Binary)
    }
}

/// Append the truncation marker when characters were dropped.
fn render(mut kept: String, total_chars: usize, max_chars: usize) -> String {
    if max_chars != 0 && total_chars > max_chars {
        kept.push_str(&format!(
            "\n\n[truncated: showing {max_chars} of {total_chars} characters]"
        ));
    }
    kept
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file_tool"
    }

    fn description(&self) -> &str {
        "Read the text contents of a file. Long files are truncated; \
         binary files are reported by size only."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: ReadFileArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                return Ok(ToolResult::failed(
                    ToolFailure::InvalidArguments,
                    format!("Error: invalid arguments for read_file_tool: {e}"),
                ));
            }
        };

        let path = self.policy.resolve(&args.path);
        if let Err(e) = self.policy.check(&path).await {
            return Ok(ToolResult::failed(
                ToolFailure::PermissionDenied,
                format!("Error: {e}"),
            ));
        }

        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                return Ok(ToolResult::failed(
                    ToolFailure::NotAFile,
                    format!("Error: '{}' is not a file", path.display()),
                ));
            }
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolResult::failed(
                    ToolFailure::PathNotFound,
                    format!("Error: file '{}' does not exist", path.display()),
                ));
            }
            Err(e) => {
                return Ok(ToolResult::failed(
                    ToolFailure::ExecutionFailed,
                    format!("Error: cannot access '{}': {e}", path.display()),
                ));
            }
        };

        let scanned = match tokio::fs::File::open(&path).await {
            Ok(file) => scan_text(file, self.max_chars).await,
            Err(e) => Err(e),
        };

        match scanned {
            Ok(Scanned::Text { kept, total_chars }) => {
                tracing::debug!(path = %path.display(), bytes = len, chars = total_chars, "Read file");
                Ok(ToolResult::ok(render(kept, total_chars, self.max_chars)))
            }
            Ok(Scanned::Binary) => Ok(ToolResult::ok(format!(
                "'{}' is a binary file with length {len} bytes",
                path.display()
            ))),
            Err(e) => Ok(ToolResult::failed(
                ToolFailure::ExecutionFailed,
                format!("Error: failed to read file '{}': {e}", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn tool_at(dir: &Path) -> ReadFileTool {
        ReadFileTool::new(PathPolicy::new(dir), 4000)
    }

    #[test]
    fn tool_definition() {
        let tool = ReadFileTool::new(PathPolicy::new("/"), 0);
        assert_eq!(tool.name(), "read_file_tool");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert!(schema["properties"]["path"].is_object());
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("test.txt")).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let result = tool_at(dir.path())
            .execute(serde_json::json!({"path": "test.txt"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "Hello, world!\n");
    }

    #[tokio::test]
    async fn accepts_file_path_alias() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "# Notes").unwrap();

        let result = ReadFileTool::new(PathPolicy::new("/"), 0)
            .execute(serde_json::json!({"file_path": file.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(result.output, "# Notes");
    }

    #[tokio::test]
    async fn long_file_is_truncated_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "é".repeat(50)).unwrap();

        let result = ReadFileTool::new(PathPolicy::new(dir.path()), 10)
            .execute(serde_json::json!({"path": "big.txt"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with(&"é".repeat(10)));
        assert!(result.output.ends_with("[truncated: showing 10 of 50 characters]"));
    }

    #[tokio::test]
    async fn zero_cap_reads_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(5000)).unwrap();
        let result = ReadFileTool::new(PathPolicy::new(dir.path()), 0)
            .execute(serde_json::json!({"path": "big.txt"}))
            .await
            .unwrap();
        assert_eq!(result.output.len(), 5000);
    }

    #[tokio::test]
    async fn binary_file_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();

        let result = tool_at(dir.path())
            .execute(serde_json::json!({"path": "blob.bin"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("binary file with length 4 bytes"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_at(dir.path())
            .execute(serde_json::json!({"path": "missing.txt"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failure, Some(ToolFailure::PathNotFound));
        assert!(result.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_at(dir.path())
            .execute(serde_json::json!({"path": "."}))
            .await
            .unwrap();
        assert_eq!(result.failure, Some(ToolFailure::NotAFile));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let result = tool_at(Path::new("/"))
            .execute(serde_json::json!({}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failure, Some(ToolFailure::InvalidArguments));
        assert!(result.output.contains("missing field `path`"));
    }

    #[tokio::test]
    async fn file_larger_than_cap_reports_full_total() {
        let dir = tempfile::tempdir().unwrap();
        // Multi-byte characters straddle every read boundary
        let body = "aé€".repeat(CHUNK_SIZE);
        std::fs::write(dir.path().join("huge.log"), &body).unwrap();

        let result = ReadFileTool::new(PathPolicy::new(dir.path()), 5)
            .execute(serde_json::json!({"path": "huge.log"}))
            .await
            .unwrap();

        let total = CHUNK_SIZE * 3;
        assert!(result.success);
        assert!(result.output.starts_with("aé€aé\n\n"));
        assert!(result.output.ends_with(&format!("[truncated: showing 5 of {total} characters]")));
    }

    #[tokio::test]
    async fn scan_keeps_only_the_capped_prefix() {
        let body = "x".repeat(CHUNK_SIZE * 4 + 7);
        let scanned = scan_text(body.as_bytes(), 4000).await.unwrap();
        match scanned {
            Scanned::Text { kept, total_chars } => {
                assert_eq!(kept.len(), 4000);
                assert_eq!(total_chars, CHUNK_SIZE * 4 + 7);
            }
            Scanned::Binary => panic!("plain text scanned as binary"),
        }
    }

    #[tokio::test]
    async fn invalid_bytes_after_the_cap_still_mean_binary() {
        let mut body = "x".repeat(CHUNK_SIZE + 10).into_bytes();
        body.push(0xff);
        assert_eq!(scan_text(&body[..], 10).await.unwrap(), Scanned::Binary);

        // A code point cut off at end of file is not text either
        let truncated = [b'a', 0xe2, 0x82];
        assert_eq!(scan_text(&truncated[..], 10).await.unwrap(), Scanned::Binary);
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(PathPolicy::new(dir.path()).allow(dir.path()), 0);
        let result = tool
            .execute(serde_json::json!({"path": "../../../etc/passwd"}))
            .await
            .unwrap();
        assert_eq!(result.failure, Some(ToolFailure::PermissionDenied));
    }
}
