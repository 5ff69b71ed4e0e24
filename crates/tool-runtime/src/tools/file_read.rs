//! File reading tool with a size cap and binary detection.

use async_trait::async_trait;
use tracing::debug;

use super::{check_encoding, str_arg, u64_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

/// Read the full text of a file.
#[derive(Debug, Default)]
pub struct FileReadTool;

impl FileReadTool {
    const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

    /// Check if content appears to be binary (contains null bytes in first 8KB).
    fn is_binary(bytes: &[u8]) -> bool {
        let check_len = bytes.len().min(8192);
        bytes[..check_len].contains(&0)
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read contents of a file from disk. Supports text files with a configurable size limit."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new(
                "path",
                ParameterKind::String,
                "File path to read (relative to working directory or absolute)",
            )
            .required(),
            ToolParameter::new(
                "encoding",
                ParameterKind::String,
                "Text encoding (default: utf-8)",
            )
            .with_default("utf-8"),
            ToolParameter::new(
                "max_size",
                ParameterKind::Integer,
                "Maximum file size in bytes (default: 10MB)",
            )
            .with_default(Self::DEFAULT_MAX_SIZE),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let requested = str_arg(&args, "path")?;
        if let Err(unsupported) = check_encoding(&args) {
            return Ok(unsupported.into());
        }
        let max_size = u64_arg(&args, "max_size").unwrap_or(Self::DEFAULT_MAX_SIZE);
        let path = context.resolve_path(requested);

        debug!(path = %path.display(), max_size, "reading file");

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolResult::failure(format!("File not found: {requested}")).into());
            }
            Err(e) => {
                let message = format!("failed to stat '{}': {e}", path.display());
                return Err(ToolError::ExecutionFailed(message));
            }
        };
        if !meta.is_file() {
            return Ok(ToolResult::failure(format!("Path is not a file: {requested}")).into());
        }
        if meta.len() > max_size {
            return Ok(ToolResult::failure(format!(
                "File too large: {} bytes (max: {max_size} bytes)",
                meta.len()
            ))
            .with_metadata("file_size", meta.len())
            .with_metadata("max_size", max_size)
            .into());
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to read '{}': {e}", path.display()))
        })?;

        if Self::is_binary(&bytes) {
            return Ok(ToolResult::failure(format!("Binary file, {} bytes", bytes.len()))
                .with_metadata("path", requested)
                .into());
        }

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                let message = "Encoding error: Unable to decode file with utf-8 encoding. \
                               Try a different encoding.";
                return Ok(ToolResult::failure(message)
                    .with_metadata("path", requested)
                    .into());
            }
        };

        let line_count = content.matches('\n').count() + 1;
        Ok(ToolResult::ok(content)
            .with_metadata("path", requested)
            .with_metadata("size", meta.len())
            .with_metadata("encoding", "utf-8")
            .with_metadata("line_count", line_count)
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn read(ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let args = args.as_object().cloned().unwrap();
        FileReadTool.execute(args, ctx).await.unwrap().into_result()
    }

    #[tokio::test]
    async fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("test.txt"), "line1\nline2\nline3\n")
            .await
            .unwrap();

        let ctx = ToolContext::new(dir.path());
        let result = read(&ctx, json!({"path": "test.txt"})).await;

        assert!(result.success);
        assert_eq!(result.output, json!("line1\nline2\nline3\n"));
        assert_eq!(result.metadata["line_count"], json!(4));
        assert_eq!(result.metadata["size"], json!(18));
    }

    #[tokio::test]
    async fn test_missing_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let missing = read(&ctx, json!({"path": "nope.txt"})).await;
        assert_eq!(missing.error.as_deref(), Some("File not found: nope.txt"));

        let not_file = read(&ctx, json!({"path": "."})).await;
        assert!(not_file.error.unwrap().starts_with("Path is not a file"));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("big.txt"), "0123456789").await.unwrap();

        let ctx = ToolContext::new(dir.path());
        let result = read(&ctx, json!({"path": "big.txt", "max_size": 4})).await;
        assert!(!result.success);
        assert_eq!(result.metadata["file_size"], json!(10));
    }

    #[tokio::test]
    async fn test_binary_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("binary.bin"), b"hello\x00world")
            .await
            .unwrap();

        let ctx = ToolContext::new(dir.path());
        let result = read(&ctx, json!({"path": "binary.bin"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Binary file"));
    }

    #[tokio::test]
    async fn test_unsupported_encoding() {
        let ctx = ToolContext::default();
        let result = read(&ctx, json!({"path": "whatever", "encoding": "utf-16"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Unsupported encoding"));
    }
}
