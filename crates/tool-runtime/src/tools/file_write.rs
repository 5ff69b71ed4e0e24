//! File writing tool with optional parent directory creation.

use async_trait::async_trait;
use tracing::debug;

use super::{bool_arg, check_encoding, str_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

/// Write or create files, creating parent directories as needed.
#[derive(Debug, Default)]
pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories if needed. Overwrites existing files."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new(
                "path",
                ParameterKind::String,
                "File path to write (relative to working directory or absolute)",
            )
            .required(),
            ToolParameter::new(
                "content",
                ParameterKind::String,
                "Content to write to the file",
            )
            .required(),
            ToolParameter::new(
                "encoding",
                ParameterKind::String,
                "Text encoding (default: utf-8)",
            )
            .with_default("utf-8"),
            ToolParameter::new(
                "create_dirs",
                ParameterKind::Boolean,
                "Create parent directories if they don't exist (default: true)",
            )
            .with_default(true),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let requested = str_arg(&args, "path")?;
        let content = str_arg(&args, "content")?;
        if let Err(unsupported) = check_encoding(&args) {
            return Ok(unsupported.into());
        }
        let create_dirs = bool_arg(&args, "create_dirs", true);
        let path = context.resolve_path(requested);

        debug!(path = %path.display(), bytes = content.len(), create_dirs, "writing file");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                if !create_dirs {
                    return Ok(ToolResult::failure(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    ))
                    .into());
                }
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ToolError::ExecutionFailed(format!(
                        "failed to create parent directories for '{}': {e}",
                        path.display()
                    ))
                })?;
            }
        }

        let existing = tokio::fs::metadata(&path).await.ok();
        if existing.as_ref().is_some_and(|m| m.is_dir()) {
            let message = format!("Path is a directory, not a file: {requested}");
            return Ok(ToolResult::failure(message).into());
        }

        tokio::fs::write(&path, content).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to write '{}': {e}", path.display()))
        })?;

        let new_size = content.len();
        Ok(ToolResult::ok(format!("Successfully wrote {new_size} bytes to {requested}"))
            .with_metadata("path", requested)
            .with_metadata("size", new_size)
            .with_metadata("encoding", "utf-8")
            .with_metadata("overwritten", existing.is_some())
            .with_metadata("old_size", existing.map(|m| m.len()))
            .with_metadata("line_count", content.matches('\n').count() + 1)
            .into())
    }
}
