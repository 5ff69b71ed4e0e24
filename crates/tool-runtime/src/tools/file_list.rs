//! Directory listing with glob filtering and bounded recursion.

use async_trait::async_trait;
use glob::Pattern;
use serde_json::{json, Value};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::{bool_arg, glob_arg, opt_str_arg, u64_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

#[derive(Debug, Default)]
pub struct FileListTool;

impl FileListTool {
    const DEFAULT_MAX_DEPTH: u64 = 3;
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn describe(entry: &DirEntry, recursive: bool) -> Option<Value> {
    let meta = entry.metadata().ok()?;
    let is_dir = meta.is_dir();
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64());

    let mut item = json!({
        "name": entry.file_name().to_string_lossy(),
        "path": entry.path().display().to_string(),
        "type": if is_dir { "directory" } else { "file" },
        "size": if is_dir { 0 } else { meta.len() },
        "modified": modified,
    });
    if recursive {
        item["depth"] = json!(entry.depth() - 1);
    }
    Some(item)
}

fn list(
    root: &Path,
    pattern: Option<&Pattern>,
    recursive: bool,
    include_hidden: bool,
    max_depth: usize,
) -> Vec<Value> {
    let depth = if recursive { max_depth } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| include_hidden || !is_hidden(e));

    walker
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            let matches = pattern.map_or(true, |p| p.matches(&name));
            // Directories stay visible in recursive listings so the tree reads whole.
            matches || (recursive && entry.file_type().is_dir())
        })
        .filter_map(|entry| describe(&entry, recursive))
        .collect()
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List files and directories. Supports glob pattern filtering, recursive listing and \
         hidden files."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new(
                "path",
                ParameterKind::String,
                "Directory path to list (default: current directory)",
            )
            .with_default("."),
            ToolParameter::new(
                "pattern",
                ParameterKind::String,
                "Glob pattern to filter entries (e.g., '*.rs')",
            ),
            ToolParameter::new(
                "recursive",
                ParameterKind::Boolean,
                "List subdirectories recursively",
            )
            .with_default(false),
            ToolParameter::new(
                "include_hidden",
                ParameterKind::Boolean,
                "Include hidden files and directories",
            )
            .with_default(false),
            ToolParameter::new(
                "max_depth",
                ParameterKind::Integer,
                "Maximum recursion depth (default: 3)",
            )
            .with_default(Self::DEFAULT_MAX_DEPTH),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let requested = opt_str_arg(&args, "path").unwrap_or(".");
        let recursive = bool_arg(&args, "recursive", false);
        let include_hidden = bool_arg(&args, "include_hidden", false);
        let max_depth = u64_arg(&args, "max_depth").unwrap_or(Self::DEFAULT_MAX_DEPTH) as usize;
        let pattern = glob_arg(&args, "pattern")?;

        let root = context.resolve_path(requested);
        if !root.exists() {
            return Ok(ToolResult::failure(format!("Directory not found: {requested}")).into());
        }
        if !root.is_dir() {
            return Ok(ToolResult::failure(format!("Path is not a directory: {requested}")).into());
        }

        debug!(path = %root.display(), recursive, include_hidden, max_depth, "listing directory");

        let root_for_walk = root.clone();
        let pattern_for_walk = pattern.clone();
        let entries = tokio::task::spawn_blocking(move || {
            list(&root_for_walk, pattern_for_walk.as_ref(), recursive, include_hidden, max_depth)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("directory walk failed: {e}")))?;

        let is_file = |v: &&Value| v["type"] == "file";
        let file_count = entries.iter().filter(is_file).count();
        let total_size: u64 = entries
            .iter()
            .filter(is_file)
            .filter_map(|v| v["size"].as_u64())
            .sum();
        let directory_count = entries.len() - file_count;

        Ok(ToolResult::ok(Value::Array(entries))
            .with_metadata("path", requested)
            .with_metadata("file_count", file_count)
            .with_metadata("directory_count", directory_count)
            .with_metadata("total_size", total_size)
            .with_metadata("recursive", recursive)
            .with_metadata("pattern", pattern.map(|p| p.as_str().to_string()))
            .into())
    }
}
