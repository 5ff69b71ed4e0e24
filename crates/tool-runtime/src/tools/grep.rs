//! Pattern search across files.

use async_trait::async_trait;
use glob::Pattern;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{bool_arg, glob_arg, str_arg, u64_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

#[derive(Debug, Default)]
pub struct GrepTool;

impl GrepTool {
    const DEFAULT_MAX_MATCHES: u64 = 100;
}

struct SearchOptions {
    recursive: bool,
    file_pattern: Option<Pattern>,
    context_lines: usize,
    max_matches: usize,
}

fn collect_files(root: &Path, options: &SearchOptions) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let depth = if options.recursive { usize::MAX } else { 1 };
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            options
                .file_pattern
                .as_ref()
                .map_or(true, |p| p.matches(&e.file_name().to_string_lossy()))
        })
        .map(|e| e.into_path())
        .collect()
}

/// Search one file, returning at most `budget` matches. Unreadable files
/// yield nothing.
fn search_file(path: &Path, re: &Regex, context_lines: usize, budget: usize) -> Vec<Value> {
    let Ok(bytes) = std::fs::read(path) else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();

    let mut matches = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if matches.len() >= budget {
            break;
        }
        if !re.is_match(line) {
            continue;
        }
        let context = if context_lines > 0 {
            let before = &lines[index.saturating_sub(context_lines)..index];
            let end = index.saturating_add(1).saturating_add(context_lines).min(lines.len());
            let after = &lines[(index + 1).min(lines.len())..end];
            json!({"before": before, "after": after})
        } else {
            Value::Null
        };
        matches.push(json!({
            "file": path.display().to_string(),
            "line_number": index + 1,
            "line": line.trim_end(),
            "context": context,
        }));
    }
    matches
}

struct SearchSummary {
    matches: Vec<Value>,
    files_searched: usize,
    files_with_matches: usize,
}

fn search(root: &Path, re: &Regex, options: &SearchOptions) -> SearchSummary {
    let files = collect_files(root, options);
    let mut matches = Vec::new();
    let mut files_with_matches = 0;

    for file in &files {
        if matches.len() >= options.max_matches {
            break;
        }
        let budget = options.max_matches - matches.len();
        let found = search_file(file, re, options.context_lines, budget);
        if !found.is_empty() {
            files_with_matches += 1;
            matches.extend(found);
        }
    }

    SearchSummary {
        matches,
        files_searched: files.len(),
        files_with_matches,
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for text patterns in files. Supports literal and regex matching, recursive \
         directory search, file filtering and context lines around matches."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new(
                "pattern",
                ParameterKind::String,
                "Text or regex pattern to search for",
            )
            .required(),
            ToolParameter::new("path", ParameterKind::String, "File or directory to search")
                .required(),
            ToolParameter::new(
                "regex",
                ParameterKind::Boolean,
                "Treat pattern as a regular expression",
            )
            .with_default(false),
            ToolParameter::new(
                "case_sensitive",
                ParameterKind::Boolean,
                "Case-sensitive search (default: true)",
            )
            .with_default(true),
            ToolParameter::new(
                "recursive",
                ParameterKind::Boolean,
                "Search directories recursively",
            )
            .with_default(false),
            ToolParameter::new(
                "file_pattern",
                ParameterKind::String,
                "Glob filter for file names (e.g., '*.rs')",
            ),
            ToolParameter::new(
                "context_lines",
                ParameterKind::Integer,
                "Lines of context around each match",
            )
            .with_default(0),
            ToolParameter::new(
                "max_matches",
                ParameterKind::Integer,
                "Maximum matches to return (default: 100)",
            )
            .with_default(Self::DEFAULT_MAX_MATCHES),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let raw_pattern = str_arg(&args, "pattern")?;
        let requested = str_arg(&args, "path")?;
        let use_regex = bool_arg(&args, "regex", false);
        let case_sensitive = bool_arg(&args, "case_sensitive", true);

        let file_pattern = glob_arg(&args, "file_pattern")?;
        let options = SearchOptions {
            recursive: bool_arg(&args, "recursive", false),
            file_pattern,
            context_lines: u64_arg(&args, "context_lines").unwrap_or(0) as usize,
            max_matches: u64_arg(&args, "max_matches")
                .unwrap_or(Self::DEFAULT_MAX_MATCHES) as usize,
        };

        let root = context.resolve_path(requested);
        if !root.exists() {
            return Ok(ToolResult::failure(format!("Path not found: {requested}")).into());
        }

        let source = if use_regex { raw_pattern.to_string() } else { regex::escape(raw_pattern) };
        let re = match RegexBuilder::new(&source).case_insensitive(!case_sensitive).build() {
            Ok(re) => re,
            Err(e) => return Ok(ToolResult::failure(format!("Invalid regex pattern: {e}")).into()),
        };

        debug!(
            path = %root.display(),
            pattern = raw_pattern,
            use_regex,
            recursive = options.recursive,
            "searching"
        );

        let max_matches = options.max_matches;
        let summary = tokio::task::spawn_blocking(move || search(&root, &re, &options))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search failed: {e}")))?;

        let total = summary.matches.len();
        Ok(ToolResult::ok(Value::Array(summary.matches))
            .with_metadata("pattern", raw_pattern)
            .with_metadata("path", requested)
            .with_metadata("total_matches", total)
            .with_metadata("files_with_matches", summary.files_with_matches)
            .with_metadata("files_searched", summary.files_searched)
            .with_metadata("regex", use_regex)
            .with_metadata("case_sensitive", case_sensitive)
            .with_metadata("truncated", total >= max_matches)
            .into())
    }
}
