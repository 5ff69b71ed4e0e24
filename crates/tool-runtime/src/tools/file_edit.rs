//! Search-and-replace editing of a single text file.

use async_trait::async_trait;
use regex::{NoExpand, RegexBuilder};
use tracing::debug;

use super::{bool_arg, check_encoding, str_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

#[derive(Debug, Default)]
pub struct FileEditTool;

#[derive(Debug)]
struct Edit {
    content: String,
    matches: usize,
}

/// Apply a literal or regex replacement. Literal replacements are inserted
/// verbatim; regex replacements may use `$1`-style group references.
fn apply_edit(
    original: &str,
    search: &str,
    replacement: &str,
    use_regex: bool,
    replace_all: bool,
    case_sensitive: bool,
) -> Result<Edit, String> {
    if !use_regex && case_sensitive {
        let matches = original.matches(search).count();
        let content = if replace_all {
            original.replace(search, replacement)
        } else {
            original.replacen(search, replacement, 1)
        };
        return Ok(Edit { content, matches });
    }

    let pattern = if use_regex { search.to_string() } else { regex::escape(search) };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| format!("Invalid regex pattern: {e}"))?;

    let matches = re.find_iter(original).count();
    let limit = if replace_all { 0 } else { 1 };
    let content = if use_regex {
        re.replacen(original, limit, replacement).into_owned()
    } else {
        re.replacen(original, limit, NoExpand(replacement)).into_owned()
    };
    Ok(Edit { content, matches })
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "file_edit"
    }

    fn description(&self) -> &str {
        "Edit a file by searching for text and replacing it. Supports literal strings and regular \
         expressions, with case-insensitive matching and single or global replacement."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("path", ParameterKind::String, "Path to the file to edit")
                .required(),
            ToolParameter::new(
                "search",
                ParameterKind::String,
                "Text or regex pattern to search for",
            )
            .required(),
            ToolParameter::new("replace", ParameterKind::String, "Replacement text").required(),
            ToolParameter::new(
                "regex",
                ParameterKind::Boolean,
                "Treat search as a regular expression",
            )
            .with_default(false),
            ToolParameter::new(
                "replace_all",
                ParameterKind::Boolean,
                "Replace all occurrences (default: true)",
            )
            .with_default(true),
            ToolParameter::new(
                "case_sensitive",
                ParameterKind::Boolean,
                "Case-sensitive search (default: true)",
            )
            .with_default(true),
            ToolParameter::new(
                "encoding",
                ParameterKind::String,
                "Text encoding (default: utf-8)",
            )
            .with_default("utf-8"),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let requested = str_arg(&args, "path")?;
        let search = str_arg(&args, "search")?;
        let replacement = str_arg(&args, "replace")?;
        let use_regex = bool_arg(&args, "regex", false);
        let replace_all = bool_arg(&args, "replace_all", true);
        let case_sensitive = bool_arg(&args, "case_sensitive", true);
        if let Err(unsupported) = check_encoding(&args) {
            return Ok(unsupported.into());
        }
        if search.is_empty() {
            return Err(ToolError::InvalidInput("search pattern must not be empty".to_string()));
        }

        let path = context.resolve_path(requested);
        if !path.exists() {
            return Ok(ToolResult::failure(format!("File not found: {requested}")).into());
        }
        if !path.is_file() {
            return Ok(ToolResult::failure(format!("Path is not a file: {requested}")).into());
        }

        debug!(path = %path.display(), use_regex, replace_all, case_sensitive, "editing file");

        let original = match tokio::fs::read(&path).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    let message = "Encoding error: Unable to decode file with utf-8 encoding";
                    return Ok(ToolResult::failure(message)
                        .with_metadata("path", requested)
                        .into());
                }
            },
            Err(e) => {
                let message = format!("failed to read '{}': {e}", path.display());
                return Err(ToolError::ExecutionFailed(message));
            }
        };

        let edit = match apply_edit(
            &original,
            search,
            replacement,
            use_regex,
            replace_all,
            case_sensitive,
        ) {
            Ok(edit) => edit,
            Err(message) => return Ok(ToolResult::failure(message).into()),
        };

        if edit.matches == 0 || edit.content == original {
            return Ok(ToolResult::failure(format!("Search pattern not found in file: {search}"))
                .with_metadata("path", requested)
                .with_metadata("search", search)
                .with_metadata("matches", 0)
                .into());
        }

        tokio::fs::write(&path, &edit.content).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to write '{}': {e}", path.display()))
        })?;

        let replaced = if replace_all { edit.matches } else { 1 };
        Ok(ToolResult::ok(format!("Successfully replaced {replaced} occurrence(s) in {requested}"))
            .with_metadata("path", requested)
            .with_metadata("search", search)
            .with_metadata("replace", replacement)
            .with_metadata("matches_found", edit.matches)
            .with_metadata("replacements_made", replaced)
            .with_metadata("regex", use_regex)
            .with_metadata("case_sensitive", case_sensitive)
            .with_metadata("size_before", original.len())
            .with_metadata("size_after", edit.content.len())
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_edit_variants() {
        let text = "Foo foo FOO";

        let literal = apply_edit(text, "foo", "bar", false, true, true).unwrap();
        assert_eq!((literal.content.as_str(), literal.matches), ("Foo bar FOO", 1));

        let insensitive = apply_edit(text, "foo", "bar", false, true, false).unwrap();
        assert_eq!((insensitive.content.as_str(), insensitive.matches), ("bar bar bar", 3));

        let first_only = apply_edit(text, "foo", "bar", false, false, false).unwrap();
        assert_eq!(first_only.content, "bar foo FOO");

        let groups = apply_edit("key=value", r"(\w+)=(\w+)", "$2=$1", true, true, true).unwrap();
        assert_eq!(groups.content, "value=key");

        let dollar = apply_edit("price", "price", "$5", false, true, false).unwrap();
        assert_eq!(dollar.content, "$5");

        let bad = apply_edit(text, "(", "x", true, true, true).unwrap_err();
        assert!(bad.starts_with("Invalid regex"));
    }

    async fn edit(ctx: &ToolContext, args: serde_json::Value) -> ToolResult {
        let args = args.as_object().cloned().unwrap();
        FileEditTool.execute(args, ctx).await.unwrap().into_result()
    }

    #[tokio::test]
    async fn test_edit_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("cfg.txt"), "debug = false\nverbose = false\n")
            .await
            .unwrap();
        let ctx = ToolContext::new(dir.path());

        let args = json!({"path": "cfg.txt", "search": "false", "replace": "true"});
        let result = edit(&ctx, args).await;
        assert!(result.success);
        assert_eq!(result.metadata["replacements_made"], json!(2));

        let updated = tokio::fs::read_to_string(dir.path().join("cfg.txt")).await.unwrap();
        assert_eq!(updated, "debug = true\nverbose = true\n");
    }

    #[tokio::test]
    async fn test_no_match_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "alpha").await.unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = edit(&ctx, json!({"path": "a.txt", "search": "omega", "replace": "x"})).await;
        assert!(!result.success);
        assert_eq!(result.metadata["matches"], json!(0));
        assert_eq!(tokio::fs::read_to_string(dir.path().join("a.txt")).await.unwrap(), "alpha");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = edit(&ctx, json!({"path": "gone.txt", "search": "a", "replace": "b"})).await;
        assert_eq!(result.error.as_deref(), Some("File not found: gone.txt"));
    }
}
