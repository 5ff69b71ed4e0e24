//! Built-in tool implementations.
//!
//! - **System tools** (`bash`): process execution
//! - **Filesystem tools** (`file_read`, `file_write`, `file_edit`, `file_list`)
//! - **Search tools** (`grep`)

pub mod bash;
pub mod file_edit;
pub mod file_list;
pub mod file_read;
pub mod file_write;
pub mod grep;

pub use bash::BashTool;
pub use file_edit::FileEditTool;
pub use file_list::FileListTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use grep::GrepTool;

use glob::Pattern;
use serde_json::Value;

use crate::registry::{Registration, RegistryError, ToolRegistry};
use crate::tool::{ToolArgs, ToolError, ToolResult};

/// Register every built-in tool with its category, tags and danger flag.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register::<BashTool>(
        Registration::new()
            .category("system")
            .tags(["bash", "command", "execution", "shell"])
            .extra("dangerous", true),
    )?;
    registry.register::<FileReadTool>(
        Registration::new()
            .category("filesystem")
            .tags(["file", "read", "io"])
            .extra("dangerous", false),
    )?;
    registry.register::<FileWriteTool>(
        Registration::new()
            .category("filesystem")
            .tags(["file", "write", "io"])
            .extra("dangerous", true),
    )?;
    registry.register::<FileEditTool>(
        Registration::new()
            .category("filesystem")
            .tags(["file", "edit", "modify", "search", "replace"])
            .extra("dangerous", true),
    )?;
    registry.register::<FileListTool>(
        Registration::new()
            .category("filesystem")
            .tags(["file", "list", "directory", "ls"])
            .extra("dangerous", false),
    )?;
    registry.register::<GrepTool>(
        Registration::new()
            .category("search")
            .tags(["grep", "search", "find", "pattern"])
            .extra("dangerous", false),
    )?;
    Ok(())
}

// ── Argument helpers ────────────────────────────────────────────────
//
// Arguments arrive validated and defaulted; these only unpack them.

pub(crate) fn str_arg<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing '{key}' field")))
}

pub(crate) fn opt_str_arg<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn bool_arg(args: &ToolArgs, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn u64_arg(args: &ToolArgs, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub(crate) fn glob_arg(args: &ToolArgs, key: &str) -> Result<Option<Pattern>, ToolError> {
    opt_str_arg(args, key)
        .map(|raw| {
            Pattern::new(raw)
                .map_err(|e| ToolError::InvalidInput(format!("invalid glob pattern '{raw}': {e}")))
        })
        .transpose()
}

/// Only UTF-8 text is supported.
pub(crate) fn check_encoding(args: &ToolArgs) -> Result<(), ToolResult> {
    let encoding = opt_str_arg(args, "encoding").unwrap_or("utf-8");
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(()),
        other => Err(ToolResult::failure(format!(
            "Unsupported encoding: {other} (only utf-8 is supported)"
        ))),
    }
}
