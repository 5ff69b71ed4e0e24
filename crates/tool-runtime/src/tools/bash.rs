//! Shell command execution tool.
//!
//! Runs commands via `sh -c` with a bounded timeout and optional working directory.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{str_arg, u64_arg};
use crate::param::{ParameterKind, ToolParameter};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolResult};

/// Execute shell commands with timeout and working directory support.
#[derive(Debug, Default)]
pub struct BashTool;

impl BashTool {
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const MAX_TIMEOUT_SECS: u64 = 300;
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute bash commands with timeout and safety checks. Supports setting working directory \
         and command timeout. Returns stdout, stderr, and exit code."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new(
                "command",
                ParameterKind::String,
                "The bash command to execute",
            )
            .required(),
            ToolParameter::new(
                "timeout",
                ParameterKind::Integer,
                "Timeout in seconds (default: 30, max: 300)",
            )
            .with_default(Self::DEFAULT_TIMEOUT_SECS),
            ToolParameter::new(
                "cwd",
                ParameterKind::String,
                "Working directory for command execution",
            ),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let command = str_arg(&args, "command")?;
        let timeout_secs = u64_arg(&args, "timeout")
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS)
            .min(Self::MAX_TIMEOUT_SECS);
        let working_dir: PathBuf = match args.get("cwd").and_then(|v| v.as_str()) {
            Some(dir) => context.resolve_path(dir),
            None => context.working_directory.clone(),
        };

        if !working_dir.is_dir() {
            let message = format!("Working directory not found: {}", working_dir.display());
            return Ok(ToolResult::failure(message)
                .with_metadata("command", command)
                .into());
        }

        debug!(
            command,
            timeout_secs,
            working_dir = %working_dir.display(),
            "executing bash command"
        );

        let timeout = Duration::from_secs(timeout_secs);
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&working_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn shell: {e}")))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed(format!("command execution error: {e}")));
            }
            Err(_) => {
                warn!(command, timeout_secs, "command timed out");
                let message = format!("Command timed out after {timeout_secs} seconds");
                return Ok(ToolResult::failure(message)
                    .with_metadata("command", command)
                    .with_metadata("timeout", timeout_secs)
                    .into());
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let payload = json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": exit_code,
        });

        let result = if output.status.success() {
            ToolResult::ok(payload)
        } else {
            debug!(exit_code, "command returned non-zero exit code");
            ToolResult::failure(format!("Command failed with exit code {exit_code}"))
                .with_output(payload)
        };

        Ok(result
            .with_metadata("command", command)
            .with_metadata("timeout", timeout_secs)
            .with_metadata("cwd", working_dir.display().to_string())
            .into())
    }
}
