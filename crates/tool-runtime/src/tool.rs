use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::param::{input_schema, validate_arguments, ParameterKind, ToolParameter, ValidationError};

/// Arguments of a single call, keyed by declared parameter name.
pub type ToolArgs = Map<String, Value>;

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "bash", "file_read")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
}

impl ToolDefinition {
    /// OpenAI function-calling wire format.
    pub fn to_openai_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// A request to run one tool. Used for batch execution and for correlating
/// LLM tool-call ids back to results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: ToolArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, parameters: ToolArgs) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            call_id: None,
            context: Map::new(),
        }
    }

    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.call_id = Some(id.into());
        self
    }
}

/// Uniform outcome of every execution path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock time stamped by the executor, serialized as seconds.
    #[serde(default, with = "duration_secs")]
    pub execution_time: Duration,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            execution_time: Duration::ZERO,
            metadata: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
            execution_time: Duration::ZERO,
            metadata: Map::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<Value>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The compact `{success, output, error}` shape fed back to the LLM.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "success": self.success,
            "output": self.output,
            "error": self.error,
        })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}

/// What `execute` hands back: either a full outcome or a bare value that the
/// executor wraps into a successful one.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Outcome(ToolResult),
    Value(Value),
}

impl ToolOutput {
    pub fn into_result(self) -> ToolResult {
        match self {
            ToolOutput::Outcome(result) => result,
            ToolOutput::Value(value) => ToolResult::ok(value),
        }
    }
}

impl From<ToolResult> for ToolOutput {
    fn from(result: ToolResult) -> Self {
        ToolOutput::Outcome(result)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Value(value)
    }
}

/// Context passed to tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working directory for file/bash operations
    pub working_directory: PathBuf,
    /// Caller-supplied context from the originating `ToolCall`
    pub values: Map<String, Value>,
}

impl ToolContext {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            values: Map::new(),
        }
    }

    /// Relative paths resolve against the working directory.
    pub fn resolve_path(&self, requested: &str) -> PathBuf {
        let path = Path::new(requested);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(".")
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. Instances are cheap and
/// created fresh for every call by the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<ToolParameter>;

    /// Run the tool. Arguments have already been validated and defaulted.
    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: input_schema(&self.parameters()),
        }
    }

    fn to_openai_schema(&self) -> Value {
        self.definition().to_openai_schema()
    }

    fn validate_parameters(&self, args: &mut ToolArgs) -> Result<(), ValidationError> {
        validate_arguments(&self.parameters(), args)
    }
}

/// Fail-fast self-check run whenever a tool is constructed by the registry.
pub fn check_definition(tool: &dyn Tool) -> Result<(), DefinitionError> {
    if tool.name().trim().is_empty() {
        return Err(DefinitionError::MissingName);
    }
    if tool.description().trim().is_empty() {
        return Err(DefinitionError::MissingDescription(tool.name().to_string()));
    }
    let mut seen = HashSet::new();
    for param in tool.parameters() {
        if !seen.insert(param.name.clone()) {
            return Err(DefinitionError::DuplicateParameter {
                tool: tool.name().to_string(),
                parameter: param.name,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Tool must have a name")]
    MissingName,
    #[error("Tool '{0}' must have a description")]
    MissingDescription(String),
    #[error("Tool '{tool}' has duplicate parameter name '{parameter}'")]
    DuplicateParameter { tool: String, parameter: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Simple echo tool for testing purposes.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input message. For testing."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("message", ParameterKind::String, "The message to echo back")
                .required(),
        ]
    }

    async fn execute(
        &self,
        args: ToolArgs,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidInput("missing 'message' field".to_string()))?;

        Ok(Value::String(message.to_string()).into())
    }
}
