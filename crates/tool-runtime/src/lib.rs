pub mod conversation;
pub mod executor;
pub mod param;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod safety;
pub mod tool;
pub mod tools;

pub use conversation::{ChatMessage, Conversation, Role, ToolCallRequest, ToolInvocation};
pub use executor::{ExecutionStats, ToolExecutor};
pub use param::{ParameterKind, ToolParameter, ValidationError};
pub use provider::{ChatProvider, ChatRequest, LlmError};
pub use registry::{Registration, RegistryError, ToolMetadata, ToolRegistry};
pub use runtime::{LoopError, ToolCallingLoop};
pub use safety::{RuleCategory, SafetyReport, SafetyRule, SafetyValidator, Severity};
pub use tool::{
    Tool, ToolArgs, ToolCall, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolResult,
};
pub use tools::{
    register_builtin_tools, BashTool, FileEditTool, FileListTool, FileReadTool, FileWriteTool,
    GrepTool,
};
