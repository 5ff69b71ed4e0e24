use agentkit_core::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{ToolArgs, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// The function half of a tool-call request. `arguments` is a JSON string as
/// produced by the model; it is parsed only when the call is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// `{id, type: "function", function: {name, arguments}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the argument string. An empty string means no arguments.
    pub fn parse_arguments(&self) -> Result<ToolArgs, String> {
        if self.function.arguments.trim().is_empty() {
            return Ok(ToolArgs::new());
        }
        match serde_json::from_str::<Value>(&self.function.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("Tool arguments must be a JSON object, got {}", other)),
            Err(e) => Err(format!("Invalid tool arguments: {}", e)),
        }
    }
}

/// One chat message in the OpenAI-style wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// `{role: "tool", tool_call_id, content: <JSON of {success, output, error}>}`
    pub fn tool_response(call_id: impl Into<String>, payload: &Value) -> Self {
        Self {
            role: Role::Tool,
            content: Some(payload.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A final user/assistant pair kept in long-term history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: Option<String>,
}

/// One executed tool call, as recorded for the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub parameters: ToolArgs,
    pub result: ToolResult,
}

/// Long-term history for one agent conversation.
///
/// Only final exchanges are kept; intermediate tool round-trips are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    system_prompt: Option<String>,
    exchanges: Vec<Exchange>,
    /// Number of most recent exchanges replayed into each request
    max_history: usize,
    tool_history: Vec<ToolInvocation>,
}

impl Conversation {
    pub fn new(max_history: usize) -> Self {
        Self {
            system_prompt: None,
            exchanges: Vec::new(),
            max_history,
            tool_history: Vec::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            ..Self::new(config.max_history)
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn tool_history(&self) -> &[ToolInvocation] {
        &self.tool_history
    }

    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: Option<String>) {
        self.exchanges.push(Exchange {
            user: user.into(),
            assistant,
        });
    }

    pub fn record_tool(&mut self, invocation: ToolInvocation) {
        self.tool_history.push(invocation);
    }

    /// Request seed: system prompt, the last `max_history` exchanges, then
    /// the new user message.
    pub fn build_messages(&self, user_message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }

        let skip = self.exchanges.len().saturating_sub(self.max_history);
        for exchange in &self.exchanges[skip..] {
            messages.push(ChatMessage::user(exchange.user.clone()));
            if let Some(reply) = &exchange.assistant {
                messages.push(ChatMessage::assistant(reply.clone()));
            }
        }

        messages.push(ChatMessage::user(user_message));
        messages
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.tool_history.clear();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_window() {
        let mut conv = Conversation::new(2).with_system_prompt("Be brief");
        for i in 0..5 {
            conv.record_exchange(format!("q{}", i), Some(format!("a{}", i)));
        }

        let messages = conv.build_messages("next");
        let contents: Vec<_> = messages.iter().map(|m| m.content_str()).collect();
        assert_eq!(contents, vec!["Be brief", "q3", "a3", "q4", "a4", "next"]);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_from_config() {
        let config = LlmConfig {
            system_prompt: Some("Use tools sparingly".into()),
            max_history: 1,
            ..LlmConfig::default()
        };
        let mut conv = Conversation::from_config(&config);
        conv.record_exchange("old", Some("older".into()));
        conv.record_exchange("recent", Some("reply".into()));
        let messages = conv.build_messages("now");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content_str(), "recent");
    }

    #[test]
    fn test_exchange_without_reply() {
        let mut conv = Conversation::default();
        conv.record_exchange("hello", None);
        let messages = conv.build_messages("again");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_tool_call_wire_shape() {
        let msg = ChatMessage::assistant_with_tool_calls(
            None,
            vec![ToolCallRequest::new("call_1", "bash", r#"{"command":"ls"}"#)],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "bash", "arguments": "{\"command\":\"ls\"}"}
                }]
            })
        );
    }

    #[test]
    fn test_tool_response_shape() {
        let payload = json!({"success": true, "output": 1, "error": null});
        let msg = ChatMessage::tool_response("call_9", &payload);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
        let content: Value = serde_json::from_str(json["content"].as_str().unwrap()).unwrap();
        assert_eq!(content["output"], 1);
    }

    #[test]
    fn test_parse_arguments() {
        assert!(ToolCallRequest::new("1", "t", "").parse_arguments().unwrap().is_empty());
        assert_eq!(
            ToolCallRequest::new("1", "t", r#"{"a": 1}"#).parse_arguments().unwrap()["a"],
            json!(1)
        );
        assert!(ToolCallRequest::new("1", "t", "[1]").parse_arguments().is_err());
        assert!(ToolCallRequest::new("1", "t", "{not json").parse_arguments().is_err());
    }

    #[test]
    fn test_deserialize_provider_message() {
        let raw = r#"{"role":"assistant","content":"ok",
            "tool_calls":[{"id":"c","function":{"name":"grep","arguments":"{}"}}]}"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls[0].kind, "function");
    }
}
