use crate::conversation::ChatMessage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// One chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Function schemas; `None` means a plain chat round-trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    /// Only set alongside `tools`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: None,
            tool_choice: None,
            temperature: 0.7,
            max_tokens: 4096,
            model: None,
        }
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Trait for LLM chat backends that understand function calling.
///
/// Defined here, by the consumer (the tool-calling loop); client
/// implementations live with the provider adapters.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Return the next assistant message for the request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, LlmError>;

    /// Provider name for logging/debugging (e.g., "claude", "openai", "ollama")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Authentication failed")]
    AuthError,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Scripted provider for exercising the tool-calling loop without a network.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued responses in FIFO order, then repeats the fallback.
    pub struct MockChatProvider {
        responses: Mutex<VecDeque<ChatMessage>>,
        fallback: Mutex<Option<ChatMessage>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockChatProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a response that will be returned on the next call.
        pub fn queue_response(&self, message: ChatMessage) {
            self.responses.lock().unwrap().push_back(message);
        }

        /// Queue a plain text answer.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(ChatMessage::assistant(text));
        }

        /// Queue a message requesting a single tool call.
        pub fn queue_tool_call(&self, id: &str, tool: &str, arguments: Value) {
            self.queue_response(ChatMessage::assistant_with_tool_calls(
                None,
                vec![ToolCallRequest::new(id, tool, arguments.to_string())],
            ));
        }

        /// Returned whenever the queue is empty.
        pub fn repeat(&self, message: ChatMessage) {
            *self.fallback.lock().unwrap() = Some(message);
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for MockChatProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChatProvider for MockChatProvider {
        async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, LlmError> {
            self.requests.lock().unwrap().push(request);
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return Ok(next);
            }
            self.fallback.lock().unwrap().clone().ok_or_else(|| {
                LlmError::InvalidResponse("mock provider has no scripted response".into())
            })
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
