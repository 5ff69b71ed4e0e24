use agentkit_core::Config;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::conversation::{ChatMessage, Conversation, ToolCallRequest, ToolInvocation};
use crate::executor::ToolExecutor;
use crate::provider::{ChatProvider, ChatRequest, LlmError};
use crate::registry::ToolRegistry;
use crate::tool::{ToolArgs, ToolResult};

/// The bounded LLM ↔ tool dialogue.
///
/// Flow: User → LLM → tool calls → execute → tool responses → LLM → ... →
/// final message. Round-trips are strictly sequential.
pub struct ToolCallingLoop {
    provider: Arc<dyn ChatProvider>,
    executor: ToolExecutor,
    tools_enabled: bool,
    /// Tools exposed to the model; `None` exposes every enabled tool.
    allowed_tools: Option<Vec<String>>,
    max_iterations: u32,
    temperature: f32,
    max_tokens: u32,
    tool_choice: String,
    model: Option<String>,
}

impl ToolCallingLoop {
    pub fn new(provider: Arc<dyn ChatProvider>, executor: ToolExecutor) -> Self {
        Self {
            provider,
            executor,
            tools_enabled: true,
            allowed_tools: None,
            max_iterations: 5,
            temperature: 0.7,
            max_tokens: 4096,
            tool_choice: "auto".to_string(),
            model: None,
        }
    }

    pub fn from_config(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        let executor = ToolExecutor::from_config(registry, &config.tools);
        let mut runtime = Self::new(provider, executor)
            .with_max_iterations(config.tools.max_iterations)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
            .with_tool_choice(config.llm.tool_choice.clone());
        runtime.allowed_tools = config.tools.enabled_tools.clone();
        runtime.model = config.llm.model.clone();
        runtime
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_tool_choice(mut self, choice: impl Into<String>) -> Self {
        self.tool_choice = choice.into();
        self
    }

    pub fn with_allowed_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut ToolExecutor {
        &mut self.executor
    }

    /// Names of the registered, enabled tools the model may call.
    pub fn available_tools(&self) -> Vec<String> {
        if !self.tools_enabled {
            return Vec::new();
        }
        self.executor
            .registry()
            .list(true)
            .into_iter()
            .filter(|name| self.is_allowed(name))
            .collect()
    }

    fn is_allowed(&self, name: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    }

    fn request(&self, messages: Vec<ChatMessage>, tools: Option<Vec<Value>>) -> ChatRequest {
        let tool_choice = tools.as_ref().map(|_| self.tool_choice.clone());
        ChatRequest {
            messages,
            tools,
            tool_choice,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            model: self.model.clone(),
        }
    }

    /// Run one user turn and return the model's final message.
    ///
    /// Stops when a message carries no tool calls, or after `max_iterations`
    /// round-trips; in the latter case the last message is returned as-is
    /// and its tool calls are not executed. Only the final exchange is added
    /// to the conversation history.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> Result<ChatMessage, LoopError> {
        let mut messages = conversation.build_messages(user_message);

        let schemas = if self.tools_enabled {
            self.executor.registry().get_schemas(self.allowed_tools.as_deref())
        } else {
            Vec::new()
        };

        if schemas.is_empty() {
            debug!(
                provider = self.provider.provider_name(),
                "No tools available, plain chat round-trip"
            );
            let response = self.provider.chat(self.request(messages, None)).await?;
            conversation.record_exchange(user_message, response.content.clone());
            return Ok(response);
        }

        let cap = self.max_iterations.max(1);
        let mut iteration = 0;
        loop {
            iteration += 1;
            debug!(iteration, tools = schemas.len(), "Requesting LLM response");
            let response = self
                .provider
                .chat(self.request(messages.clone(), Some(schemas.clone())))
                .await?;

            if !response.has_tool_calls() {
                info!(iteration, "Tool-calling loop complete");
                conversation.record_exchange(user_message, response.content.clone());
                return Ok(response);
            }

            if iteration >= cap {
                warn!(
                    max_iterations = cap,
                    pending_calls = response.tool_calls.len(),
                    "Tool-calling loop reached max iterations"
                );
                conversation.record_exchange(user_message, response.content.clone());
                return Ok(response);
            }

            info!(iteration, count = response.tool_calls.len(), "Executing tool calls");
            let calls = response.tool_calls.clone();
            messages.push(response);

            for call in &calls {
                let payload = self.dispatch(conversation, call).await;
                messages.push(ChatMessage::tool_response(call.id.clone(), &payload));
            }
        }
    }

    /// Execute one requested call and build its `{success, output, error}`
    /// payload. Faults become failed payloads; the loop keeps going.
    async fn dispatch(&self, conversation: &mut Conversation, call: &ToolCallRequest) -> Value {
        let name = &call.function.name;

        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(reason) => {
                warn!(
                    tool = %name,
                    call_id = %call.id,
                    error = %reason,
                    "Unparseable tool arguments"
                );
                return failure_payload(reason);
            }
        };

        if !self.is_allowed(name) {
            warn!(
                tool = %name,
                call_id = %call.id,
                "Model requested a tool outside the allow list"
            );
            return failure_payload(format!("Tool '{}' is not available", name));
        }

        debug!(tool = %name, call_id = %call.id, "Dispatching tool call");
        let result = self.executor.execute(name, args.clone(), Map::new()).await;
        let payload = result.to_payload();
        conversation.record_tool(ToolInvocation {
            tool: name.clone(),
            parameters: args,
            result,
        });
        payload
    }

    /// Invoke a tool directly, outside any model round-trip.
    pub async fn use_tool(
        &self,
        conversation: &mut Conversation,
        tool_name: &str,
        parameters: ToolArgs,
    ) -> Result<ToolResult, LoopError> {
        if !self.tools_enabled {
            return Err(LoopError::ToolsDisabled);
        }

        let result = self.executor.execute(tool_name, parameters.clone(), Map::new()).await;
        conversation.record_tool(ToolInvocation {
            tool: tool_name.to_string(),
            parameters,
            result: result.clone(),
        });
        Ok(result)
    }
}

fn failure_payload(error: String) -> Value {
    json!({"success": false, "output": null, "error": error})
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Tools not enabled for this agent")]
    ToolsDisabled,
}
