use agentkit_core::ToolsConfig;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::registry::{RegistryError, ToolRegistry};
use crate::safety::SafetyValidator;
use crate::tool::{ToolArgs, ToolCall, ToolContext, ToolError, ToolResult};

/// Running counters. Rates are derived on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub blocked_executions: u64,
    #[serde(serialize_with = "as_secs")]
    pub total_execution_time: Duration,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ExecutionStats {
    fn ratio(&self, count: u64) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            count as f64 / self.total_executions as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.ratio(self.successful_executions)
    }

    pub fn failure_rate(&self) -> f64 {
        self.ratio(self.failed_executions)
    }

    pub fn blocked_rate(&self) -> f64 {
        self.ratio(self.blocked_executions)
    }

    pub fn avg_execution_time(&self) -> Duration {
        if self.total_executions == 0 {
            Duration::ZERO
        } else {
            let seconds = self.total_execution_time.as_secs_f64() / self.total_executions as f64;
            Duration::from_secs_f64(seconds)
        }
    }

    /// Counters plus derived rates, times in seconds.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "total_executions": self.total_executions,
            "successful_executions": self.successful_executions,
            "failed_executions": self.failed_executions,
            "blocked_executions": self.blocked_executions,
            "total_execution_time": self.total_execution_time.as_secs_f64(),
            "success_rate": self.success_rate(),
            "failure_rate": self.failure_rate(),
            "blocked_rate": self.blocked_rate(),
            "avg_execution_time": self.avg_execution_time().as_secs_f64(),
        })
    }
}

enum Tally {
    Succeeded,
    Failed,
    Blocked,
}

/// Runs tools through validation, safety screening and execution.
///
/// Every path returns a [`ToolResult`]; nothing raised by a tool (errors,
/// panics, timeouts) escapes to the caller.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    safety: SafetyValidator,
    safety_enabled: bool,
    allow_warnings: bool,
    timeout: Option<Duration>,
    working_directory: PathBuf,
    stats: Mutex<ExecutionStats>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            safety: SafetyValidator::new(),
            safety_enabled: true,
            allow_warnings: true,
            timeout: None,
            working_directory: PathBuf::from("."),
            stats: Mutex::new(ExecutionStats::default()),
        }
    }

    pub fn from_config(registry: Arc<ToolRegistry>, config: &ToolsConfig) -> Self {
        let mut executor = Self::new(registry)
            .with_working_directory(config.working_dir.clone())
            .with_timeout(config.timeout);
        executor.safety_enabled = config.safety_enabled;
        executor.allow_warnings = config.allow_warnings;
        executor
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn safety_enabled(&self) -> bool {
        self.safety_enabled
    }

    pub fn allow_warnings(&self) -> bool {
        self.allow_warnings
    }

    pub fn enable_safety(&mut self, allow_warnings: bool) {
        self.safety_enabled = true;
        self.allow_warnings = allow_warnings;
        info!(allow_warnings, "Safety validation enabled");
    }

    pub fn disable_safety(&mut self) {
        self.safety_enabled = false;
        warn!("Safety validation disabled - use with caution!");
    }

    pub fn stats(&self) -> ExecutionStats {
        self.lock_stats().clone()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = ExecutionStats::default();
        info!("Execution statistics reset");
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, ExecutionStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Execute one tool call. `context` is forwarded to the tool unchanged.
    pub async fn execute(
        &self,
        tool_name: &str,
        parameters: ToolArgs,
        context: Map<String, Value>,
    ) -> ToolResult {
        let start = Instant::now();
        let (mut result, tally) = self.run(tool_name, parameters, context).await;
        let elapsed = start.elapsed();
        result.execution_time = elapsed;

        let mut stats = self.lock_stats();
        stats.total_executions += 1;
        stats.total_execution_time += elapsed;
        match tally {
            Tally::Succeeded => stats.successful_executions += 1,
            Tally::Failed => stats.failed_executions += 1,
            Tally::Blocked => stats.blocked_executions += 1,
        }
        drop(stats);

        info!(
            tool = tool_name,
            success = result.success,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool completed"
        );
        result
    }

    async fn run(
        &self,
        tool_name: &str,
        mut parameters: ToolArgs,
        context: Map<String, Value>,
    ) -> (ToolResult, Tally) {
        let tool = match self.registry.create(tool_name) {
            Ok(tool) => tool,
            Err(e @ RegistryError::NotFound { .. }) | Err(e @ RegistryError::Disabled(_)) => {
                error!(tool = tool_name, error = %e, "Tool not found");
                return (ToolResult::failure(format!("Tool not found: {}", e)), Tally::Failed);
            }
            Err(e) => {
                error!(tool = tool_name, error = %e, "Failed to create tool");
                return (ToolResult::failure(format!("Tool creation failed: {}", e)), Tally::Failed);
            }
        };

        if let Err(e) = tool.validate_parameters(&mut parameters) {
            error!(tool = tool_name, error = %e, "Parameter validation failed");
            let message = format!("Parameter validation failed: {}", e);
            return (ToolResult::failure(message), Tally::Failed);
        }

        if self.safety_enabled {
            let report =
                self.safety.validate_parameters(tool_name, &parameters, self.allow_warnings);
            if !report.is_safe {
                error!(
                    tool = tool_name,
                    violations = ?report.violations,
                    "Safety validation failed"
                );
                let message = format!("Safety validation failed: {}", report.violations.join("; "));
                let result = ToolResult::failure(message)
                    .with_metadata("safety_violations", report.violations);
                return (result, Tally::Blocked);
            }
            if report.has_findings() {
                warn!(tool = tool_name, violations = ?report.violations, "Safety warnings");
            }
        }

        info!(tool = tool_name, "Executing tool");
        debug!(tool = tool_name, parameters = ?parameters, "Tool parameters");

        let tool_context = ToolContext {
            working_directory: self.working_directory.clone(),
            values: context,
        };
        let fut = AssertUnwindSafe(tool.execute(parameters, &tool_context)).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(ToolError::Timeout(limit))),
            },
            None => fut.await,
        };

        match outcome {
            Ok(Ok(output)) => {
                let mut result = output.into_result();
                if !result.success && result.error.is_none() {
                    result.error =
                        Some("Tool reported failure without an error message".to_string());
                }
                let tally = if result.success { Tally::Succeeded } else { Tally::Failed };
                (result, tally)
            }
            Ok(Err(e)) => {
                error!(tool = tool_name, error = %e, "Tool execution failed");
                (ToolResult::failure(format!("Execution error: {}", e)), Tally::Failed)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = tool_name, panic = %message, "Tool panicked");
                (ToolResult::failure(format!("Execution error: {}", message)), Tally::Failed)
            }
        }
    }

    /// Run calls in order, one at a time. With `stop_on_error` the first
    /// failed outcome ends the batch; outcomes gathered so far are kept.
    pub async fn execute_batch(&self, calls: &[ToolCall], stop_on_error: bool) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            info!(tool = %call.tool_name, "Executing batch tool {}/{}", index + 1, calls.len());

            let result = self
                .execute(&call.tool_name, call.parameters.clone(), call.context.clone())
                .await;
            let failed = !result.success;
            results.push(result);

            if stop_on_error && failed {
                warn!(tool = %call.tool_name, "Batch execution stopped due to error");
                break;
            }
        }

        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{ParameterKind, ToolParameter};
    use crate::registry::Registration;
    use crate::tool::{EchoTool, Tool, ToolOutput};
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct FaultyTool;

    #[async_trait]
    impl Tool for FaultyTool {
        fn name(&self) -> &str {
            "faulty"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed("disk on fire".into()))
        }
    }

    #[derive(Default)]
    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "panicky"
        }
        fn description(&self) -> &str {
            "Panics"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            panic!("boom");
        }
    }

    #[derive(Default)]
    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Sleeps for a while"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!("done").into())
        }
    }

    /// Reports the forwarded context and the working directory.
    #[derive(Default)]
    struct ContextTool;

    #[async_trait]
    impl Tool for ContextTool {
        fn name(&self) -> &str {
            "context"
        }
        fn description(&self) -> &str {
            "Returns its context"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![
                ToolParameter::new("note", ParameterKind::String, "Free text").with_default("none"),
            ]
        }
        async fn execute(
            &self,
            args: ToolArgs,
            ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolResult::ok(json!({
                "note": args.get("note"),
                "values": ctx.values,
                "cwd": ctx.working_directory.display().to_string(),
            }))
            .with_metadata("from_tool", true)
            .into())
        }
    }

    /// Fails without an error message and claims a long run time.
    #[derive(Default)]
    struct SilentTool;

    #[async_trait]
    impl Tool for SilentTool {
        fn name(&self) -> &str {
            "silent"
        }
        fn description(&self) -> &str {
            "Fails quietly"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            let mut result = ToolResult::ok(1);
            result.success = false;
            result.execution_time = Duration::from_secs(999);
            Ok(result.into())
        }
    }

    #[derive(Default)]
    struct DormantTool;

    #[async_trait]
    impl Tool for DormantTool {
        fn name(&self) -> &str {
            "dormant"
        }
        fn description(&self) -> &str {
            "Registered but switched off"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            Ok(json!("unreachable").into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register::<EchoTool>(Registration::new()).unwrap();
        registry.register::<FaultyTool>(Registration::new()).unwrap();
        registry.register::<PanickyTool>(Registration::new()).unwrap();
        registry.register::<SleepyTool>(Registration::new()).unwrap();
        registry.register::<ContextTool>(Registration::new()).unwrap();
        registry.register::<SilentTool>(Registration::new()).unwrap();
        registry.register::<DormantTool>(Registration::new().enabled(false)).unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_success_is_timed_and_counted() {
        let executor = executor();
        let result = executor.execute("echo", args(json!({"message": "hi"})), Map::new()).await;
        assert!(result.success);
        assert_eq!(result.output, json!("hi"));

        let stats = executor.stats();
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.successful_executions, 1);
        assert_eq!(stats.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_tools_become_failed_outcomes() {
        let executor = executor();

        let missing = executor.execute("nonexistent", Map::new(), Map::new()).await;
        assert!(!missing.success);
        assert!(missing
            .error
            .unwrap()
            .starts_with("Tool not found: Tool 'nonexistent' not found."));

        let disabled = executor.execute("dormant", Map::new(), Map::new()).await;
        assert!(!disabled.success);
        assert!(disabled.error.unwrap().contains("is disabled"));

        let stats = executor.stats();
        assert_eq!(stats.failed_executions, 2);
        assert_eq!(stats.blocked_executions, 0);
    }

    #[tokio::test]
    async fn test_validation_failure() {
        let executor = executor();
        let result = executor.execute("echo", args(json!({"message": 5})), Map::new()).await;
        assert_eq!(
            result.error.as_deref(),
            Some("Parameter validation failed: Parameter 'message' must be of type string")
        );
        assert_eq!(executor.stats().failed_executions, 1);
    }

    #[tokio::test]
    async fn test_safety_block_is_counted_separately() {
        let executor = executor();
        let params = args(json!({"message": "rm -rf /tmp/x"}));
        let result = executor.execute("echo", params, Map::new()).await;
        assert!(!result.success);
        assert!(result
            .error
            .unwrap()
            .starts_with("Safety validation failed: Parameter 'message': [ERROR]"));
        assert!(result.metadata["safety_violations"].as_array().is_some_and(|v| !v.is_empty()));

        let stats = executor.stats();
        assert_eq!(stats.blocked_executions, 1);
        assert_eq!(stats.failed_executions, 0);
    }

    #[tokio::test]
    async fn test_warning_proceeds_unless_strict() {
        let mut executor = executor();
        let params = args(json!({"message": "chmod 777 foo"}));
        assert!(executor.execute("echo", params.clone(), Map::new()).await.success);

        executor.enable_safety(false);
        assert!(!executor.execute("echo", params.clone(), Map::new()).await.success);

        executor.disable_safety();
        let unsafe_params = args(json!({"message": "rm -rf /"}));
        assert!(executor.execute("echo", unsafe_params, Map::new()).await.success);
    }

    #[tokio::test]
    async fn test_tool_error_and_panic_are_contained() {
        let executor = executor();

        let failed = executor.execute("faulty", Map::new(), Map::new()).await;
        assert_eq!(
            failed.error.as_deref(),
            Some("Execution error: Execution failed: disk on fire")
        );

        let panicked = executor.execute("panicky", Map::new(), Map::new()).await;
        assert_eq!(panicked.error.as_deref(), Some("Execution error: boom"));

        assert_eq!(executor.stats().failed_executions, 2);
    }

    #[tokio::test]
    async fn test_failure_without_message_gets_default_error() {
        let executor = executor();
        let result = executor.execute("silent", Map::new(), Map::new()).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool reported failure without an error message")
        );
        assert_eq!(executor.stats().failed_executions, 1);
    }

    #[tokio::test]
    async fn test_execution_time_overrides_tool_value() {
        let executor = executor();
        let result = executor.execute("silent", Map::new(), Map::new()).await;
        assert!(result.execution_time < Duration::from_secs(999));
        assert_eq!(executor.stats().total_execution_time, result.execution_time);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failed_outcome() {
        let executor = executor().with_timeout(Some(Duration::from_secs(1)));
        let result = executor.execute("sleepy", Map::new(), Map::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_context_and_working_directory_forwarded() {
        let executor = executor().with_working_directory("/srv/work");
        let mut context = Map::new();
        context.insert("session".into(), json!("abc"));

        let result = executor.execute("context", Map::new(), context).await;
        assert!(result.success);
        assert_eq!(result.output["note"], json!("none"));
        assert_eq!(result.output["values"]["session"], json!("abc"));
        assert_eq!(result.output["cwd"], json!("/srv/work"));
        assert_eq!(result.metadata["from_tool"], json!(true));
    }

    #[tokio::test]
    async fn test_batch_stop_on_error() {
        let executor = executor();
        let calls = vec![
            ToolCall::new("nonexistent", Map::new()),
            ToolCall::new("echo", args(json!({"message": "after"}))),
        ];

        let stopped = executor.execute_batch(&calls, true).await;
        assert_eq!(stopped.len(), 1);
        assert!(!stopped[0].success);

        let all = executor.execute_batch(&calls, false).await;
        assert_eq!(all.len(), 2);
        assert!(all[1].success);
    }

    #[tokio::test]
    async fn test_stats_summary_and_reset() {
        let executor = executor();
        executor.execute("echo", args(json!({"message": "a"})), Map::new()).await;
        executor.execute("faulty", Map::new(), Map::new()).await;

        let summary = executor.stats().summary();
        assert_eq!(summary["total_executions"], json!(2));
        assert_eq!(summary["failure_rate"], json!(0.5));

        executor.reset_stats();
        assert_eq!(executor.stats(), ExecutionStats::default());
        assert_eq!(executor.stats().summary()["avg_execution_time"], json!(0.0));
    }
}
