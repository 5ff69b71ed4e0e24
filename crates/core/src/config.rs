use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub tools: ToolsConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `AGENTKIT_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("AGENTKIT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            tools: ToolsConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  tools:  safety={}, allow_warnings={}, max_iterations={}, working_dir={}",
            self.tools.safety_enabled,
            self.tools.allow_warnings,
            self.tools.max_iterations,
            self.tools.working_dir.display()
        );
        tracing::info!(
            "  llm:    provider={}, model={}",
            self.llm.provider,
            self.llm.model.as_deref().unwrap_or("(provider default)")
        );
    }

    /// Return a redacted view safe for API responses (no prompt text).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "tools": {
                "safety_enabled": self.tools.safety_enabled,
                "allow_warnings": self.tools.allow_warnings,
                "max_iterations": self.tools.max_iterations,
                "timeout_secs": self.tools.timeout.map(|t| t.as_secs()),
                "working_dir": self.tools.working_dir,
                "enabled_tools": self.tools.enabled_tools,
            },
            "llm": {
                "provider": self.llm.provider,
                "model": self.llm.model,
                "temperature": self.llm.temperature,
                "max_tokens": self.llm.max_tokens,
                "tool_choice": self.llm.tool_choice,
                "max_history": self.llm.max_history,
                "has_system_prompt": self.llm.system_prompt.is_some(),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            tools: ToolsConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

// ── Tools ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Screen every call through the safety validator.
    pub safety_enabled: bool,
    /// Warning-severity findings are reported but do not block.
    pub allow_warnings: bool,
    /// LLM round-trips per user turn before the loop gives up.
    pub max_iterations: u32,
    /// Executor-level ceiling on a single tool call.
    pub timeout: Option<Duration>,
    pub working_dir: PathBuf,
    /// Tools exposed to the LLM. `None` exposes every enabled tool.
    pub enabled_tools: Option<Vec<String>>,
}

impl ToolsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            safety_enabled: profiled_env_bool(p, "TOOLS_SAFETY_ENABLED", true),
            allow_warnings: profiled_env_bool(p, "TOOLS_ALLOW_WARNINGS", true),
            max_iterations: profiled_env_u32(p, "TOOLS_MAX_ITERATIONS", 5),
            timeout: profiled_env_opt(p, "TOOLS_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            working_dir: PathBuf::from(profiled_env_or(p, "TOOLS_WORKING_DIR", ".")),
            enabled_tools: profiled_env_opt(p, "TOOLS_ENABLED").map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            safety_enabled: true,
            allow_warnings: true,
            max_iterations: 5,
            timeout: None,
            working_dir: PathBuf::from("."),
            enabled_tools: None,
        }
    }
}

// ── LLM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "claude", "gemini", "openai"
    pub provider: String,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sent alongside tool schemas ("auto", "none", or a tool name).
    pub tool_choice: String,
    pub system_prompt: Option<String>,
    /// Prior exchanges replayed on every request.
    pub max_history: usize,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "claude"),
            model: profiled_env_opt(p, "LLM_MODEL"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.7")
                .parse()
                .unwrap_or(0.7),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 4096),
            tool_choice: profiled_env_or(p, "LLM_TOOL_CHOICE", "auto"),
            system_prompt: profiled_env_opt(p, "LLM_SYSTEM_PROMPT"),
            max_history: profiled_env_u32(p, "LLM_MAX_HISTORY", 10) as usize,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: None,
            temperature: 0.7,
            max_tokens: 4096,
            tool_choice: "auto".to_string(),
            system_prompt: None,
            max_history: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.tools.safety_enabled);
        assert!(config.tools.allow_warnings);
        assert_eq!(config.tools.max_iterations, 5);
        assert_eq!(config.llm.tool_choice, "auto");
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn test_profile_prefixed_keys_win() {
        // Unique profile name so parallel tests never collide on env keys.
        env::set_var("CFGTEST_TOOLS_MAX_ITERATIONS", "9");
        env::set_var("CFGTEST_TOOLS_ENABLED", "bash, file_read,,");
        env::set_var("CFGTEST_TOOLS_SAFETY_ENABLED", "false");

        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile, "CFGTEST");
        assert_eq!(config.tools.max_iterations, 9);
        assert!(!config.tools.safety_enabled);
        assert_eq!(
            config.tools.enabled_tools,
            Some(vec!["bash".to_string(), "file_read".to_string()])
        );

        env::remove_var("CFGTEST_TOOLS_MAX_ITERATIONS");
        env::remove_var("CFGTEST_TOOLS_ENABLED");
        env::remove_var("CFGTEST_TOOLS_SAFETY_ENABLED");
    }

    #[test]
    fn test_redacted_summary_hides_prompt() {
        let mut config = Config::default();
        config.llm.system_prompt = Some("secret instructions".to_string());
        let summary = config.redacted_summary();
        assert_eq!(summary["llm"]["has_system_prompt"], true);
        assert!(!summary.to_string().contains("secret instructions"));
    }
}
