//! Pattern-based screening of tool parameters.
//!
//! A flat rule table (regex + severity + category) is scanned against every
//! string parameter. This is a best-effort filter, not a sandbox.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Filesystem,
    System,
    Network,
    Execution,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Filesystem => "filesystem",
            RuleCategory::System => "system",
            RuleCategory::Network => "network",
            RuleCategory::Execution => "execution",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, immutable policy check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetyRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    pub category: RuleCategory,
}

impl SafetyRule {
    const fn new(
        name: &'static str,
        pattern: &'static str,
        severity: Severity,
        message: &'static str,
        category: RuleCategory,
    ) -> Self {
        Self {
            name,
            pattern,
            severity,
            message,
            category,
        }
    }

    /// `[SEVERITY] message`
    pub fn violation(&self) -> String {
        format!("[{}] {}", self.severity.label(), self.message)
    }
}

use RuleCategory::{Execution, Filesystem, Network, System};
use Severity::{Error, Warning};

/// Rule table. Names are unique; append new rules at the end of their group.
pub const RULES: &[SafetyRule] = &[
    // filesystem
    SafetyRule::new(
        "rm_rf",
        r"\brm\s+(-[a-z]*r[a-z]*f|--recursive\s+--force|-fr|-rf)\b",
        Error,
        "Recursive force removal detected (rm -rf)",
        Filesystem,
    ),
    SafetyRule::new(
        "rm_root",
        r"\brm\b.*\s+(-r|--recursive).*(/\s|/\*)",
        Error,
        "Removal of root directory or critical paths",
        Filesystem,
    ),
    SafetyRule::new(
        "mkfs",
        r"\bmkfs\b",
        Error,
        "Filesystem creation/formatting detected (mkfs)",
        Filesystem,
    ),
    SafetyRule::new(
        "dd_dangerous",
        r"\bdd\b.*\bof=/dev/(sd[a-z]|hd[a-z]|nvme[0-9])",
        Error,
        "Direct disk write detected (dd to block device)",
        Filesystem,
    ),
    SafetyRule::new(
        "format_disk",
        r"\b(fdisk|parted|gdisk)\b",
        Error,
        "Disk partitioning/formatting tool detected",
        Filesystem,
    ),
    // system
    SafetyRule::new(
        "shutdown",
        r"\b(shutdown|poweroff|reboot|init\s+[06])\b",
        Error,
        "System shutdown/reboot command detected",
        System,
    ),
    SafetyRule::new(
        "kill_all",
        r"\bkillall\b.*-9",
        Warning,
        "Force kill all processes (killall -9)",
        System,
    ),
    SafetyRule::new(
        "fork_bomb",
        r":\(\)\{.*:\|:.*\};:",
        Error,
        "Fork bomb pattern detected",
        System,
    ),
    SafetyRule::new(
        "chmod_777",
        r"\bchmod\b.*777",
        Warning,
        "Overly permissive permissions (chmod 777)",
        System,
    ),
    SafetyRule::new(
        "disable_firewall",
        r"\b(ufw|iptables|firewalld)\b.*(disable|stop|flush|--flush)",
        Warning,
        "Firewall modification detected",
        System,
    ),
    // network
    SafetyRule::new(
        "curl_pipe_sh",
        r"\bcurl\b.*\|\s*(bash|sh|zsh)",
        Error,
        "Piping remote content to shell (curl | sh)",
        Network,
    ),
    SafetyRule::new(
        "wget_pipe_sh",
        r"\bwget\b.*-O\s*-.*\|\s*(bash|sh|zsh)",
        Error,
        "Piping remote content to shell (wget | sh)",
        Network,
    ),
    // execution
    SafetyRule::new(
        "eval",
        r"\beval\b\s*\(",
        Warning,
        "Use of eval() for code execution",
        Execution,
    ),
    SafetyRule::new(
        "exec",
        r"\bexec\b\s*\(",
        Warning,
        "Use of exec() for code execution",
        Execution,
    ),
];

/// Critical roots: exact matches are denied, descendants only warn.
pub const CRITICAL_PATHS: &[&str] = &[
    "/", "/etc", "/bin", "/sbin", "/usr", "/var", "/boot", "/sys", "/proc",
];

/// Parameter-name fragments that mark a value as a filesystem path.
const PATH_KEY_HINTS: &[&str] = &["path", "file", "dir", "directory"];

static COMPILED: OnceLock<Vec<(&'static SafetyRule, Regex)>> = OnceLock::new();

/// Compiled once per process. Every pattern in `RULES` is a literal checked by
/// the tests, so a failed compile only drops that rule.
fn compiled_rules() -> &'static [(&'static SafetyRule, Regex)] {
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|rule| {
                match RegexBuilder::new(rule.pattern).case_insensitive(true).build() {
                    Ok(re) => Some((rule, re)),
                    Err(e) => {
                        error!(rule = rule.name, error = %e, "Safety rule failed to compile");
                        None
                    }
                }
            })
            .collect()
    })
}

/// Outcome of a scan. `is_safe` reflects blocking findings only; `violations`
/// lists every finding, including non-blocking warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub is_safe: bool,
    pub violations: Vec<String>,
}

impl SafetyReport {
    fn safe() -> Self {
        Self {
            is_safe: true,
            violations: Vec::new(),
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Result of a path check. `message` is set for both denials and warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    pub is_safe: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyValidator;

impl SafetyValidator {
    pub fn new() -> Self {
        // Warm the pattern cache so the first call doesn't pay for it.
        compiled_rules();
        Self
    }

    pub fn rules(&self) -> &'static [SafetyRule] {
        RULES
    }

    pub fn rules_by_category(&self, category: RuleCategory) -> Vec<&'static SafetyRule> {
        RULES.iter().filter(|r| r.category == category).collect()
    }

    pub fn categories(&self) -> BTreeSet<RuleCategory> {
        RULES.iter().map(|r| r.category).collect()
    }

    /// Scan a command-like string against every rule.
    ///
    /// Error-severity matches always block; warnings block only when
    /// `allow_warnings` is false.
    pub fn validate_command(&self, command: &str, allow_warnings: bool) -> SafetyReport {
        let mut report = SafetyReport::safe();

        for (rule, pattern) in compiled_rules() {
            if !pattern.is_match(command) {
                continue;
            }
            report.violations.push(rule.violation());
            if rule.severity == Severity::Error || !allow_warnings {
                report.is_safe = false;
            }
            warn!(
                rule = rule.name,
                category = %rule.category,
                "Safety violation in command: {}",
                rule.message
            );
        }

        report
    }

    /// Deny exact critical roots; warn (without blocking) on anything beneath them.
    pub fn validate_path(&self, path: &str) -> PathCheck {
        let normalized = path.trim_end_matches('/');
        let normalized = if normalized.is_empty() && path.starts_with('/') {
            "/"
        } else {
            normalized
        };

        for critical in CRITICAL_PATHS {
            if normalized == *critical {
                let message = format!("Access to critical system path denied: {}", path);
                error!(path, "{}", message);
                return PathCheck {
                    is_safe: false,
                    message: Some(message),
                };
            }

            if *critical != "/" && normalized.starts_with(&format!("{}/", critical)) {
                let message = format!("Modification of system path may be dangerous: {}", path);
                warn!(path, "{}", message);
                return PathCheck {
                    is_safe: true,
                    message: Some(message),
                };
            }
        }

        PathCheck {
            is_safe: true,
            message: None,
        }
    }

    /// Screen every parameter of a call, descending into objects and arrays.
    ///
    /// String values are scanned as commands; values under path-like keys are
    /// also checked as paths. String array elements are reported as
    /// `key[index]`.
    pub fn validate_parameters(
        &self,
        tool_name: &str,
        params: &Map<String, Value>,
        allow_warnings: bool,
    ) -> SafetyReport {
        let mut report = SafetyReport::safe();

        for (key, value) in params {
            match value {
                Value::String(text) => self.check_string(key, text, allow_warnings, &mut report),
                Value::Object(nested) => {
                    report.merge(self.validate_parameters(tool_name, nested, allow_warnings));
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        match item {
                            Value::String(text) => {
                                let element_key = format!("{}[{}]", key, index);
                                self.check_string(&element_key, text, allow_warnings, &mut report);
                            }
                            Value::Object(nested) => {
                                report.merge(
                                    self.validate_parameters(tool_name, nested, allow_warnings),
                                );
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        if report.has_findings() {
            warn!(
                tool = tool_name,
                findings = report.violations.len(),
                blocked = !report.is_safe,
                "Safety scan findings"
            );
        }
        report
    }

    fn check_string(&self, key: &str, text: &str, allow_warnings: bool, report: &mut SafetyReport) {
        let command = self.validate_command(text, allow_warnings);
        if !command.is_safe {
            report.is_safe = false;
        }
        report
            .violations
            .extend(command.violations.into_iter().map(|v| format!("Parameter '{}': {}", key, v)));

        let lowered = key.to_lowercase();
        if PATH_KEY_HINTS.iter().any(|hint| lowered.contains(hint)) {
            let path = self.validate_path(text);
            match path.message {
                Some(message) if !path.is_safe => {
                    report.is_safe = false;
                    report.violations.push(format!("Parameter '{}': {}", key, message));
                }
                Some(message) => debug!(parameter = key, %message, "Path under critical root"),
                None => {}
            }
        }
    }
}

impl SafetyReport {
    fn merge(&mut self, other: SafetyReport) {
        self.is_safe &= other.is_safe;
        self.violations.extend(other.violations);
    }
}
