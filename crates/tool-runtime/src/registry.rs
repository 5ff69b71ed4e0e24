use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::param::ParameterKind;
use crate::tool::{check_definition, DefinitionError, Tool, ToolDefinition, ToolError};

/// Builds a fresh tool instance. Stored instead of an instance so no state
/// survives between calls.
pub type ToolFactory = Arc<dyn Fn() -> Result<Box<dyn Tool>, ToolError> + Send + Sync>;

/// Registration options: category, tags, enablement and free-form extras.
#[derive(Debug, Clone)]
pub struct Registration {
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub enabled: bool,
    pub extra: Map<String, Value>,
}

impl Registration {
    pub fn new() -> Self {
        Self {
            category: None,
            tags: BTreeSet::new(),
            enabled: true,
            extra: Map::new(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

/// Everything the registry knows about a tool without instantiating it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMetadata {
    /// Implementing Rust type.
    pub tool_type: String,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub enabled: bool,
    pub description: String,
    pub parameters: Vec<ParameterSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Catalog of tool factories and their metadata.
///
/// An explicit service object: build one at startup, hand it to the executor,
/// and build a fresh one per test.
pub struct ToolRegistry {
    factories: IndexMap<String, ToolFactory>,
    metadata: IndexMap<String, ToolMetadata>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
            metadata: IndexMap::new(),
        }
    }

    /// Register a default-constructible tool type.
    pub fn register<T>(&mut self, options: Registration) -> Result<String, RegistryError>
    where
        T: Tool + Default + 'static,
    {
        self.register_with(
            std::any::type_name::<T>(),
            || Ok(Box::new(T::default()) as Box<dyn Tool>),
            options,
        )
    }

    /// Register a tool through an explicit factory.
    ///
    /// The factory runs once here to read the definition; a definition that
    /// fails the self-check is fatal. Re-registering a name overwrites the
    /// previous entry.
    pub fn register_with<F>(
        &mut self,
        tool_type: &str,
        factory: F,
        options: Registration,
    ) -> Result<String, RegistryError>
    where
        F: Fn() -> Result<Box<dyn Tool>, ToolError> + Send + Sync + 'static,
    {
        let instance = factory().map_err(|e| {
            error!(tool_type, error = %e, "Failed to instantiate tool");
            RegistryError::CreationFailed {
                name: tool_type.to_string(),
                reason: e.to_string(),
            }
        })?;
        check_definition(instance.as_ref())?;

        let name = instance.name().to_string();
        if self.factories.contains_key(&name) {
            warn!(tool = %name, tool_type, "Tool already registered, overwriting");
        }

        let metadata = ToolMetadata {
            tool_type: tool_type.to_string(),
            category: options.category,
            tags: options.tags,
            enabled: options.enabled,
            description: instance.description().to_string(),
            parameters: instance
                .parameters()
                .into_iter()
                .map(|p| ParameterSummary {
                    name: p.name,
                    kind: p.kind,
                    description: p.description,
                    required: p.required,
                })
                .collect(),
            extra: options.extra,
        };

        info!(
            tool = %name,
            tool_type,
            category = ?metadata.category,
            enabled = metadata.enabled,
            "Registered tool"
        );

        self.factories.insert(name.clone(), Arc::new(factory));
        self.metadata.insert(name.clone(), metadata);
        Ok(name)
    }

    /// Build a fresh instance of a registered, enabled tool.
    pub fn create(&self, name: &str) -> Result<Box<dyn Tool>, RegistryError> {
        let factory = self.factories.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.factories.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;

        if self.metadata.get(name).is_some_and(|m| !m.enabled) {
            return Err(RegistryError::Disabled(name.to_string()));
        }

        let instance = factory().map_err(|e| {
            error!(tool = name, error = %e, "Failed to create tool");
            RegistryError::CreationFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        check_definition(instance.as_ref())?;

        debug!(tool = name, "Created tool instance");
        Ok(instance)
    }

    /// Function-calling schemas for the named tools, or every enabled tool.
    /// Tools that cannot be instantiated are skipped and logged.
    pub fn get_schemas(&self, names: Option<&[String]>) -> Vec<Value> {
        let names = match names {
            Some(names) => names.to_vec(),
            None => self.list(true),
        };

        names
            .iter()
            .filter_map(|name| match self.create(name) {
                Ok(tool) => Some(tool.to_openai_schema()),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Failed to get schema for tool");
                    None
                }
            })
            .collect()
    }

    /// Definitions of every enabled tool that can be instantiated.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list(true)
            .iter()
            .filter_map(|name| self.create(name).ok().map(|t| t.definition()))
            .collect()
    }

    pub fn metadata(&self, name: &str) -> Option<&ToolMetadata> {
        self.metadata.get(name)
    }

    pub fn all_metadata(&self) -> &IndexMap<String, ToolMetadata> {
        &self.metadata
    }

    /// Registered tool names in registration order.
    pub fn list(&self, enabled_only: bool) -> Vec<String> {
        self.filtered(enabled_only, |_| true)
    }

    pub fn by_category(&self, category: &str, enabled_only: bool) -> Vec<String> {
        self.filtered(enabled_only, |m| m.category.as_deref() == Some(category))
    }

    pub fn by_tag(&self, tag: &str, enabled_only: bool) -> Vec<String> {
        self.filtered(enabled_only, |m| m.tags.contains(tag))
    }

    fn filtered(&self, enabled_only: bool, pred: impl Fn(&ToolMetadata) -> bool) -> Vec<String> {
        self.metadata
            .iter()
            .filter(|(_, m)| (!enabled_only || m.enabled) && pred(m))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let meta = self.metadata.get_mut(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.factories.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;
        meta.enabled = enabled;
        info!(tool = name, enabled, "Tool enablement changed");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.factories.clear();
        self.metadata.clear();
        debug!("Cleared tool registry");
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{name}' not found. Available tools: {available}")]
    NotFound { name: String, available: String },
    #[error("Tool '{0}' is disabled")]
    Disabled(String),
    #[error("Failed to create tool '{name}': {reason}")]
    CreationFailed { name: String, reason: String },
    #[error("Invalid tool definition: {0}")]
    Definition(#[from] DefinitionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ToolParameter;
    use crate::tool::{EchoTool, ToolArgs, ToolContext, ToolOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ShoutTool;

    #[async_trait]
    impl Tool for ShoutTool {
        fn name(&self) -> &str {
            "shout"
        }
        fn description(&self) -> &str {
            "Upper-cases text"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![ToolParameter::new("text", ParameterKind::String, "text").required()]
        }
        async fn execute(&self, args: ToolArgs, _: &ToolContext) -> Result<ToolOutput, ToolError> {
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(Value::String(text.to_uppercase()).into())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register::<EchoTool>(Registration::new().category("test").tags(["debug", "io"]))
            .unwrap();
        registry
            .register::<ShoutTool>(Registration::new().category("text").tags(["io"]).enabled(false))
            .unwrap();
        registry
    }

    #[test]
    fn test_register_and_create() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("echo"));
        assert_eq!(registry.create("echo").unwrap().name(), "echo");

        let meta = registry.metadata("echo").unwrap();
        assert_eq!(meta.category.as_deref(), Some("test"));
        assert_eq!(meta.parameters.len(), 1);
        assert!(meta.parameters[0].required);
        assert!(meta.tool_type.ends_with("EchoTool"));
    }

    #[test]
    fn test_create_not_found_and_disabled() {
        let registry = registry();
        let err = registry.create("nonexistent").err().unwrap();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert!(err.to_string().contains("echo, shout"));

        let err = registry.create("shout").err().unwrap();
        assert!(matches!(err, RegistryError::Disabled(ref n) if n == "shout"));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = registry();
        registry
            .register::<EchoTool>(Registration::new().category("replaced"))
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.metadata("echo").unwrap().category.as_deref(),
            Some("replaced")
        );
    }

    #[test]
    fn test_fresh_instance_per_create() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut registry = ToolRegistry::new();
        registry
            .register_with(
                "EchoTool",
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Box::new(EchoTool) as Box<dyn Tool>)
                },
                Registration::new(),
            )
            .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);

        registry.create("echo").unwrap();
        registry.create("echo").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failing_factory_is_fatal_at_registration() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register_with(
                "Broken",
                || Err(ToolError::ExecutionFailed("no config".into())),
                Registration::new(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::CreationFailed { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_queries() {
        let registry = registry();
        assert_eq!(registry.list(true), vec!["echo"]);
        assert_eq!(registry.list(false), vec!["echo", "shout"]);
        assert_eq!(registry.by_category("text", true), Vec::<String>::new());
        assert_eq!(registry.by_category("text", false), vec!["shout"]);
        assert_eq!(registry.by_tag("io", false), vec!["echo", "shout"]);
        assert_eq!(registry.by_tag("debug", true), vec!["echo"]);
    }

    #[test]
    fn test_schemas_skip_failures() {
        let mut registry = registry();
        let all = registry.get_schemas(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["function"]["name"], "echo");

        let names = vec!["echo".to_string(), "missing".to_string(), "shout".to_string()];
        assert_eq!(registry.get_schemas(Some(&names)).len(), 1);

        registry.set_enabled("shout", true).unwrap();
        assert_eq!(registry.get_schemas(Some(&names)).len(), 2);
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut registry = registry();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.all_metadata().is_empty());
    }
}
