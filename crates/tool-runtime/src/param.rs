//! Typed parameter descriptors: value validation and JSON Schema export.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON kinds a tool parameter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Integer => "integer",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Array => "array",
            ParameterKind::Object => "object",
        }
    }

    /// Strict kind check. JSON booleans never satisfy the numeric kinds and
    /// fractional numbers never satisfy `integer`.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterKind::String => value.is_string(),
            ParameterKind::Integer => value.is_i64() || value.is_u64(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Array => value.is_array(),
            ParameterKind::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter failed validation. The message names the offending parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Declares one named input of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Substituted for an absent value before validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Element kind for `array` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParameterKind>,
    /// Nested fields for `object` parameters, in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, ToolParameter>>,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
            items: None,
            properties: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_items(mut self, kind: ParameterKind) -> Self {
        self.items = Some(kind);
        self
    }

    pub fn with_property(mut self, property: ToolParameter) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(property.name.clone(), property);
        self
    }

    fn nested(&self) -> Option<&IndexMap<String, ToolParameter>> {
        self.properties.as_ref().filter(|p| !p.is_empty())
    }

    fn allowed(&self) -> Option<&Vec<Value>> {
        self.enum_values.as_ref().filter(|e| !e.is_empty())
    }

    /// Validate a value against this descriptor. `None` and JSON `null` both
    /// count as absent.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if self.required {
                    return Err(ValidationError(format!(
                        "Parameter '{}' is required",
                        self.name
                    )));
                }
                return Ok(());
            }
        };

        if !self.kind.matches(value) {
            return Err(ValidationError(format!(
                "Parameter '{}' must be of type {}",
                self.name, self.kind
            )));
        }

        if let Some(allowed) = self.allowed() {
            if !allowed.contains(value) {
                return Err(ValidationError(format!(
                    "Parameter '{}' must be one of {}",
                    self.name,
                    Value::Array(allowed.clone())
                )));
            }
        }

        if let (Some(item_kind), Value::Array(items)) = (self.items, value) {
            if let Some(index) = items.iter().position(|item| !item_kind.matches(item)) {
                return Err(ValidationError(format!(
                    "Array item {} in '{}' must be of type {}",
                    index, self.name, item_kind
                )));
            }
        }

        if let (Some(properties), Value::Object(fields)) = (self.nested(), value) {
            for (prop_name, prop) in properties {
                prop.validate(fields.get(prop_name))
                    .map_err(|e| ValidationError(format!("In '{}': {}", self.name, e)))?;
            }
        }

        Ok(())
    }

    /// JSON Schema fragment for this parameter.
    pub fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(self.kind.as_str().into()));
        schema.insert("description".into(), Value::String(self.description.clone()));

        if let Some(allowed) = self.allowed() {
            schema.insert("enum".into(), Value::Array(allowed.clone()));
        }

        if self.kind == ParameterKind::Array {
            if let Some(item_kind) = self.items {
                schema.insert("items".into(), serde_json::json!({ "type": item_kind.as_str() }));
            }
        }

        if self.kind == ParameterKind::Object {
            if let Some(properties) = self.nested() {
                let (props, required) = object_schema_parts(properties.values());
                schema.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    schema.insert("required".into(), Value::Array(required));
                }
            }
        }

        Value::Object(schema)
    }
}

fn object_schema_parts<'a>(
    params: impl Iterator<Item = &'a ToolParameter>,
) -> (Map<String, Value>, Vec<Value>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in params {
        properties.insert(param.name.clone(), param.to_schema());
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }
    (properties, required)
}

/// `{"type": "object", "properties": ..., "required": [...]}` for a whole
/// parameter list. `required` is omitted when nothing is required.
pub fn input_schema(params: &[ToolParameter]) -> Value {
    let (properties, required) = object_schema_parts(params.iter());
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    Value::Object(schema)
}

/// Validate a call's arguments against the declared parameters.
///
/// Unknown names are rejected, declared defaults are filled in for absent
/// values, then every parameter is checked in declaration order.
pub fn validate_arguments(
    params: &[ToolParameter],
    args: &mut Map<String, Value>,
) -> Result<(), ValidationError> {
    let mut unknown: Vec<&str> = args
        .keys()
        .filter(|k| !params.iter().any(|p| &p.name == *k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(ValidationError(format!(
            "Unknown parameters: {}",
            unknown.join(", ")
        )));
    }

    for param in params {
        let absent = args.get(&param.name).map_or(true, Value::is_null);
        if absent {
            if let Some(default) = &param.default {
                args.insert(param.name.clone(), default.clone());
            }
        }
        param.validate(args.get(&param.name))?;
    }

    Ok(())
}
