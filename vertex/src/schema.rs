//! Function declarations and their parameter schemas.
//!
//! Schemas use the OpenAPI subset understood by Gemini function calling:
//! uppercase type names, `properties`, `required`, `items` and `enum`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data types a schema node can describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    #[default]
    Object,
}

impl SchemaType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// A parameter schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Element schema for arrays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl Schema {
    fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            ..Default::default()
        }
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaType::Array)
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required property.
    pub fn with_required(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Add an optional property.
    pub fn with_optional(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Restrict values to a fixed set.
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Bound numeric values.
    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// Check `value` against this schema.
    ///
    /// Properties not declared in the schema are accepted.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), String> {
        if !self.schema_type.accepts(value) {
            return Err(format!(
                "{path}: expected {:?}, got {value}",
                self.schema_type
            ));
        }

        if let Some(num) = value.as_f64() {
            if let Some(min) = self.minimum.filter(|min| num < *min) {
                return Err(format!("{path}: value {num} is less than minimum {min}"));
            }
            if let Some(max) = self.maximum.filter(|max| num > *max) {
                return Err(format!("{path}: value {num} is greater than maximum {max}"));
            }
        }

        if !self.enum_values.is_empty() {
            let allowed = value
                .as_str()
                .is_some_and(|s| self.enum_values.iter().any(|v| v == s));
            if !allowed {
                return Err(format!("{path}: value not in allowed enum"));
            }
        }

        if let Some(obj) = value.as_object() {
            for name in &self.required {
                if !obj.contains_key(name) {
                    return Err(format!("{path}: missing required property {name}"));
                }
            }
            for (name, schema) in &self.properties {
                if let Some(child) = obj.get(name) {
                    schema.validate_at(child, &format!("{path}.{name}"))?;
                }
            }
        }

        if let (Some(items), Some(elements)) = (&self.items, value.as_array()) {
            for (i, element) in elements.iter().enumerate() {
                items.validate_at(element, &format!("{path}[{i}]"))?;
            }
        }

        Ok(())
    }
}

/// A function the model may ask the caller to invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Schema>,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Set the parameter schema.
    pub fn with_parameters(mut self, parameters: Schema) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Validate call arguments against the parameter schema.
    pub fn validate_args(&self, args: &Map<String, Value>) -> Result<(), String> {
        match &self.parameters {
            Some(schema) => schema.validate(&Value::Object(args.clone())),
            None if args.is_empty() => Ok(()),
            None => Err("function takes no arguments".to_string()),
        }
    }
}

/// A group of function declarations offered to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

impl Tool {
    pub fn new(function_declarations: Vec<FunctionDeclaration>) -> Self {
        Self {
            function_declarations,
        }
    }
}

/// A function invocation suggested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The result of a function invocation, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,

    pub response: Map<String, Value>,
}

impl FunctionResponse {
    /// Wrap a handler result. Non-object values are placed under `content`.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let response = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("content".to_string(), other);
                map
            }
        };
        Self {
            name: name.into(),
            response,
        }
    }
}
