//! Conversions between MCP's schema/value model and the model's tool model.
//!
//! Three directions are covered:
//!
//! - **schema**: an MCP input schema becomes a [`ParameterSchema`],
//! - **arguments**: model-generated JSON arguments become typed [`McpValue`]s,
//! - **results**: MCP content items become a single text blob.

use rmcp::model::{RawContent, ResourceContents};
use serde_json::{Map, Value, json};

/// Name given to every parameter in [`SchemaNaming::Placeholder`] mode.
pub const PLACEHOLDER_PARAMETER: &str = "value";

/// Primitive parameter types understood by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl ParameterKind {
    /// Infer a kind from the tag of a schema value.
    ///
    /// Null and compound values (arrays, objects) are treated as strings.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::Bool(_) => Self::Boolean,
            Value::String(_) | Value::Null | Value::Array(_) | Value::Object(_) => Self::String,
        }
    }

    /// Map a JSON-schema `"type"` keyword.
    pub fn from_type_keyword(keyword: &str) -> Self {
        match keyword {
            "integer" => Self::Integer,
            "number" => Self::Float,
            "boolean" => Self::Boolean,
            _ => Self::String,
        }
    }

    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// How parameter names are derived from an input schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaNaming {
    /// Every parameter is named [`PLACEHOLDER_PARAMETER`]; the real field
    /// names are not recovered.
    #[default]
    Placeholder,
    /// Use the names under the schema's `properties` map when there is one.
    Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
}

/// Ordered parameter list presented to the model for one tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    parameters: Vec<Parameter>,
    required: Vec<String>,
}

impl ParameterSchema {
    /// Convert an MCP input schema.
    ///
    /// The schema is either a single value or an array of values, each
    /// producing one parameter. Nested schemas are not decomposed.
    pub fn from_input_schema(schema: Option<&Value>, naming: SchemaNaming) -> Self {
        let Some(schema) = schema else {
            return Self::default();
        };

        if naming == SchemaNaming::Properties {
            if let Some(converted) = Self::from_properties(schema) {
                return converted;
            }
        }

        let values = schema.as_array().map_or_else(|| vec![schema], |items| items.iter().collect());
        let parameters: Vec<Parameter> = values.into_iter().map(placeholder_parameter).collect();
        let required = parameters.iter().map(|p| p.name.clone()).collect();
        Self { parameters, required }
    }

    fn from_properties(schema: &Value) -> Option<Self> {
        let properties = schema.get("properties")?.as_object()?;

        let parameters: Vec<Parameter> = properties
            .iter()
            .map(|(name, property)| Parameter {
                name: name.clone(),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .map_or_else(|| property.to_string(), ToString::to_string),
                kind: property
                    .get("type")
                    .and_then(Value::as_str)
                    .map_or(ParameterKind::String, ParameterKind::from_type_keyword),
            })
            .collect();

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|name| properties.contains_key(*name))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self { parameters, required })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Render as a JSON-schema object for a function-calling API.
    ///
    /// Parameters sharing a name collapse into the first one declared.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.parameters {
            if properties.contains_key(&p.name) {
                continue;
            }
            properties.insert(
                p.name.clone(),
                json!({ "type": p.kind.json_type(), "description": p.description }),
            );
        }

        let mut required: Vec<&str> = Vec::new();
        for name in &self.required {
            if !required.contains(&name.as_str()) {
                required.push(name);
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn placeholder_parameter(value: &Value) -> Parameter {
    let kind = ParameterKind::of_value(value);
    if matches!(value, Value::Array(_) | Value::Object(_)) {
        tracing::debug!(schema = %value, "Compound MCP schema value treated as string");
    }
    Parameter {
        name: PLACEHOLDER_PARAMETER.to_string(),
        description: value.to_string(),
        kind,
    }
}

/// A typed MCP argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum McpValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl McpValue {
    /// Classify one model-generated value.
    ///
    /// Extraction is attempted as string, integer, floating-point, then
    /// boolean; the first success wins. Anything else is rendered as a
    /// JSON string.
    pub fn from_generated(value: &Value) -> Self {
        if let Some(s) = value.as_str() {
            Self::String(s.to_string())
        } else if let Some(i) = value.as_i64() {
            Self::Int(i)
        } else if let Some(d) = value.as_f64() {
            Self::Double(d)
        } else if let Some(b) = value.as_bool() {
            Self::Bool(b)
        } else {
            Self::String(value.to_string())
        }
    }
}

impl From<McpValue> for Value {
    fn from(value: McpValue) -> Self {
        match value {
            McpValue::String(s) => Value::String(s),
            McpValue::Int(i) => Value::from(i),
            McpValue::Double(d) => Value::from(d),
            McpValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// Convert a model-generated argument object into MCP call arguments.
pub fn convert_arguments(arguments: &Map<String, Value>) -> Map<String, Value> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), McpValue::from_generated(value).into()))
        .collect()
}

/// One item of a tool result, reduced to what the text rendering needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolContent {
    Text(String),
    Image {
        mime_type: String,
    },
    Audio {
        mime_type: String,
    },
    Resource {
        uri: String,
        mime_type: Option<String>,
        text: Option<String>,
    },
}

impl ToolContent {
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image { mime_type } => format!("[Image: {mime_type}]"),
            Self::Audio { mime_type } => format!("[Audio: {mime_type}]"),
            Self::Resource {
                text: Some(text), ..
            } => text.clone(),
            Self::Resource {
                uri,
                mime_type,
                text: None,
            } => format!(
                "[Resource: {uri} ({})]",
                mime_type.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

impl From<&RawContent> for ToolContent {
    fn from(raw: &RawContent) -> Self {
        match raw {
            RawContent::Text(text) => Self::Text(text.text.clone()),
            RawContent::Image(image) => Self::Image {
                mime_type: image.mime_type.clone(),
            },
            RawContent::Audio(audio) => Self::Audio {
                mime_type: audio.mime_type.clone(),
            },
            RawContent::Resource(embedded) => match &embedded.resource {
                ResourceContents::TextResourceContents {
                    uri,
                    mime_type,
                    text,
                    ..
                } => Self::Resource {
                    uri: uri.clone(),
                    mime_type: mime_type.clone(),
                    text: Some(text.clone()),
                },
                ResourceContents::BlobResourceContents { uri, mime_type, .. } => Self::Resource {
                    uri: uri.clone(),
                    mime_type: mime_type.clone(),
                    text: None,
                },
            },
            RawContent::ResourceLink(link) => Self::Resource {
                uri: link.uri.clone(),
                mime_type: link.mime_type.clone(),
                text: None,
            },
        }
    }
}

/// Concatenate rendered items in order, with no separator.
pub fn render_contents<'a>(contents: impl IntoIterator<Item = &'a ToolContent>) -> String {
    contents.into_iter().map(ToolContent::render).collect()
}
