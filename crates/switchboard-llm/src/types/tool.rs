use serde::{Deserialize, Serialize};

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name within a request
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Object schema for the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    /// Create a tool with the given schema
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// JSON object schema describing tool arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    /// Always "object"
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    /// Property schemas keyed by argument name
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Required argument names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_owned()
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }
}

impl InputSchema {
    /// Add a property
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: serde_json::Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// Schema as a JSON value, the shape every vendor accepts
    pub fn to_json(&self) -> serde_json::Value {
        let mut schema = serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
        });
        if !self.required.is_empty() {
            schema["required"] = serde_json::json!(self.required);
        }
        schema
    }
}
