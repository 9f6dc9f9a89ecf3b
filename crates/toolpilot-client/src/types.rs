//! MCP data model used by the client
//!
//! Only the slice of the protocol the client speaks is modelled here: the
//! initialize handshake, tool discovery, tool calls and log notifications.
//! Field names follow the wire format (camelCase).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol revision sent in the `initialize` request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name and version of a client or server implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision chosen by the server
    pub protocol_version: String,
    /// Capabilities advertised by the server
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    /// Server identity
    pub server_info: Implementation,
    /// Optional usage hints from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// Whether the server advertised the named capability
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.contains_key(capability)
    }
}

/// A tool exposed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (machine-readable identifier)
    pub name: String,
    /// Tool description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    #[serde(rename = "inputSchema", default)]
    pub input_schema: ToolInputSchema,
}

impl Tool {
    /// Create a tool with an empty object schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: ToolInputSchema::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema
    pub fn with_schema(mut self, schema: ToolInputSchema) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Tool input schema (always an object schema for MCP tools)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    /// Property definitions, in declaration order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required property names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: None,
            required: None,
        }
    }
}

impl ToolInputSchema {
    /// Add a property with the given JSON schema `type`
    pub fn with_property(mut self, name: impl Into<String>, kind: &str, required: bool) -> Self {
        let name = name.into();
        self.properties
            .get_or_insert_with(Map::new)
            .insert(name.clone(), serde_json::json!({ "type": kind }));
        if required {
            self.required.get_or_insert_with(Vec::new).push(name);
        }
        self
    }

    /// Whether `name` is listed as required
    pub fn is_required(&self, name: &str) -> bool {
        self.required
            .as_ref()
            .is_some_and(|required| required.iter().any(|r| r == name))
    }
}

/// Result of `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools on this page
    pub tools: Vec<Tool>,
    /// Cursor for the next page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content blocks returned by the tool
    #[serde(default)]
    pub content: Vec<Content>,
    /// Whether the tool reported a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured output, when the tool declares an output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Build a result holding a single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            ..Default::default()
        }
    }

    /// Whether the tool flagged this result as an error
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// A content block in a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Plain text
    #[serde(rename = "text")]
    Text {
        /// The text
        text: String,
    },
    /// Base64 encoded image
    #[serde(rename = "image")]
    Image {
        /// Base64 payload
        data: String,
        /// MIME type of the image
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64 encoded audio
    #[serde(rename = "audio")]
    Audio {
        /// Base64 payload
        data: String,
        /// MIME type of the audio
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded resource contents
    #[serde(rename = "resource")]
    Resource {
        /// The resource body as sent by the server
        resource: Value,
    },
    /// Link to a resource without embedding it
    #[serde(rename = "resource_link")]
    ResourceLink {
        /// Resource URI
        uri: String,
        /// Display name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A block type this client does not know
    #[serde(other)]
    Unknown,
}

/// Log severity levels (RFC 5424)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug-level messages
    Debug,
    /// Informational messages
    Info,
    /// Normal but significant conditions
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        };
        f.write_str(name)
    }
}

/// Payload of a `notifications/message` notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessage {
    /// Severity
    pub level: LogLevel,
    /// Name of the logger that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Arbitrary message payload
    pub data: Value,
}

impl LoggingMessage {
    /// Render `data` as a single line; strings are shown without quotes
    pub fn text(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_tool_schema_keeps_property_order() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "search",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "zeta": {"type": "string"},
                    "alpha": {"type": "number"},
                    "mid": {"type": "boolean"}
                },
                "required": ["alpha"]
            }
        }))
        .unwrap();

        let names: Vec<_> = tool
            .input_schema
            .properties
            .as_ref()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(tool.input_schema.is_required("alpha"));
        assert!(!tool.input_schema.is_required("zeta"));
    }

    #[test]
    fn test_tool_without_schema_defaults_to_object() {
        let tool: Tool = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(tool.input_schema.schema_type, "object");
        assert!(tool.input_schema.properties.is_none());
    }

    #[test]
    fn test_call_result_content_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "hologram", "beam": 3}
            ],
            "isError": true
        }))
        .unwrap();

        assert!(result.is_error());
        assert_eq!(
            result.content[0],
            Content::Text {
                text: "hello".to_string()
            }
        );
        assert_eq!(result.content[2], Content::Unknown);
    }

    #[test]
    fn test_logging_message_text() {
        let msg: LoggingMessage = serde_json::from_value(json!({
            "level": "warning",
            "logger": "db",
            "data": "disk almost full"
        }))
        .unwrap();
        assert_eq!(msg.level, LogLevel::Warning);
        assert_eq!(msg.text(), "disk almost full");

        let structured = LoggingMessage {
            level: LogLevel::Info,
            logger: None,
            data: json!({"rows": 3}),
        };
        assert_eq!(structured.text(), r#"{"rows":3}"#);
    }

    #[test]
    fn test_capability_lookup() {
        let init: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}, "logging": {}},
            "serverInfo": {"name": "demo", "version": "1.0.0"}
        }))
        .unwrap();
        assert!(init.supports("logging"));
        assert!(!init.supports("prompts"));
    }
}
