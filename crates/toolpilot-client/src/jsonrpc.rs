//! JSON-RPC 2.0 envelopes
//!
//! MCP frames every message as a single JSON-RPC object. The client sends
//! requests and notifications and has to sort whatever arrives into
//! responses, server-initiated requests and notifications.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::{ClientError, ClientResult};

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Method not found
pub const METHOD_NOT_FOUND: i32 = -32601;

/// JSON-RPC version marker, always serialized as `"2.0"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id (what this client sends)
    Number(i64),
    /// String id (some servers use these for their own requests)
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id as i64)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// JSON-RPC request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC notification message (no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Error for a method this client does not implement
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }
}

/// JSON-RPC response message
///
/// Exactly one of `result` and `error` is expected; a response carrying
/// neither is treated as an empty result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Successful result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier (null for parse errors)
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Successful response
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Error response
    pub fn error_response(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            result: None,
            error: Some(error),
            id: Some(id),
        }
    }

    /// Convert into the result value, mapping a JSON-RPC error to [`ClientError::Server`]
    pub fn into_result(self) -> ClientResult<Value> {
        match (self.error, self.result) {
            (Some(error), _) => Err(ClientError::Server {
                code: error.code,
                message: error.message,
            }),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Object(serde_json::Map::new())),
        }
    }
}

/// A message received from the server
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Answer to one of our requests
    Response(JsonRpcResponse),
    /// Server-initiated request that needs an answer
    Request(JsonRpcRequest),
    /// Fire-and-forget notification
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Classify one line of input
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] for invalid JSON and
    /// [`ClientError::Protocol`] for JSON that is not a JSON-RPC message.
    pub fn parse(line: &str) -> ClientResult<Self> {
        let value: Value = serde_json::from_str(line)?;
        let Some(object) = value.as_object() else {
            return Err(ClientError::Protocol(
                "Expected a JSON-RPC object (batches are not supported)".to_string(),
            ));
        };

        let has_method = object.contains_key("method");
        let has_id = object.get("id").is_some_and(|id| !id.is_null());

        let message = match (has_method, has_id) {
            (true, true) => Self::Request(serde_json::from_value(value)?),
            (true, false) => Self::Notification(serde_json::from_value(value)?),
            (false, _) if object.contains_key("result") || object.contains_key("error") => {
                Self::Response(serde_json::from_value(value)?)
            }
            _ => {
                return Err(ClientError::Protocol(format!(
                    "Unrecognized JSON-RPC message: {line}"
                )));
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new("tools/list", None, RequestId::from(7));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "tools/list", "id": 7})
        );
    }

    #[test]
    fn test_parse_response() {
        let msg = IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#)
            .unwrap();
        match msg {
            IncomingMessage::Response(resp) => {
                assert_eq!(resp.id, Some(RequestId::Number(3)));
                assert_eq!(resp.into_result().unwrap(), json!({"ok": true}));
            }
            other => panic!("Expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let line = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad params"}}"#;
        let IncomingMessage::Response(resp) = IncomingMessage::parse(line).unwrap() else {
            panic!("Expected response");
        };
        match resp.into_result() {
            Err(ClientError::Server { code, message }) => {
                assert_eq!(code, -32602);
                assert_eq!(message, "bad params");
            }
            other => panic!("Expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_notification_and_request() {
        let notif = IncomingMessage::parse(
            r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(notif, IncomingMessage::Notification(n) if n.method == "notifications/message"));

        let request =
            IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#).unwrap();
        assert!(
            matches!(request, IncomingMessage::Request(r) if r.id == RequestId::String("srv-1".into()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            IncomingMessage::parse("not json"),
            Err(ClientError::Serialization(_))
        ));
        assert!(matches!(
            IncomingMessage::parse("[1,2]"),
            Err(ClientError::Protocol(_))
        ));
        assert!(matches!(
            IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(ClientError::Protocol(_))
        ));
        assert!(IncomingMessage::parse(r#"{"jsonrpc":"1.0","id":1,"result":{}}"#).is_err());
    }
}
