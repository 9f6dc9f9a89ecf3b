//! End-to-end tests for `McpClient` against an in-process fake server
//!
//! The fake server speaks newline-delimited JSON-RPC over `tokio::io::duplex`
//! streams, so these tests exercise the real framing, routing and handshake
//! code without spawning processes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use toolpilot_client::{
    ClientConfig, ClientError, Content, LogLevel, LoggingMessage, McpClient, ProtocolClient,
    SharedLogSink, ToolClient,
};

/// How the fake server behaves
#[derive(Clone, Default)]
struct FakeServer {
    fail_initialize: bool,
    with_logging: bool,
    /// Pause before answering `tools/call`
    call_delay: Duration,
}

impl FakeServer {
    fn answer(&self, request: &Value) -> Option<Value> {
        let id = request.get("id")?.clone();
        let method = request["method"].as_str().unwrap_or_default();
        let result = match method {
            "initialize" if self.fail_initialize => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32603, "message": "boom"}
                }));
            }
            "initialize" => {
                let mut capabilities = json!({"tools": {}});
                if self.with_logging {
                    capabilities["logging"] = json!({});
                }
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": capabilities,
                    "serverInfo": {"name": "fake", "version": "0.0.1"},
                    "instructions": "be nice"
                })
            }
            "logging/setLevel" => json!({}),
            "tools/list" => match request["params"]["cursor"].as_str() {
                None => json!({
                    "tools": [{
                        "name": "echo",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"text": {"type": "string"}},
                            "required": ["text"]
                        }
                    }],
                    "nextCursor": "page-2"
                }),
                Some("page-2") => json!({
                    "tools": [{"name": "add", "inputSchema": {"type": "object"}}]
                }),
                Some(other) => panic!("unexpected cursor {other}"),
            },
            "tools/call" => {
                let arguments = request["params"]["arguments"].to_string();
                json!({"content": [{"type": "text", "text": arguments}]})
            }
            other => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": format!("no {other}")}
                }));
            }
        };
        Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }

    /// Run against the given streams; returns every method received
    fn spawn(self, input: DuplexStream, mut output: DuplexStream) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut methods = Vec::new();
            let mut lines = BufReader::new(input).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let method = request["method"].as_str().unwrap_or_default().to_string();
                methods.push(method.clone());

                if method == "tools/call" {
                    let log = json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/message",
                        "params": {"level": "info", "logger": "fake", "data": "calling"}
                    });
                    output
                        .write_all(format!("{log}\n").as_bytes())
                        .await
                        .unwrap();
                }

                if method == "tools/call" && !self.call_delay.is_zero() {
                    tokio::time::sleep(self.call_delay).await;
                }

                if let Some(reply) = self.answer(&request) {
                    if output
                        .write_all(format!("{reply}\n").as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            methods
        })
    }
}

fn connect_pair(
    server: FakeServer,
    log_sink: SharedLogSink,
) -> (ProtocolClient, JoinHandle<Vec<String>>) {
    connect_pair_with_timeout(server, log_sink, Duration::from_secs(5))
}

fn connect_pair_with_timeout(
    server: FakeServer,
    log_sink: SharedLogSink,
    request_timeout: Duration,
) -> (ProtocolClient, JoinHandle<Vec<String>>) {
    let (client_write, server_read) = tokio::io::duplex(8192);
    let (server_write, client_read) = tokio::io::duplex(8192);
    let protocol = ProtocolClient::new(client_read, client_write, log_sink, request_timeout);
    (protocol, server.spawn(server_read, server_write))
}

fn recording_sink() -> (SharedLogSink, Arc<Mutex<Vec<LoggingMessage>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();
    let sink: SharedLogSink = Arc::new(move |msg: &LoggingMessage| {
        captured.lock().unwrap().push(msg.clone());
    });
    (sink, seen)
}

#[tokio::test]
async fn test_handshake_collects_all_tool_pages() {
    let (sink, _) = recording_sink();
    let (protocol, server) = connect_pair(FakeServer::default(), sink.clone());

    let mut client = McpClient::new(ClientConfig::default(), sink);
    client.connect_with(protocol, None).await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.server_info().unwrap().name, "fake");
    assert_eq!(client.instructions(), Some("be nice"));

    let names: Vec<_> = client.tools().iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["echo", "add"]);
    assert!(client.tools()[0].input_schema.is_required("text"));

    client.cleanup().await.unwrap();
    assert!(!client.is_connected());

    let methods = server.await.unwrap();
    assert_eq!(
        methods,
        vec![
            "initialize",
            "notifications/initialized",
            "tools/list",
            "tools/list"
        ]
    );
}

#[tokio::test]
async fn test_call_tool_and_receive_logs() {
    let (sink, seen) = recording_sink();
    let (protocol, _server) = connect_pair(FakeServer::default(), sink.clone());

    let mut client = McpClient::new(ClientConfig::default(), sink);
    client.connect_with(protocol, None).await.unwrap();

    let mut args = Map::new();
    args.insert("text".to_string(), json!("hello"));
    let result = client.execute_tool("echo", args).await.unwrap();

    assert!(!result.is_error());
    assert_eq!(
        result.content,
        vec![Content::Text {
            text: r#"{"text":"hello"}"#.to_string()
        }]
    );

    let logs = seen.lock().unwrap().clone();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Info);
    assert_eq!(logs[0].logger.as_deref(), Some("fake"));
    assert_eq!(logs[0].text(), "calling");

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_tool_call_outlasts_request_timeout_by_default() {
    let (sink, _) = recording_sink();
    let server = FakeServer {
        call_delay: Duration::from_millis(200),
        ..FakeServer::default()
    };
    let (protocol, _server) =
        connect_pair_with_timeout(server, sink.clone(), Duration::from_millis(50));

    let mut client = McpClient::new(ClientConfig::default(), sink);
    client.connect_with(protocol, None).await.unwrap();

    let mut args = Map::new();
    args.insert("text".to_string(), json!("slow"));
    let result = client.execute_tool("echo", args).await.unwrap();
    assert!(!result.is_error());

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_tool_timeout_bounds_tool_calls() {
    let (sink, _) = recording_sink();
    let server = FakeServer {
        call_delay: Duration::from_millis(500),
        ..FakeServer::default()
    };
    let (protocol, _server) = connect_pair(server, sink.clone());

    let config = ClientConfig {
        tool_timeout: Some(Duration::from_millis(50)),
        ..ClientConfig::default()
    };
    let mut client = McpClient::new(config, sink);
    client.connect_with(protocol, None).await.unwrap();

    match client.execute_tool("echo", Map::new()).await {
        Err(ClientError::Timeout { operation, .. }) => assert_eq!(operation, "tools/call"),
        other => panic!("Expected timeout, got {other:?}"),
    }

    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_server_log_level_is_applied_when_supported() {
    let (sink, _) = recording_sink();
    let server = FakeServer {
        with_logging: true,
        ..Default::default()
    };
    let (protocol, handle) = connect_pair(server, sink.clone());

    let config = ClientConfig {
        server_log_level: Some(LogLevel::Debug),
        ..Default::default()
    };
    let mut client = McpClient::new(config, sink);
    client.connect_with(protocol, None).await.unwrap();
    client.cleanup().await.unwrap();

    let methods = handle.await.unwrap();
    assert!(methods.contains(&"logging/setLevel".to_string()));
}

#[tokio::test]
async fn test_failed_initialize_leaves_client_disconnected() {
    let (sink, _) = recording_sink();
    let server = FakeServer {
        fail_initialize: true,
        ..Default::default()
    };
    let (protocol, _handle) = connect_pair(server, sink.clone());

    let mut client = McpClient::new(ClientConfig::default(), sink);
    let err = client.connect_with(protocol, None).await.unwrap_err();
    match err {
        ClientError::Server { code, message } => {
            assert_eq!(code, -32603);
            assert_eq!(message, "boom");
        }
        other => panic!("Expected server error, got {other:?}"),
    }
    assert!(!client.is_connected());
    assert!(client.tools().is_empty());

    // Cleanup after a failed connect is a harmless no-op
    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (sink, _) = recording_sink();
    let (first, _h1) = connect_pair(FakeServer::default(), sink.clone());
    let (second, _h2) = connect_pair(FakeServer::default(), sink.clone());

    let mut client = McpClient::new(ClientConfig::default(), sink);
    client.connect_with(first, None).await.unwrap();
    assert!(matches!(
        client.connect_with(second, None).await,
        Err(ClientError::AlreadyConnected)
    ));
    client.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_operations_require_a_session() {
    let mut client = McpClient::default();
    assert!(matches!(
        client.list_tools().await,
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.call_tool("echo", Map::new()).await,
        Err(ClientError::NotConnected)
    ));
    tokio_test::assert_ok!(client.cleanup().await);
    tokio_test::assert_ok!(client.cleanup().await);
}

#[tokio::test]
async fn test_connect_to_missing_program_fails() {
    let mut client = McpClient::default();
    let err = client
        .connect("toolpilot-no-such-server --flag")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ConnectionFailed(_)));
    assert!(!client.is_connected());

    let err = client.connect("   ").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidCommand(_)));
}
