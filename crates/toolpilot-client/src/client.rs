//! High-level MCP client
//!
//! [`McpClient`] owns one server session at a time: it launches the server,
//! performs the initialize handshake, snapshots the tool list and forwards
//! tool calls. [`ToolClient`] is the narrow contract interactive front-ends
//! drive, so they can be exercised against test doubles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::child_process::{ChildProcess, ChildProcessConfig, ServerCommand};
use crate::error::{ClientError, ClientResult};
use crate::logging::{SharedLogSink, TracingLogSink};
use crate::protocol::ProtocolClient;
use crate::types::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, LogLevel,
    PROTOCOL_VERSION, Tool,
};

/// The operations an interactive session needs from a protocol client
#[async_trait]
pub trait ToolClient: Send {
    /// Establish a session with the server described by `target`
    async fn connect(&mut self, target: &str) -> ClientResult<()>;

    /// The tool snapshot taken when the session was established
    async fn list_tools(&mut self) -> ClientResult<Vec<Tool>>;

    /// Invoke a tool by name
    async fn execute_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ClientResult<CallToolResult>;

    /// Release the session; must be safe without a prior successful connect
    async fn cleanup(&mut self) -> ClientResult<()>;

    /// Identity the server reported, when known
    fn server_info(&self) -> Option<&Implementation> {
        None
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for each request, including the handshake
    pub request_timeout: Duration,
    /// Upper bound for `tools/call`; `None` waits as long as the tool runs
    pub tool_timeout: Option<Duration>,
    /// How long the server gets to exit after the kill signal
    pub shutdown_timeout: Duration,
    /// Name reported in `clientInfo`
    pub client_name: String,
    /// Version reported in `clientInfo`
    pub client_version: String,
    /// Extra environment variables for the server process
    pub environment: HashMap<String, String>,
    /// Minimum level the server should log at, if logging is supported
    pub server_log_level: Option<LogLevel>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            tool_timeout: None,
            shutdown_timeout: Duration::from_secs(5),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: HashMap::new(),
            server_log_level: None,
        }
    }
}

struct ActiveSession {
    process: Option<ChildProcess>,
    protocol: ProtocolClient,
    init: InitializeResult,
    tools: Vec<Tool>,
}

impl ActiveSession {
    async fn close(mut self) -> ClientResult<()> {
        self.protocol.shutdown();
        if let Some(mut process) = self.process.take() {
            process.stop().await?;
        }
        Ok(())
    }
}

/// MCP client over a stdio child process
pub struct McpClient {
    config: ClientConfig,
    log_sink: SharedLogSink,
    session: Option<ActiveSession>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("config", &self.config)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new(ClientConfig::default(), Arc::new(TracingLogSink))
    }
}

impl McpClient {
    /// Create a disconnected client; server log notifications go to `log_sink`
    pub fn new(config: ClientConfig, log_sink: SharedLogSink) -> Self {
        Self {
            config,
            log_sink,
            session: None,
        }
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a session is established
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Launch the server described by `target` and initialize a session
    ///
    /// On failure everything started so far is torn down before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyConnected`] when a session exists,
    /// [`ClientError::InvalidCommand`] for an empty target, and any spawn or
    /// handshake failure.
    pub async fn connect(&mut self, target: &str) -> ClientResult<()> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let command = ServerCommand::parse(target)?;
        let mut process_config = ChildProcessConfig::new(command);
        process_config.shutdown_timeout = self.config.shutdown_timeout;
        process_config.environment = self
            .config
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let (process, stdin, stdout) = ChildProcess::spawn(process_config)?;
        let protocol = ProtocolClient::new(
            stdout,
            stdin,
            self.log_sink.clone(),
            self.config.request_timeout,
        );
        self.connect_with(protocol, Some(process)).await
    }

    /// Initialize a session over an already established protocol client
    ///
    /// This is how [`connect`](Self::connect) finishes; it is public so
    /// callers with their own streams can reuse the handshake.
    ///
    /// # Errors
    ///
    /// Returns any handshake or tool discovery failure.
    pub async fn connect_with(
        &mut self,
        protocol: ProtocolClient,
        process: Option<ChildProcess>,
    ) -> ClientResult<()> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let mut session = ActiveSession {
            process,
            protocol,
            init: InitializeResult {
                protocol_version: String::new(),
                capabilities: Map::new(),
                server_info: Implementation {
                    name: String::new(),
                    version: String::new(),
                },
                instructions: None,
            },
            tools: Vec::new(),
        };

        match self.handshake(&mut session).await {
            Ok(()) => {
                info!(
                    "Connected to {} {} ({} tools)",
                    session.init.server_info.name,
                    session.init.server_info.version,
                    session.tools.len()
                );
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!("Handshake failed: {}", e);
                if let Err(close_err) = session.close().await {
                    warn!("Failed to tear down after handshake failure: {}", close_err);
                }
                Err(match e {
                    ClientError::ConnectionLost(msg) => ClientError::ConnectionFailed(msg),
                    other => other,
                })
            }
        }
    }

    async fn handshake(&self, session: &mut ActiveSession) -> ClientResult<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": self.config.client_name,
                "version": self.config.client_version,
            }
        });
        let init: InitializeResult = session.protocol.request("initialize", Some(params)).await?;
        if init.protocol_version != PROTOCOL_VERSION {
            debug!(
                "Server negotiated protocol version {} (requested {})",
                init.protocol_version, PROTOCOL_VERSION
            );
        }
        session
            .protocol
            .notify("notifications/initialized", None)
            .await?;

        if let Some(level) = self.config.server_log_level {
            if init.supports("logging") {
                let _: Value = session
                    .protocol
                    .request("logging/setLevel", Some(json!({ "level": level })))
                    .await?;
            } else {
                debug!("Server does not support logging/setLevel, ignoring {}", level);
            }
        }

        session.init = init;
        session.tools = fetch_tools(&session.protocol).await?;
        Ok(())
    }

    /// Server identity, once connected
    pub fn server_info(&self) -> Option<&Implementation> {
        self.session.as_ref().map(|s| &s.init.server_info)
    }

    /// Server usage hints from the handshake, if any
    pub fn instructions(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|s| s.init.instructions.as_deref())
    }

    /// The tool snapshot taken at connect time
    pub fn tools(&self) -> &[Tool] {
        self.session.as_ref().map_or(&[], |s| s.tools.as_slice())
    }

    /// Call a tool on the server
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ClientResult<CallToolResult> {
        let session = self.session.as_ref().ok_or(ClientError::NotConnected)?;
        debug!("Calling tool '{}' with {} arguments", name, arguments.len());
        let params = json!({ "name": name, "arguments": arguments });
        session
            .protocol
            .request_with_timeout("tools/call", Some(params), self.config.tool_timeout)
            .await
    }

    /// Tear down the session; a no-op when not connected
    ///
    /// # Errors
    ///
    /// Returns an error if stopping the server process fails.
    pub async fn cleanup(&mut self) -> ClientResult<()> {
        match self.session.take() {
            Some(session) => {
                info!("Closing session");
                session.close().await
            }
            None => {
                debug!("Cleanup requested without an active session");
                Ok(())
            }
        }
    }
}

/// Fetch every page of `tools/list`
async fn fetch_tools(protocol: &ProtocolClient) -> ClientResult<Vec<Tool>> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let page: ListToolsResult = protocol.request("tools/list", params).await?;
        tools.extend(page.tools);
        match page.next_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            Some(_) => {
                return Err(ClientError::Protocol(
                    "Server repeated the same tools/list cursor".to_string(),
                ));
            }
            None => return Ok(tools),
        }
    }
}

#[async_trait]
impl ToolClient for McpClient {
    async fn connect(&mut self, target: &str) -> ClientResult<()> {
        McpClient::connect(self, target).await
    }

    async fn list_tools(&mut self) -> ClientResult<Vec<Tool>> {
        if self.session.is_none() {
            return Err(ClientError::NotConnected);
        }
        Ok(self.tools().to_vec())
    }

    async fn execute_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ClientResult<CallToolResult> {
        self.call_tool(name, arguments).await
    }

    async fn cleanup(&mut self) -> ClientResult<()> {
        McpClient::cleanup(self).await
    }

    fn server_info(&self) -> Option<&Implementation> {
        McpClient::server_info(self)
    }
}
