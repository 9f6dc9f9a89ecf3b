//! # toolpilot-client
//!
//! MCP (Model Context Protocol) client for servers that speak JSON-RPC over
//! stdio. It launches the server as a child process, performs the initialize
//! handshake, discovers tools, calls them, and hands server log notifications
//! to a pluggable [`LogSink`].
//!
//! ## Layers
//!
//! - [`child_process`]: launching and stopping the server program
//! - [`protocol`]: newline-delimited JSON-RPC framing, request correlation, timeouts
//! - [`client`]: the MCP session ([`McpClient`]) and the [`ToolClient`] contract
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolpilot_client::{ClientConfig, McpClient, TracingLogSink};
//!
//! # async fn example() -> toolpilot_client::ClientResult<()> {
//! let mut client = McpClient::new(ClientConfig::default(), Arc::new(TracingLogSink));
//! client.connect("python3 weather_server.py").await?;
//!
//! for tool in client.tools() {
//!     println!("{}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("city".into(), "Lisbon".into());
//! let result = client.call_tool("get_forecast", args).await?;
//! println!("{result:?}");
//!
//! client.cleanup().await?;
//! # Ok(())
//! # }
//! ```

pub mod child_process;
pub mod client;
mod dispatcher;
pub mod error;
pub mod jsonrpc;
pub mod logging;
pub mod protocol;
pub mod types;

pub use child_process::{ChildProcess, ChildProcessConfig, ServerCommand};
pub use client::{ClientConfig, McpClient, ToolClient};
pub use error::{ClientError, ClientResult};
pub use logging::{LogSink, NoopLogSink, SharedLogSink, TracingLogSink};
pub use protocol::ProtocolClient;
pub use types::{
    CallToolResult, Content, Implementation, InitializeResult, LogLevel, LoggingMessage, Tool,
    ToolInputSchema,
};
