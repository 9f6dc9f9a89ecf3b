//! Protocol client for JSON-RPC communication
//!
//! [`ProtocolClient`] frames messages as newline-delimited JSON over any
//! async byte stream pair. For a child process that pair is the process's
//! stdout and stdin; tests use an in-memory duplex.
//!
//! ```text
//! ProtocolClient::request()
//!     ↓
//!   1. Register oneshot channel with dispatcher
//!   2. Queue the request line for the writer task
//!   3. Wait on the channel (bounded by the request timeout, if any)
//!     ↓
//! route_messages (background task)
//!     ↓
//!   Reads every line from the server and routes responses to waiters
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::SinkExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::{debug, error, trace};

use crate::dispatcher::{MessageDispatcher, route_messages};
use crate::error::{ClientError, ClientResult};
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, RequestId};
use crate::logging::SharedLogSink;

/// Largest line accepted from the server
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

const OUTBOUND_QUEUE: usize = 100;

/// JSON-RPC protocol handler
///
/// Handles request/response correlation, serialization and timeouts. It is
/// the layer between raw stdio and the high-level [`McpClient`](crate::McpClient).
#[derive(Debug)]
pub struct ProtocolClient {
    outbound: mpsc::Sender<String>,
    dispatcher: Arc<MessageDispatcher>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shut_down: AtomicBool,
    writer_task: JoinHandle<()>,
    router_task: JoinHandle<()>,
}

impl ProtocolClient {
    /// Start the writer and routing tasks over `reader`/`writer`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<R, W>(
        reader: R,
        writer: W,
        log_sink: SharedLogSink,
        request_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let dispatcher = Arc::new(MessageDispatcher::default());

        let writer_task = tokio::spawn(write_messages(writer, outbound_rx));
        let router_task = tokio::spawn(route_messages(
            reader,
            MAX_MESSAGE_SIZE,
            dispatcher.clone(),
            outbound.clone(),
            log_sink,
        ));

        Self {
            outbound,
            dispatcher,
            next_id: AtomicU64::new(1),
            request_timeout,
            shut_down: AtomicBool::new(false),
            writer_task,
            router_task,
        }
    }

    /// Send a request and deserialize its result, bounded by the request timeout
    ///
    /// # Errors
    ///
    /// - [`ClientError::Timeout`] when no response arrives in time
    /// - [`ClientError::Server`] when the server answers with an error object
    /// - [`ClientError::NotConnected`] after [`ProtocolClient::shutdown`]
    /// - [`ClientError::ConnectionLost`] when the connection closes first
    /// - [`ClientError::Serialization`] when the result has the wrong shape
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> ClientResult<T> {
        self.request_with_timeout(method, params, Some(self.request_timeout))
            .await
    }

    /// Like [`ProtocolClient::request`]; `None` waits until the server answers
    /// or the connection closes.
    pub async fn request_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        limit: Option<Duration>,
    ) -> ClientResult<T> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        if self.dispatcher.is_closed() {
            return Err(ClientError::ConnectionLost(
                "Server closed the connection".to_string(),
            ));
        }

        let id = RequestId::from(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(method, params, id.clone());

        // Register before sending so a fast response cannot be missed
        let response_rx = self.dispatcher.wait_for_response(id.clone());

        let payload = serde_json::to_string(&request)?;
        trace!("Sending request {} ({})", id, method);
        self.outbound.send(payload).await.map_err(|_| {
            self.dispatcher.cancel(&id);
            ClientError::ConnectionLost("Outbound channel closed".to_string())
        })?;

        let received = match limit {
            Some(limit) => match timeout(limit, response_rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.dispatcher.cancel(&id);
                    error!("Request '{}' timed out after {:?}", method, limit);
                    return Err(ClientError::Timeout {
                        operation: method.to_string(),
                        timeout: limit,
                    });
                }
            },
            None => response_rx.await,
        };
        let response = received.map_err(|_| {
            ClientError::ConnectionLost(format!(
                "Server closed the connection before answering '{method}'"
            ))
        })?;

        let result = response.into_result()?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a notification
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] after shutdown and
    /// [`ClientError::ConnectionLost`] if the writer task is gone.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> ClientResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        let payload = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        trace!("Sending notification {}", method);
        self.outbound
            .send(payload)
            .await
            .map_err(|_| ClientError::ConnectionLost("Outbound channel closed".to_string()))
    }

    /// Request timeout in effect
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Whether the server side of the connection has closed
    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Stop both background tasks and fail anything still pending
    pub fn shutdown(&self) {
        debug!("Shutting down protocol client");
        self.shut_down.store(true, Ordering::Release);
        self.dispatcher.close();
        self.router_task.abort();
        self.writer_task.abort();
    }
}

impl Drop for ProtocolClient {
    fn drop(&mut self) {
        self.router_task.abort();
        self.writer_task.abort();
    }
}

async fn write_messages<W>(writer: W, mut outbound: mpsc::Receiver<String>)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(line) = outbound.recv().await {
        if let Err(e) = sink.send(line).await {
            error!("Failed to write to server: {}", e);
            break;
        }
    }
    debug!("Writer task completed");
}
