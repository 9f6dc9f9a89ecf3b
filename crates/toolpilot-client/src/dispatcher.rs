//! Message routing for the protocol client
//!
//! One background task owns the read half of the connection. Everything the
//! server sends passes through [`route_messages`]:
//!
//! - **Responses** → handed to the waiting `request()` call via a oneshot channel
//! - **Requests** → answered directly (`ping`) or rejected with method-not-found
//! - **Notifications** → log messages go to the [`LogSink`](crate::LogSink), the rest are traced
//!
//! Having a single reader means a server request arriving between our request
//! and its response can never steal that response.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, trace, warn};

use crate::jsonrpc::{
    IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
use crate::logging::SharedLogSink;
use crate::types::LoggingMessage;

/// Tracks requests that are waiting for a response
#[derive(Debug, Default)]
pub(crate) struct MessageDispatcher {
    state: Mutex<DispatcherState>,
}

#[derive(Debug, Default)]
struct DispatcherState {
    response_waiters: HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

impl MessageDispatcher {
    /// Register interest in the response to `id`
    ///
    /// Must be called before the request is written. On a closed dispatcher
    /// the returned receiver resolves immediately with `RecvError`.
    pub(crate) fn wait_for_response(&self, id: RequestId) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().expect("dispatcher mutex poisoned");
        if !state.closed {
            state.response_waiters.insert(id, tx);
        }
        rx
    }

    /// Forget a waiter whose caller gave up (timeout)
    pub(crate) fn cancel(&self, id: &RequestId) {
        self.state
            .lock()
            .expect("dispatcher mutex poisoned")
            .response_waiters
            .remove(id);
    }

    /// Deliver a response; returns false when nobody was waiting for it
    fn deliver(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id.clone() else {
            return false;
        };
        let waiter = self
            .state
            .lock()
            .expect("dispatcher mutex poisoned")
            .response_waiters
            .remove(&id);
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Drop every waiter and refuse new ones
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().expect("dispatcher mutex poisoned");
        state.closed = true;
        state.response_waiters.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().expect("dispatcher mutex poisoned").closed
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.state
            .lock()
            .expect("dispatcher mutex poisoned")
            .response_waiters
            .len()
    }
}

/// Read loop: runs until the server closes its output
pub(crate) async fn route_messages<R>(
    reader: R,
    max_line_length: usize,
    dispatcher: std::sync::Arc<MessageDispatcher>,
    outbound: mpsc::Sender<String>,
    log_sink: SharedLogSink,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_length));

    while let Some(frame) = lines.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(
                    "Discarding oversized message from server (limit {} bytes)",
                    max_line_length
                );
                continue;
            }
            Err(LinesCodecError::Io(e)) => {
                warn!("Failed to read from server: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        trace!("Received message from server: {}", line);

        match IncomingMessage::parse(&line) {
            Ok(IncomingMessage::Response(response)) => {
                let id = response.id.clone();
                if !dispatcher.deliver(response) {
                    debug!("Dropping response with no waiter: {:?}", id);
                }
            }
            Ok(IncomingMessage::Request(request)) => {
                let reply = answer_server_request(&request);
                match serde_json::to_string(&reply) {
                    Ok(payload) => {
                        if outbound.send(payload).await.is_err() {
                            debug!("Outbound channel closed, cannot answer '{}'", request.method);
                        }
                    }
                    Err(e) => warn!("Failed to serialize reply to '{}': {}", request.method, e),
                }
            }
            Ok(IncomingMessage::Notification(notification)) => {
                handle_notification(&notification, &log_sink);
            }
            Err(e) => warn!("Ignoring malformed message from server: {}", e),
        }
    }

    debug!("Server output closed, failing pending requests");
    dispatcher.close();
}

fn answer_server_request(request: &JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "ping" => JsonRpcResponse::success(serde_json::json!({}), request.id.clone()),
        method => {
            debug!("Rejecting unsupported server request '{}'", method);
            JsonRpcResponse::error_response(
                JsonRpcError::method_not_found(method),
                request.id.clone(),
            )
        }
    }
}

fn handle_notification(notification: &JsonRpcNotification, log_sink: &SharedLogSink) {
    match notification.method.as_str() {
        "notifications/message" => {
            let params = notification.params.clone().unwrap_or_default();
            match serde_json::from_value::<LoggingMessage>(params) {
                Ok(message) => log_sink.log(&message),
                Err(e) => warn!("Malformed log notification from server: {}", e),
            }
        }
        "notifications/tools/list_changed" => {
            info!("Server reported a changed tool list; the current session keeps its snapshot");
        }
        method => debug!("Ignoring notification '{}'", method),
    }
}
