//! Client error types

use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors raised while talking to an MCP server.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// The connection target could not be turned into a runnable command.
    #[error("Invalid server command: {0}")]
    InvalidCommand(String),

    /// Failed to start or handshake with the server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// An operation needed a live session but none exists.
    #[error("Client is not connected - call connect first")]
    NotConnected,

    /// `connect` was called on a client that already holds a session.
    #[error("Client is already connected")]
    AlreadyConnected,

    /// The server did not answer within the request timeout.
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// The method that timed out
        operation: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// The server answered with a JSON-RPC error object.
    #[error("Server error [{code}]: {message}")]
    Server {
        /// JSON-RPC error code
        code: i32,
        /// Error message reported by the server
        message: String,
    },

    /// The server sent something that is not valid MCP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the error means the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ConnectionLost(_) | Self::NotConnected
        )
    }
}
