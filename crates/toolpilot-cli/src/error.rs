//! Error types for the interactive front-end

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use toolpilot_client::ClientError;

/// CLI errors with operator-facing context
#[derive(Error, Debug)]
pub enum CliError {
    /// Raised by the protocol client
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Standard input closed while a value was still expected
    #[error("Input closed before all arguments were entered")]
    InputClosed,

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML rendering error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or deserialized
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Explicit config file does not exist
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Config file extension is not toml, yaml or json
    #[error("Unsupported config format: {}", .0.display())]
    UnsupportedConfigFormat(PathBuf),

    /// Releasing the session failed
    #[error("Cleanup failed: {0}")]
    Cleanup(ClientError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// User-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Client(ClientError::InvalidCommand(_)) => vec![
                "Pass the server command as the target, e.g. `toolpilot python3 server.py`",
            ],
            Self::Client(ClientError::ConnectionFailed(_) | ClientError::ConnectionLost(_)) => {
                vec![
                    "Check that the server command runs on its own",
                    "Run with -vv to see the server's stderr",
                ]
            }
            Self::Client(ClientError::Timeout { .. }) => vec![
                "Increase timeout with --timeout flag",
                "Check server responsiveness",
            ],
            Self::ConfigNotFound(_) | Self::UnsupportedConfigFormat(_) => vec![
                "Config files must end in .toml, .yaml, .yml or .json",
                "Omit --config to use the default location",
            ],
            Self::InputClosed => vec!["Provide a value for every prompt before closing input"],
            _ => vec![],
        }
    }

    /// Error category for colored output
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Client(err) => match err {
                ClientError::InvalidCommand(_) => ErrorCategory::User,
                ClientError::ConnectionFailed(_)
                | ClientError::ConnectionLost(_)
                | ClientError::NotConnected
                | ClientError::AlreadyConnected => ErrorCategory::Connection,
                ClientError::Timeout { .. } => ErrorCategory::Timeout,
                ClientError::Server { .. } => ErrorCategory::Server,
                ClientError::Protocol(_) | ClientError::Serialization(_) => {
                    ErrorCategory::Parsing
                }
                ClientError::Io(_) => ErrorCategory::System,
                _ => ErrorCategory::Other,
            },
            Self::InputClosed => ErrorCategory::User,
            Self::Json(_) | Self::Yaml(_) => ErrorCategory::Parsing,
            Self::Io(_) | Self::Cleanup(_) => ErrorCategory::System,
            Self::Config(_) | Self::ConfigNotFound(_) | Self::UnsupportedConfigFormat(_) => {
                ErrorCategory::Config
            }
            Self::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Error categories for colored output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    User,
    Server,
    Timeout,
    Parsing,
    System,
    Config,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::User => write!(f, "User Input"),
            Self::Server => write!(f, "Server"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Parsing => write!(f, "Parsing"),
            Self::System => write!(f, "System"),
            Self::Config => write!(f, "Configuration"),
            Self::Other => write!(f, "Error"),
        }
    }
}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
