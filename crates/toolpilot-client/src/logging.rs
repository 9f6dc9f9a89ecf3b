//! Delivery of server log notifications
//!
//! Servers push `notifications/message` whenever they log something. The
//! client hands each one to the [`LogSink`] it was built with; nothing else
//! in the process sees them.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::types::{LogLevel, LoggingMessage};

/// Receiver for server log notifications
pub trait LogSink: Send + Sync {
    /// Called once per `notifications/message`, on the routing task.
    fn log(&self, message: &LoggingMessage);
}

impl<F> LogSink for F
where
    F: Fn(&LoggingMessage) + Send + Sync,
{
    fn log(&self, message: &LoggingMessage) {
        self(message);
    }
}

/// Drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn log(&self, _message: &LoggingMessage) {}
}

/// Re-emits server messages as `tracing` events under the `toolpilot::server` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &LoggingMessage) {
        let logger = message.logger.as_deref().unwrap_or("server");
        let text = message.text();
        match message.level {
            LogLevel::Debug => debug!(target: "toolpilot::server", logger, "{text}"),
            LogLevel::Info | LogLevel::Notice => {
                info!(target: "toolpilot::server", logger, "{text}");
            }
            LogLevel::Warning => warn!(target: "toolpilot::server", logger, "{text}"),
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                error!(target: "toolpilot::server", logger, level = %message.level, "{text}");
            }
        }
    }
}

/// Shared handle to a sink
pub type SharedLogSink = Arc<dyn LogSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink: SharedLogSink = Arc::new(move |msg: &LoggingMessage| {
            captured.lock().unwrap().push(msg.text());
        });

        sink.log(&LoggingMessage {
            level: LogLevel::Info,
            logger: None,
            data: json!("started"),
        });

        assert_eq!(*seen.lock().unwrap(), vec!["started".to_string()]);
    }

    #[test]
    fn test_builtin_sinks_accept_every_level() {
        let levels = [
            LogLevel::Debug,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Emergency,
        ];
        for level in levels {
            let msg = LoggingMessage {
                level,
                logger: Some("test".into()),
                data: json!({"n": 1}),
            };
            NoopLogSink.log(&msg);
            TracingLogSink.log(&msg);
        }
    }
}
