//! Test doubles shared by the session tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use toolpilot_cli::cli::OutputFormat;
use toolpilot_cli::formatter::Formatter;
use toolpilot_cli::reader::LineReader;
use toolpilot_cli::{CliResult, Session};
use toolpilot_client::{CallToolResult, ClientError, ClientResult, Tool, ToolClient};

/// Feeds a fixed script of lines, then reports end of input
#[derive(Debug, Default)]
pub struct ScriptedReader {
    lines: VecDeque<CliResult<String>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(lines.into_iter().map(|line| Ok(line.into())))
    }

    /// Script that may include read failures
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = CliResult<String>>,
    {
        Self {
            lines: results.into_iter().collect(),
            prompts: Arc::default(),
        }
    }

    /// Handle on every prompt shown so far
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LineReader for ScriptedReader {
    async fn read_line(&mut self, prompt: &str) -> CliResult<Option<String>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.lines.pop_front().transpose()
    }
}

/// A `ToolClient` that records every call
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub tools: Vec<Tool>,
    pub fail_connect: bool,
    pub fail_cleanup: bool,
    /// Tool names whose execution fails
    pub failing_tools: Vec<String>,
    pub connects: Vec<String>,
    pub list_calls: usize,
    pub calls: Vec<(String, Map<String, Value>)>,
    pub cleanups: usize,
}

impl RecordingClient {
    pub fn with_tools(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            ..Default::default()
        }
    }

    pub fn call_names(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[async_trait]
impl ToolClient for RecordingClient {
    async fn connect(&mut self, target: &str) -> ClientResult<()> {
        self.connects.push(target.to_string());
        if self.fail_connect {
            return Err(ClientError::ConnectionFailed(format!(
                "failed to start '{target}'"
            )));
        }
        Ok(())
    }

    async fn list_tools(&mut self) -> ClientResult<Vec<Tool>> {
        self.list_calls += 1;
        Ok(self.tools.clone())
    }

    async fn execute_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ClientResult<CallToolResult> {
        self.calls.push((name.to_string(), arguments.clone()));
        if self.failing_tools.iter().any(|t| t == name) {
            return Err(ClientError::Server {
                code: -32603,
                message: format!("{name} exploded"),
            });
        }
        Ok(CallToolResult::text(format!(
            "{name} -> {}",
            Value::Object(arguments)
        )))
    }

    async fn cleanup(&mut self) -> ClientResult<()> {
        self.cleanups += 1;
        if self.fail_cleanup {
            return Err(ClientError::Io(io::Error::other("kill failed")));
        }
        Ok(())
    }
}

/// Cloneable in-memory writer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captured output of a session under test
pub struct Harness {
    pub session: Session<RecordingClient, ScriptedReader>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub out: SharedBuffer,
    pub err: SharedBuffer,
}

impl Harness {
    pub fn new<I, S>(client: RecordingClient, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_reader(client, ScriptedReader::new(lines))
    }

    pub fn with_reader(client: RecordingClient, reader: ScriptedReader) -> Self {
        let prompts = reader.prompts();
        let out = SharedBuffer::default();
        let err = SharedBuffer::default();
        let formatter = Formatter::with_writers(
            OutputFormat::Human,
            false,
            Box::new(out.clone()),
            Box::new(err.clone()),
        );
        Self {
            session: Session::new(client, reader, formatter),
            prompts,
            out,
            err,
        }
    }

    pub fn client(&self) -> &RecordingClient {
        self.session.client()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// How many times the tool menu was printed
    pub fn menus_shown(&self) -> usize {
        self.out.contents().matches("Available Tools").count()
    }
}
