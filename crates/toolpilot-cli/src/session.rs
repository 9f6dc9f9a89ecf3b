//! Interactive session controller
//!
//! A [`Session`] drives one connect-to-cleanup lifetime of a [`ToolClient`]:
//! connect, snapshot the tool list, then loop over select, fill in arguments,
//! execute. Cleanup runs exactly once per session on every exit path.
//!
//! Failures are contained at two levels. Selection mistakes and failed tool
//! calls are reported and the loop carries on. Connection failures end the
//! session with [`SessionOutcome::Failed`]. Only a failed cleanup is returned
//! as an error.

use toolpilot_client::{Tool, ToolClient};
use tracing::{debug, info, warn};

use crate::arguments::{ArgumentSet, coerce, schema_properties, should_record};
use crate::error::{CliError, CliResult};
use crate::formatter::Formatter;
use crate::reader::LineReader;

/// Keyword that ends the loop, compared case-insensitively
const QUIT: &str = "quit";

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The operator quit or input ended
    Completed,
    /// An error ended the session; it has been reported
    Failed,
}

impl SessionOutcome {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Failed => 1,
        }
    }
}

/// Mediates between the operator and a protocol client
#[derive(Debug)]
pub struct Session<C, R> {
    client: C,
    reader: R,
    formatter: Formatter,
}

impl<C: ToolClient, R: LineReader> Session<C, R> {
    pub fn new(client: C, reader: R, formatter: Formatter) -> Self {
        Self {
            client,
            reader,
            formatter,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Connect to `target` and run the interactive loop
    ///
    /// # Errors
    ///
    /// Only a failed cleanup is returned as an error; everything else is
    /// reported to the operator and reflected in the outcome.
    pub async fn start(&mut self, target: &str) -> CliResult<SessionOutcome> {
        let result = self.interact(target).await;
        self.finish(result).await
    }

    /// Connect to `target`, print the tool table and clean up
    ///
    /// # Errors
    ///
    /// Same contract as [`Session::start`].
    pub async fn list_tools(&mut self, target: &str) -> CliResult<SessionOutcome> {
        let result = self.show_tools(target).await;
        self.finish(result).await
    }

    /// Ask for every schema property of `tool`, in schema order
    ///
    /// Empty input is recorded only for required properties; malformed input
    /// is coerced, never re-prompted.
    ///
    /// # Errors
    ///
    /// [`CliError::InputClosed`] when input ends before the last property.
    pub async fn prompt_for_tool_arguments(&mut self, tool: &Tool) -> CliResult<ArgumentSet> {
        let mut arguments = ArgumentSet::new();
        let properties = schema_properties(&tool.input_schema);
        if !properties.is_empty() {
            self.formatter.print_arguments_header(&tool.name)?;
        }

        for property in properties {
            let prompt = self.formatter.argument_prompt(&property);
            let input = self
                .reader
                .read_line(&prompt)
                .await?
                .ok_or(CliError::InputClosed)?;

            if should_record(&input, property.required) {
                arguments.insert(property.name.clone(), coerce(&property.kind, &input));
            }
        }
        Ok(arguments)
    }

    async fn interact(&mut self, target: &str) -> CliResult<()> {
        self.connect(target).await?;
        self.chat_loop().await
    }

    async fn show_tools(&mut self, target: &str) -> CliResult<()> {
        self.connect(target).await?;
        let tools = self.client.list_tools().await?;
        self.formatter.display_tools_table(&tools)
    }

    async fn connect(&mut self, target: &str) -> CliResult<()> {
        info!("Connecting to {}", target);
        self.formatter.print_connecting(target)?;

        let spinner = self.formatter.spinner("Starting server");
        let result = self.client.connect(target).await;
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }
        result?;
        Ok(())
    }

    /// Report the session result, then release the client exactly once
    async fn finish(&mut self, result: CliResult<()>) -> CliResult<SessionOutcome> {
        let outcome = match result {
            Ok(()) => SessionOutcome::Completed,
            Err(err) => {
                warn!("Session failed: {}", err);
                self.formatter.display_error(&err);
                SessionOutcome::Failed
            }
        };

        match self.client.cleanup().await {
            Ok(()) => {
                debug!("Session cleaned up");
                Ok(outcome)
            }
            Err(err) => {
                let err = CliError::Cleanup(err);
                self.formatter.display_error(&err);
                Err(err)
            }
        }
    }

    async fn chat_loop(&mut self) -> CliResult<()> {
        // Fixed for the whole session; selection indexes into this snapshot
        let tools = self.client.list_tools().await?;
        self.formatter
            .print_connected(self.client.server_info(), tools.len())?;
        self.formatter.print_banner()?;

        loop {
            self.formatter.print_tool_menu(&tools)?;
            let prompt = self.formatter.selection_prompt(tools.len());
            let line = match self.reader.read_line(&prompt).await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Input closed at tool selection");
                    break;
                }
                Err(err) => {
                    warn!("Could not read tool selection: {}", err);
                    self.formatter.display_error(&err);
                    continue;
                }
            };

            let choice = line.trim();
            if choice.eq_ignore_ascii_case(QUIT) {
                break;
            }

            let Some(tool) = select_tool(&tools, choice) else {
                self.formatter.print_invalid_selection(choice, tools.len())?;
                continue;
            };

            if let Err(err) = self.invoke(tool).await {
                warn!("Tool '{}' failed: {}", tool.name, err);
                self.formatter.display_error(&err);
            }
        }

        self.formatter.print_goodbye()
    }

    async fn invoke(&mut self, tool: &Tool) -> CliResult<()> {
        let arguments = self.prompt_for_tool_arguments(tool).await?;
        debug!(
            "Calling '{}' with {} arguments",
            tool.name,
            arguments.len()
        );
        self.formatter.print_calling(&tool.name)?;
        let result = self
            .client
            .execute_tool(&tool.name, arguments.into_arguments())
            .await?;
        self.formatter.display_result(&result)
    }
}

/// Resolve a 1-based menu number from the leading digits of `choice`
fn select_tool<'a>(tools: &'a [Tool], choice: &str) -> Option<&'a Tool> {
    let end = choice
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(choice.len());
    let index = choice[..end].parse::<usize>().ok()?;
    index.checked_sub(1).and_then(|i| tools.get(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_tools() -> Vec<Tool> {
        vec![Tool::new("a"), Tool::new("b"), Tool::new("c")]
    }

    #[test]
    fn test_select_tool_bounds() {
        let tools = three_tools();
        assert!(select_tool(&tools, "0").is_none());
        assert!(select_tool(&tools, "4").is_none());
        assert!(select_tool(&tools, "abc").is_none());
        assert!(select_tool(&tools, "-1").is_none());
        assert!(select_tool(&tools, "").is_none());
        assert!(select_tool(&tools, "4x").is_none());
        assert_eq!(select_tool(&tools, "2abc").map(|t| t.name.as_str()), Some("b"));
        assert_eq!(select_tool(&tools, "2.5").map(|t| t.name.as_str()), Some("b"));
        assert_eq!(select_tool(&tools, "1").map(|t| t.name.as_str()), Some("a"));
        assert_eq!(select_tool(&tools, "3").map(|t| t.name.as_str()), Some("c"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SessionOutcome::Completed.exit_code(), 0);
        assert_eq!(SessionOutcome::Failed.exit_code(), 1);
    }
}
