//! Terminal rendering for the interactive session

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use comfy_table::{Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use toolpilot_client::{CallToolResult, Content, Implementation, Tool, ToolInputSchema};

use crate::arguments::{SchemaProperty, schema_properties};
use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

type Sink = Box<dyn Write + Send>;

/// Format and display output based on format preference
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
    interactive: bool,
    out: Sink,
    err: Sink,
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formatter")
            .field("format", &self.format)
            .field("colored", &self.colored)
            .finish_non_exhaustive()
    }
}

impl Formatter {
    /// Formatter writing to stdout and stderr
    #[must_use]
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        let mut formatter = Self::with_writers(
            format,
            colored,
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        );
        formatter.interactive = io::stdout().is_terminal();
        formatter
    }

    /// Formatter writing to the given streams
    #[must_use]
    pub fn with_writers(format: OutputFormat, colored: bool, out: Sink, err: Sink) -> Self {
        Self {
            format,
            colored,
            interactive: false,
            out,
            err,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }

    /// Spinner shown while a long operation runs; only on an interactive terminal
    pub fn spinner(&self, message: impl Into<String>) -> Option<ProgressBar> {
        if self.format != OutputFormat::Human || !self.interactive {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }

    pub fn print_connecting(&mut self, target: &str) -> CliResult<()> {
        if self.colored {
            writeln!(self.out, "{} {}", "Connecting to".bright_blue(), target.bold())?;
        } else {
            writeln!(self.out, "Connecting to {target}")?;
        }
        Ok(())
    }

    pub fn print_connected(
        &mut self,
        server: Option<&Implementation>,
        tool_count: usize,
    ) -> CliResult<()> {
        let name = server
            .map(|s| format!("{} {}", s.name, s.version))
            .unwrap_or_else(|| "server".to_string());
        let plural = if tool_count == 1 { "" } else { "s" };
        if self.colored {
            writeln!(
                self.out,
                "{} {} ({tool_count} tool{plural})",
                "✓ Connected to".bright_green().bold(),
                name
            )?;
        } else {
            writeln!(self.out, "Connected to {name} ({tool_count} tool{plural})")?;
        }
        Ok(())
    }

    pub fn print_banner(&mut self) -> CliResult<()> {
        let text = "Pick a tool by number, or type 'quit' to exit.";
        if self.colored {
            writeln!(self.out, "{}", text.bright_black())?;
        } else {
            writeln!(self.out, "{text}")?;
        }
        Ok(())
    }

    /// Numbered tool list; numbering starts at 1
    pub fn print_tool_menu(&mut self, tools: &[Tool]) -> CliResult<()> {
        if tools.is_empty() {
            self.print_info("No tools available")?;
            return Ok(());
        }

        self.print_header("Available Tools")?;
        for (index, tool) in tools.iter().enumerate() {
            let number = index + 1;
            if self.colored {
                write!(
                    self.out,
                    "  {} {}",
                    format!("{number}.").bright_blue(),
                    tool.name.bright_green().bold()
                )?;
            } else {
                write!(self.out, "  {number}. {}", tool.name)?;
            }
            match &tool.description {
                Some(desc) => writeln!(self.out, " - {desc}")?,
                None => writeln!(self.out)?,
            }
        }
        Ok(())
    }

    pub fn selection_prompt(&self, tool_count: usize) -> String {
        if tool_count == 0 {
            "\nType 'quit' to exit: ".to_string()
        } else {
            format!("\nSelect a tool (1-{tool_count}) or 'quit': ")
        }
    }

    /// Prompt for one argument: name, type, and required/optional marker
    pub fn argument_prompt(&self, property: &SchemaProperty) -> String {
        let marker = if property.required {
            "required"
        } else {
            "optional"
        };
        let description = property
            .description
            .as_deref()
            .map(|d| format!(" {d}"))
            .unwrap_or_default();

        if self.colored {
            let marker = if property.required {
                marker.bright_red().to_string()
            } else {
                marker.bright_black().to_string()
            };
            format!(
                "  {} ({}, {marker}){description}: ",
                property.name.bright_green().bold(),
                property.kind
            )
        } else {
            format!(
                "  {} ({}, {marker}){description}: ",
                property.name, property.kind
            )
        }
    }

    pub fn print_arguments_header(&mut self, tool_name: &str) -> CliResult<()> {
        let text = format!("Arguments for {tool_name}");
        if self.colored {
            writeln!(self.out, "{}", text.bright_cyan())?;
        } else {
            writeln!(self.out, "{text}")?;
        }
        Ok(())
    }

    pub fn print_invalid_selection(&mut self, input: &str, tool_count: usize) -> CliResult<()> {
        let text = if tool_count == 0 {
            format!("Invalid selection '{input}': no tools are available")
        } else {
            format!("Invalid selection '{input}': enter a number between 1 and {tool_count}")
        };
        if self.colored {
            writeln!(self.err, "{}", text.bright_yellow())?;
        } else {
            writeln!(self.err, "{text}")?;
        }
        Ok(())
    }

    pub fn print_calling(&mut self, tool_name: &str) -> CliResult<()> {
        if self.colored {
            writeln!(self.out, "{} {}", "Calling".bright_blue(), tool_name.bold())?;
        } else {
            writeln!(self.out, "Calling {tool_name}")?;
        }
        Ok(())
    }

    pub fn print_goodbye(&mut self) -> CliResult<()> {
        self.print_info("Session ended")
    }

    /// Render the outcome of a tool call
    pub fn display_result(&mut self, result: &CallToolResult) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                if result.is_error() {
                    if self.colored {
                        writeln!(self.out, "{}", "Tool reported an error:".bright_red().bold())?;
                    } else {
                        writeln!(self.out, "Tool reported an error:")?;
                    }
                }
                if result.content.is_empty() && result.structured_content.is_none() {
                    return self.print_info("(no content)");
                }
                for block in &result.content {
                    match block {
                        Content::Text { text } => writeln!(self.out, "{text}")?,
                        other => self.display_json(other, true)?,
                    }
                }
                if result.content.is_empty() {
                    if let Some(structured) = &result.structured_content {
                        self.display_json(structured, true)?;
                    }
                }
                Ok(())
            }
            _ => self.display(result),
        }
    }

    /// Tool overview used by `--list-tools`
    pub fn display_tools_table(&mut self, tools: &[Tool]) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                if tools.is_empty() {
                    return self.print_info("No tools available");
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .apply_modifier(UTF8_ROUND_CORNERS)
                    .set_header(vec!["#", "Name", "Description", "Arguments"]);

                for (index, tool) in tools.iter().enumerate() {
                    table.add_row(vec![
                        (index + 1).to_string(),
                        tool.name.clone(),
                        tool.description.clone().unwrap_or_else(|| "-".to_string()),
                        format_schema_summary(&tool.input_schema),
                    ]);
                }

                writeln!(self.out, "{table}")?;
                Ok(())
            }
            _ => self.display(tools),
        }
    }

    /// Display error with category and suggestions
    pub fn display_error(&mut self, error: &CliError) {
        // Nowhere left to report a failure to write to stderr
        let _ = self.write_error(error);
    }

    fn write_error(&mut self, error: &CliError) -> io::Result<()> {
        let category = error.category();
        let suggestions = error.suggestions();
        if self.colored {
            writeln!(
                self.err,
                "{} {}",
                format!("{category} error:").bright_red().bold(),
                error
            )?;
            if !suggestions.is_empty() {
                writeln!(self.err, "{}", "Suggestions:".bright_yellow().bold())?;
                for suggestion in suggestions {
                    writeln!(self.err, "  {} {}", "•".bright_blue(), suggestion)?;
                }
            }
        } else {
            writeln!(self.err, "{category} error: {error}")?;
            if !suggestions.is_empty() {
                writeln!(self.err, "Suggestions:")?;
                for suggestion in suggestions {
                    writeln!(self.err, "  • {suggestion}")?;
                }
            }
        }
        self.err.flush()
    }

    // Internal formatting helpers

    fn display<T: Serialize + ?Sized>(&mut self, value: &T) -> CliResult<()> {
        match self.format {
            OutputFormat::Yaml => self.display_yaml(value),
            _ => self.display_json(value, true),
        }
    }

    fn display_json<T: Serialize + ?Sized>(&mut self, value: &T, pretty: bool) -> CliResult<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        writeln!(self.out, "{json}")?;
        Ok(())
    }

    fn display_yaml<T: Serialize + ?Sized>(&mut self, value: &T) -> CliResult<()> {
        let yaml = serde_yaml::to_string(value)?;
        write!(self.out, "{yaml}")?;
        Ok(())
    }

    fn print_header(&mut self, text: &str) -> CliResult<()> {
        if self.colored {
            writeln!(self.out, "\n{}", text.bright_cyan().bold())?;
            writeln!(self.out, "{}", "=".repeat(text.len()).bright_cyan())?;
        } else {
            writeln!(self.out, "\n{text}")?;
            writeln!(self.out, "{}", "=".repeat(text.len()))?;
        }
        Ok(())
    }

    fn print_info(&mut self, text: &str) -> CliResult<()> {
        if self.colored {
            writeln!(self.out, "{}", text.bright_blue())?;
        } else {
            writeln!(self.out, "{text}")?;
        }
        Ok(())
    }
}

/// Format schema summary for table display
fn format_schema_summary(schema: &ToolInputSchema) -> String {
    let props = schema_properties(schema);
    if props.is_empty() {
        return "None".to_string();
    }
    props
        .iter()
        .map(|p| {
            if p.required {
                format!("{}*", p.name)
            } else {
                p.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
