//! # toolpilot
//!
//! Interactive terminal front-end for MCP servers. It connects to a server
//! launched as a child process, lists its tools, prompts for the typed
//! arguments of the tool the operator picks, and prints the result.
//!
//! ## Quick Start
//!
//! ```bash
//! # Python server
//! toolpilot python3 weather_server.py
//!
//! # A lone .js target runs with node
//! toolpilot build/index.js
//!
//! # Just print the tool table
//! toolpilot --list-tools npx -y @modelcontextprotocol/server-everything
//! ```
//!
//! ## Architecture
//!
//! 1. **Command Layer** (`cli`, `config`): clap arguments over layered settings
//! 2. **Session Layer** (`session`, `arguments`, `reader`): the select, fill, execute loop
//! 3. **Output Layer** (`formatter`): colored text, tables, JSON and YAML
//!
//! All protocol work is delegated to `toolpilot-client`.

pub mod arguments;
pub mod cli;
pub mod config;
pub mod error;
pub mod formatter;
pub mod reader;
pub mod session;

use std::sync::Arc;

use clap::Parser;
use toolpilot_client::{McpClient, TracingLogSink};
use tracing::debug;

pub use error::{CliError, CliResult};
pub use session::{Session, SessionOutcome};

/// Run the CLI application and return the process exit code
///
/// # Errors
///
/// Returns an error when settings cannot be loaded or the session could not
/// be cleaned up. Errors inside a session are reported there and show up as
/// [`SessionOutcome::Failed`].
pub async fn run() -> CliResult<i32> {
    let cli = cli::Cli::parse();
    cli.init_tracing();

    let mut settings = cli.settings()?;
    if std::env::var_os("NO_COLOR").is_some() {
        settings.color = false;
    }
    debug!(
        "Settings: timeout {}s, tool timeout {:?}, format {:?}, color {}, {} server env vars",
        settings.request_timeout_secs,
        settings.tool_timeout(),
        settings.format,
        settings.color,
        settings.environment.len()
    );

    let client = McpClient::new(settings.client_config(), Arc::new(TracingLogSink));
    let formatter = formatter::Formatter::new(settings.format, settings.color);
    let mut session = Session::new(client, reader::StdinReader::new(), formatter);

    let target = cli.target_command();
    let outcome = if cli.list_tools {
        session.list_tools(&target).await?
    } else {
        session.start(&target).await?
    };
    Ok(outcome.exit_code())
}
