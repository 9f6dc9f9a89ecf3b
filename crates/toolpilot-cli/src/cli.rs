//! Command-line arguments

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::config::Settings;
use crate::error::CliResult;

/// Interactive MCP tool runner
#[derive(Parser, Debug)]
#[command(
    name = "toolpilot",
    version,
    about = "Connect to an MCP server, pick a tool, fill in its arguments, see the result",
    long_about = "toolpilot launches an MCP server as a child process and talks to it over stdio.\n\
                  It lists the server's tools, prompts for each argument the selected tool declares,\n\
                  and prints the result. Type 'quit' at the tool prompt to end the session.\n\n\
                  A single *.js target runs with node, a single *.py target with python3.\n\n\
                  SECURITY WARNING: the target is executed on your system; only run servers you trust."
)]
pub struct Cli {
    /// Server command, e.g. `python3 server.py`, `server.js`, `npx -y @scope/server`
    #[arg(
        value_name = "TARGET",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub target: Vec<String>,

    /// Config file (toml, yaml or json)
    #[arg(long, short = 'c', value_name = "FILE", env = "TOOLPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, short = 't', value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Tool result format
    #[arg(long, short = 'f', value_enum)]
    pub format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the server's tools and exit
    #[arg(long)]
    pub list_tools: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Output format options
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// Pretty JSON
    Json,
    /// YAML
    Yaml,
}

impl Cli {
    /// The connection target as a single command string
    pub fn target_command(&self) -> String {
        self.target.join(" ")
    }

    /// Default log level from -v/-q; `RUST_LOG` takes precedence
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Install the global subscriber, writing to stderr
    pub fn init_tracing(&self) {
        let filter = EnvFilter::builder()
            .with_default_directive(self.log_level().into())
            .from_env_lossy();

        // A subscriber may already be installed when embedded; keep it
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Load settings and apply command-line overrides
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn settings(&self) -> CliResult<Settings> {
        let settings = Settings::load(self.config.as_deref())?;
        Ok(self.apply_overrides(settings))
    }

    /// Command-line flags win over every other source
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(timeout) = self.timeout {
            settings.request_timeout_secs = timeout;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if self.no_color {
            settings.color = false;
        }
        settings
    }
}
