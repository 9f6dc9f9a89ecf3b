//! Layered settings
//!
//! Sources, lowest precedence first: built-in defaults, a config file
//! (explicit `--config`, else `<config_dir>/toolpilot/config.{toml,yaml,yml,json}`
//! when present), `TOOLPILOT_*` environment variables. Command-line flags are
//! applied on top by [`crate::cli`].
//!
//! Nested keys use `__` in environment variables, e.g.
//! `TOOLPILOT_REQUEST_TIMEOUT_SECS=30`. The `config` crate lowercases those
//! keys, so `TOOLPILOT_ENVIRONMENT__<NAME>` is read from the raw environment
//! instead: `TOOLPILOT_ENVIRONMENT__API_KEY=...` passes `API_KEY` to the server
//! with its case intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use toolpilot_client::{ClientConfig, LogLevel};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TOOLPILOT";

/// Prefix of variables forwarded to the server process
const SERVER_ENV_PREFIX: &str = "TOOLPILOT_ENVIRONMENT__";

const CONFIG_FILE_STEM: &str = "config";
const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound for each request to the server
    pub request_timeout_secs: u64,
    /// Upper bound for a tool call; unset waits until the tool finishes
    pub tool_timeout_secs: Option<u64>,
    /// Grace period for the server to exit during cleanup
    pub shutdown_timeout_secs: u64,
    /// Colored terminal output
    pub color: bool,
    /// Result rendering
    pub format: OutputFormat,
    /// Level requested from servers that support `logging/setLevel`
    pub server_log_level: Option<LogLevel>,
    /// Extra environment variables for the server process
    pub environment: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            tool_timeout_secs: None,
            shutdown_timeout_secs: 5,
            color: true,
            format: OutputFormat::Human,
            server_log_level: None,
            environment: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from the config file and the process environment
    ///
    /// # Errors
    ///
    /// Fails when an explicit file is missing or has an unknown extension,
    /// or when any source does not deserialize.
    pub fn load(explicit: Option<&Path>) -> CliResult<Self> {
        let file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::load_from(file.as_deref(), vars)
    }

    /// Load from an optional file plus the given environment variables
    pub(crate) fn load_from(
        file: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> CliResult<Self> {
        let (server_vars, vars): (HashMap<_, _>, HashMap<_, _>) = vars
            .into_iter()
            .partition(|(key, _)| is_server_env_key(key));

        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(file_format(path)?));
        }

        let mut settings: Self = builder
            .add_source(environment_source(vars))
            .build()?
            .try_deserialize()?;
        settings.environment.extend(
            server_vars
                .into_iter()
                .filter_map(|(key, value)| Some((server_env_name(&key)?.to_string(), value))),
        );
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> CliResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(CliError::Other(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.tool_timeout_secs == Some(0) {
            return Err(CliError::Other(
                "tool_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Settings for the protocol client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.request_timeout(),
            tool_timeout: self.tool_timeout(),
            shutdown_timeout: self.shutdown_timeout(),
            environment: self.environment.clone(),
            server_log_level: self.server_log_level,
            ..ClientConfig::default()
        }
    }
}

/// `TOOLPILOT_*` settings taken from `vars` instead of the process environment
fn environment_source(vars: HashMap<String, String>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(Some(vars.into_iter().collect()))
}

fn is_server_env_key(key: &str) -> bool {
    key.get(..SERVER_ENV_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SERVER_ENV_PREFIX))
}

/// Server variable name carried by a `TOOLPILOT_ENVIRONMENT__<NAME>` key
fn server_env_name(key: &str) -> Option<&str> {
    if !is_server_env_key(key) {
        return None;
    }
    Some(&key[SERVER_ENV_PREFIX.len()..]).filter(|name| !name.is_empty())
}

fn file_format(path: &Path) -> CliResult<FileFormat> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path.to_path_buf()));
    }

    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => Ok(FileFormat::Toml),
        Some("yaml" | "yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(CliError::UnsupportedConfigFormat(path.to_path_buf())),
    }
}

/// First existing `config.*` under the user config directory
fn default_config_file() -> Option<PathBuf> {
    let dir = dirs::config_dir()?.join("toolpilot");
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{CONFIG_FILE_STEM}.{ext}")))
        .find(|path| path.is_file())
}
