// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

pub const DEFAULT_CONFIG_PATH: &str = "treq.toml";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:4096";
pub const ENV_PREFIX: &str = "TREQ_";

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_history_file() -> Option<String> {
    Some(".treq_history".to_string())
}

/// Client configuration. Command-line flags take precedence over every field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Control-plane server URL.
    #[serde(default = "default_server")]
    pub server: String,
    /// Bearer token sent to the control plane.
    #[serde(default)]
    pub token: Option<String>,
    /// Where the interactive prompt keeps its history. Unset disables history.
    #[serde(default = "default_history_file")]
    pub history_file: Option<String>,
    /// Set to false to never colorize human output.
    #[serde(default = "default_true")]
    pub color: bool,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            token: None,
            history_file: default_history_file(),
            color: true,
            log_level: LogLevel::default(),
        }
    }
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the configuration from defaults, a TOML file, and `TREQ_*` environment variables.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed, or if an environment
/// variable holds a value of the wrong type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let mut file_missing = None;

    // A missing file is fine; the defaults and environment still apply.
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}
