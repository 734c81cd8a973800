//! TOML-based configuration for Tessera.
//!
//! Supports a config file (tessera.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [logging]
//! filter = "tessera=debug"
//! ansi = false
//! file = "${HOME}/logs/tessera.log"
//!
//! [computation]
//! auto_refresh = true
//!
//! [query]
//! eliminate_subqueries = true
//! sequential_key_column = "sys_row_id"
//! temp_table_prefix = "#"
//!
//! [json]
//! pretty = false
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub computation: ComputationSettings,
    pub query: QuerySettings,
    pub json: JsonSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,

    /// Colorize output.
    pub ansi: bool,

    /// Log file path (supports ${ENV_VAR} expansion). Logs go to stderr
    /// when unset.
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            file: None,
        }
    }
}

impl LoggingSettings {
    /// Get the log file path with environment variables expanded.
    pub fn resolved_file(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.file
            .as_deref()
            .map(|f| expand_env_vars(f).map(PathBuf::from))
            .transpose()
    }
}

/// Computation refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComputationSettings {
    /// Refresh dependent computed columns on every data set mutation.
    pub auto_refresh: bool,
}

impl Default for ComputationSettings {
    fn default() -> Self {
        Self { auto_refresh: true }
    }
}

/// Statement building configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Inline simple selects instead of nesting them as sub-queries.
    pub eliminate_subqueries: bool,

    /// Name of the identity column added to sequential key tables.
    pub sequential_key_column: String,

    /// Prefix for generated temporary table names.
    pub temp_table_prefix: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            eliminate_subqueries: true,
            sequential_key_column: "sys_row_id".to_string(),
            temp_table_prefix: "#".to_string(),
        }
    }
}

/// JSON output configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JsonSettings {
    /// Indent written JSON.
    pub pretty: bool,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TESSERA_CONFIG`
    /// 2. `./tessera.toml`
    /// 3. `~/.config/tessera/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TESSERA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tessera.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tessera").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let column = &self.query.sequential_key_column;
        if column.is_empty() || column.contains('.') {
            return Err(SettingsError::InvalidConfig(format!(
                "query.sequential_key_column must be a plain column name, got '{}'",
                column
            )));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-alphanumeric, non-underscore char
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
