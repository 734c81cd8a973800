//! Configuration module for Tessera.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, ComputationSettings, JsonSettings, LoggingSettings, QuerySettings, Settings,
    SettingsError,
};
