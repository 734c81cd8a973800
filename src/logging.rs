//! Log output setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! embedding application's call. [`init`] is the stock setup driven by
//! [`LoggingSettings`].

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LoggingSettings, SettingsError};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` overrides the configured filter. Returns `Ok(false)` when a
/// global subscriber was already installed, in which case nothing changes.
pub fn init(settings: &LoggingSettings) -> Result<bool, SettingsError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| SettingsError::InvalidConfig(format!("logging.filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match settings.resolved_file()? {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => builder
            .with_ansi(settings.ansi)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };
    Ok(installed)
}
