//! Logging system setup.
//!
//! `RUST_LOG` takes precedence over the configured level. Output goes to
//! stderr, human-readable or JSON, and optionally also to an append-mode
//! file.

use crate::config::LoggingSettings;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`. Human-readable or JSON
/// output goes to stderr, leaving stdout to the console gateway, and
/// `settings.file_path` additionally receives every event in append mode.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the log file cannot be
/// opened.
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let file_layer = match &settings.file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if settings.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    info!("Logging initialized with level: {}", settings.level);
    Ok(())
}
