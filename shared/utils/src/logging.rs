use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = config.format == "json";
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match &config.file_path {
        Some(file_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .with_context(|| format!("opening log file {file_path}"))?;
            let writer = Mutex::new(file);
            if json {
                fmt::layer().json().with_ansi(false).with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            }
        }
        None if json => fmt::layer().json().with_target(true).boxed(),
        None => fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(level = %config.level, format = %config.format, "logging initialized");
    Ok(())
}
