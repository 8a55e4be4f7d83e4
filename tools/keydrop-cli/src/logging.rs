//! Tracing subscriber setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Logs go to stderr so `--json` output on
/// stdout stays machine-readable.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    match config.format {
        LogFormat::Compact => init_with_layer(
            config,
            verbose,
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        ),
        LogFormat::Json => init_with_layer(
            config,
            verbose,
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        ),
    }
}

fn build_env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.level.as_str() };
        EnvFilter::new(format!(
            "warn,keydrop={level},keydrop_commerce={level},keydrop_db={level}",
            level = level
        ))
    })
}

fn init_with_layer<L>(config: &LoggingConfig, verbose: bool, fmt_layer: L) -> Result<()>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_env_filter(config, verbose))
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
