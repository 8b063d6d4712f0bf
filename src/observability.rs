//! Logging setup and lifecycle events shared by the binaries.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{env_value, parse_bool, DashboardConfig};
use crate::pipeline::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = env_value("MDASH_LOG_LEVEL") {
        config.level = level;
    }
    if let Some(format) = env_value("MDASH_LOG_FORMAT").as_deref().and_then(parse_log_format) {
        config.format = format;
    }
    if let Some(include_target) = env_value("MDASH_LOG_TARGET").as_deref().and_then(parse_bool) {
        config.include_target = include_target;
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(component: &'static str, logging: &LoggingConfig, config: &DashboardConfig) {
    info!(
        component,
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        refresh_secs = config.refresh_secs,
        timeout_ms = config.fetch.timeout_ms,
        warm_up = config.fetch.warm_up
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        route = "/dashboard"
    );
}

pub fn log_source_selected(component: &'static str, source: &str, reason: Option<&str>) {
    match reason {
        Some(reason) => info!(component, event = "source.selected", source, reason),
        None => info!(component, event = "source.selected", source),
    }
}

pub fn log_watch_selection(selection: &Selection, max_ticks: Option<u64>) {
    info!(
        component = "market_watch",
        event = "watch.selection",
        segment = selection.segment.as_str(),
        symbol = selection.option_symbol.as_str(),
        search = %selection.search,
        max_ticks = ?max_ticks
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}
