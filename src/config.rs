//! Environment-driven runtime configuration.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::FetchConfig;

pub const MIN_REFRESH_SECS: u64 = 3;
pub const MAX_REFRESH_SECS: u64 = 60;
pub const DEFAULT_REFRESH_SECS: u64 = 3;

pub const DEFAULT_EQUITY_COLUMNS: [&str; 4] = ["symbol", "lastPrice", "change", "pChange"];
pub const DEFAULT_OPTION_COLUMNS: [&str; 4] = [
    "expiryDate",
    "strikePrice",
    "CE.openInterest",
    "PE.openInterest",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid {expected}: '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub equity_columns: Vec<String>,
    pub option_columns: Vec<String>,
    pub option_rows: usize,
    pub top_oi: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            equity_columns: to_strings(&DEFAULT_EQUITY_COLUMNS),
            option_columns: to_strings(&DEFAULT_OPTION_COLUMNS),
            option_rows: 20,
            top_oi: crate::transform::TOP_OI_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub bind_addr: SocketAddr,
    pub refresh_secs: u64,
    pub use_demo: bool,
    pub fetch: FetchConfig,
    pub display: DisplayConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            refresh_secs: DEFAULT_REFRESH_SECS,
            use_demo: false,
            fetch: FetchConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

pub fn clamp_refresh_secs(secs: u64) -> u64 {
    secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
}

pub fn dashboard_config_from_env() -> Result<DashboardConfig, ConfigError> {
    let mut config = DashboardConfig::default();

    if let Some(raw) = env_value("MDASH_DASHBOARD_ADDR") {
        config.bind_addr = raw.parse().map_err(|_| ConfigError::Invalid {
            key: "MDASH_DASHBOARD_ADDR",
            expected: "socket address",
            value: raw.clone(),
        })?;
    }

    if let Some(secs) = env_u64("MDASH_REFRESH_SECS")? {
        config.refresh_secs = clamp_refresh_secs(secs);
    }

    if let Some(raw) = env_value("MDASH_USE_DEMO") {
        config.use_demo = parse_bool(&raw).unwrap_or(false);
    }

    if let Some(url) = env_value("MDASH_NSE_BASE_URL") {
        config.fetch.nse_base_url = url;
    }
    if let Some(url) = env_value("MDASH_FOREX_URL") {
        config.fetch.forex_url = url;
    }
    if let Some(timeout_ms) = env_u64("MDASH_HTTP_TIMEOUT_MS")? {
        config.fetch.timeout_ms = timeout_ms;
    }
    if let Some(parsed) = env_value("MDASH_WARM_UP").as_deref().and_then(parse_bool) {
        config.fetch.warm_up = parsed;
    }
    if let Some(parsed) = env_value("MDASH_HARDEN_HEADERS")
        .as_deref()
        .and_then(parse_bool)
    {
        config.fetch.harden_headers = parsed;
    }

    if let Some(columns) = env_value("MDASH_EQUITY_COLUMNS").map(|raw| parse_columns(&raw)) {
        if !columns.is_empty() {
            config.display.equity_columns = columns;
        }
    }
    if let Some(columns) = env_value("MDASH_OPTION_COLUMNS").map(|raw| parse_columns(&raw)) {
        if !columns.is_empty() {
            config.display.option_columns = columns;
        }
    }

    Ok(config)
}

pub(crate) fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub(crate) fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    env_value(key)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key,
                expected: "unsigned integer",
                value: raw.clone(),
            })
        })
        .transpose()
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
