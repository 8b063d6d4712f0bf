//! One refresh cycle: fetch, extract, transform, and package a snapshot.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{env_value, DashboardConfig};
use crate::dashboard::{
    ChartSpec, DashboardSnapshot, DashboardSnapshotSource, ErrorBanner, NamedTable,
};
use crate::extract::{
    currency_table, equity_table, extract_currency_rates, extract_equity_rows,
    extract_option_chain, option_table, SchemaError,
};
use crate::fetch::{fetch_json, Endpoint, FetchError, HttpFetcher, OptionSymbol};
use crate::transform::{
    drop_incomplete, filter_by_text, max_pain, rankings_table, top_by_open_interest,
    total_open_interest,
};

pub const SIMULATED_PNL: [f64; 8] = [0.0, 100.0, 250.0, 300.0, 500.0, 450.0, 600.0, 800.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Equity,
    Futures,
    Options,
    Forex,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::Equity,
        Segment::Futures,
        Segment::Options,
        Segment::Forex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "Equity",
            Self::Futures => "Futures",
            Self::Options => "Options",
            Self::Forex => "Forex",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|segment| segment.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

/// Sidebar selections for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub segment: Segment,
    pub option_symbol: OptionSymbol,
    pub search: String,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            segment: Segment::Equity,
            option_symbol: OptionSymbol::Nifty,
            search: String::new(),
        }
    }
}

impl Selection {
    /// Unknown segment or symbol values fall back to the defaults.
    pub fn from_parts(segment: Option<&str>, symbol: Option<&str>, search: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            segment: segment.and_then(Segment::parse).unwrap_or(defaults.segment),
            option_symbol: symbol
                .and_then(OptionSymbol::parse)
                .unwrap_or(defaults.option_symbol),
            search: search.map(|raw| raw.trim().to_string()).unwrap_or_default(),
        }
    }
}

pub fn selection_from_env() -> Selection {
    Selection::from_parts(
        env_value("MDASH_SEGMENT").as_deref(),
        env_value("MDASH_SYMBOL").as_deref(),
        env_value("MDASH_SEARCH").as_deref(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClientBuild,
    InvalidUrl,
    Transport,
    HttpStatus,
    MalformedResponse,
    Schema,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientBuild => "client_build",
            Self::InvalidUrl => "invalid_url",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::MalformedResponse => "malformed_response",
            Self::Schema => "schema",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected payload shape: {0}")]
    Schema(#[from] SchemaError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(FetchError::ClientBuild(_)) => ErrorKind::ClientBuild,
            Self::Fetch(FetchError::InvalidUrl { .. }) => ErrorKind::InvalidUrl,
            Self::Fetch(FetchError::Transport { .. }) => ErrorKind::Transport,
            Self::Fetch(FetchError::HttpStatus { .. }) => ErrorKind::HttpStatus,
            Self::Fetch(FetchError::MalformedResponse { .. }) => ErrorKind::MalformedResponse,
            Self::Schema(_) => ErrorKind::Schema,
        }
    }

    pub fn body_excerpt(&self) -> Option<&str> {
        match self {
            Self::Fetch(err) => err.body_excerpt(),
            Self::Schema(_) => None,
        }
    }
}

impl From<&PipelineError> for ErrorBanner {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            body_excerpt: err.body_excerpt().map(str::to_string),
        }
    }
}

/// Runs a full cycle for `selection`. Failures land in the snapshot's error
/// banner with no tables or charts; this never panics on bad payloads.
pub fn run_cycle(
    fetcher: &dyn HttpFetcher,
    cfg: &DashboardConfig,
    selection: &Selection,
) -> DashboardSnapshot {
    let started = Instant::now();
    let mut snapshot = DashboardSnapshot::new(selection.segment, segment_title(selection));

    let outcome = match selection.segment {
        Segment::Equity => equity_cycle(fetcher, cfg, selection, &mut snapshot),
        Segment::Options => options_cycle(fetcher, cfg, selection, &mut snapshot),
        Segment::Futures => {
            snapshot
                .notices
                .push("Futures segment coming soon. This section is under development.".to_string());
            Ok(())
        }
        Segment::Forex => forex_cycle(fetcher, cfg, &mut snapshot),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => info!(
            component = "pipeline",
            event = "cycle.complete",
            segment = selection.segment.as_str(),
            tables = snapshot.tables.len(),
            charts = snapshot.charts.len(),
            elapsed_ms
        ),
        Err(err) => {
            warn!(
                component = "pipeline",
                event = "cycle.error",
                segment = selection.segment.as_str(),
                kind = err.kind().as_str(),
                error = %err,
                elapsed_ms
            );
            snapshot.tables.clear();
            snapshot.charts.clear();
            snapshot.error = Some(ErrorBanner::from(&err));
        }
    }

    snapshot
}

fn segment_title(selection: &Selection) -> String {
    match selection.segment {
        Segment::Equity => "Equity Market Overview".to_string(),
        Segment::Options => format!(
            "Option Chain Screener (Zero to Hero) - {}",
            selection.option_symbol.as_str()
        ),
        Segment::Futures => "Futures".to_string(),
        Segment::Forex => "Real-Time Forex Rates".to_string(),
    }
}

fn equity_cycle(
    fetcher: &dyn HttpFetcher,
    cfg: &DashboardConfig,
    selection: &Selection,
    snapshot: &mut DashboardSnapshot,
) -> Result<(), PipelineError> {
    let doc = fetch_json(fetcher, &Endpoint::nifty_50(), &cfg.fetch)?;
    let rows = filter_by_text(&extract_equity_rows(&doc)?, &selection.search);

    snapshot.tables.push(NamedTable::new(
        "NIFTY 50",
        equity_table(&rows).project(&cfg.display.equity_columns),
    ));

    let (symbols, prices): (Vec<String>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| row.last_price.map(|price| (row.symbol.clone(), price)))
        .unzip();
    snapshot.charts.push(ChartSpec::bar(
        "Live Market Trend",
        "Symbol",
        "Price (INR)",
        symbols,
        prices,
    ));
    snapshot.charts.push(simulated_pnl_chart());
    Ok(())
}

fn options_cycle(
    fetcher: &dyn HttpFetcher,
    cfg: &DashboardConfig,
    selection: &Selection,
    snapshot: &mut DashboardSnapshot,
) -> Result<(), PipelineError> {
    let endpoint = Endpoint::OptionChain {
        symbol: selection.option_symbol,
    };
    let doc = fetch_json(fetcher, &endpoint, &cfg.fetch)?;
    let chain = extract_option_chain(&doc)?;
    let rows = filter_by_text(&drop_incomplete(&chain.rows), &selection.search);

    if let (Some(underlying), Some(timestamp)) = (chain.underlying_value, &chain.timestamp) {
        snapshot
            .notices
            .push(format!("Underlying {underlying} as of {timestamp}"));
    }

    snapshot.tables.push(NamedTable::new(
        "Option Chain",
        option_table(&rows)
            .project(&cfg.display.option_columns)
            .head(cfg.display.option_rows),
    ));

    let Some(pain) = max_pain(&rows) else {
        snapshot
            .notices
            .push("No strikes with both call and put open interest.".to_string());
        return Ok(());
    };

    snapshot.charts.push(ChartSpec::bar(
        format!("Max Pain Point: {}", pain.strike_price),
        "Strike Price",
        "Total OI",
        rows.iter().map(|row| row.strike_price.to_string()).collect(),
        rows.iter().map(total_open_interest).collect(),
    ));
    snapshot.tables.push(NamedTable::new(
        "Top OI Spikes",
        rankings_table(&top_by_open_interest(&rows, cfg.display.top_oi)),
    ));
    snapshot.charts.push(simulated_pnl_chart());
    Ok(())
}

fn forex_cycle(
    fetcher: &dyn HttpFetcher,
    cfg: &DashboardConfig,
    snapshot: &mut DashboardSnapshot,
) -> Result<(), PipelineError> {
    let doc = fetch_json(fetcher, &Endpoint::usd_rates(), &cfg.fetch)?;
    let rates = extract_currency_rates(&doc)?;
    snapshot
        .tables
        .push(NamedTable::new("USD Rates", currency_table(&rates)));
    Ok(())
}

/// Hourly points ending now over the canned PnL sequence.
pub fn simulated_pnl_chart() -> ChartSpec {
    let now = Local::now();
    let last = SIMULATED_PNL.len() as i64 - 1;
    let times = (0..=last)
        .map(|step| {
            (now - ChronoDuration::hours(last - step))
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .collect();

    ChartSpec::line(
        "Cumulative PnL (Simulated)",
        "Time",
        "Profit & Loss",
        times,
        SIMULATED_PNL.to_vec(),
    )
}

/// Runs a fresh cycle against the fetcher on every call.
pub struct LiveSnapshotSource {
    fetcher: Arc<dyn HttpFetcher>,
    config: DashboardConfig,
}

impl LiveSnapshotSource {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, config: DashboardConfig) -> Self {
        Self { fetcher, config }
    }
}

impl DashboardSnapshotSource for LiveSnapshotSource {
    fn snapshot(&self, selection: &Selection) -> DashboardSnapshot {
        run_cycle(self.fetcher.as_ref(), &self.config, selection)
    }
}
