//! Market data dashboard core.
//!
//! Each refresh cycle fetches one exchange or currency endpoint, checks the
//! payload shape, derives the displayed tables and charts, and packages them
//! in a [`DashboardSnapshot`]. Nothing is kept between cycles.

mod config;
mod dashboard;
mod demo;
mod extract;
mod fetch;
mod observability;
mod pipeline;
mod scheduler;
mod table;
mod transform;

pub use config::{
    clamp_refresh_secs, dashboard_config_from_env, ConfigError, DashboardConfig, DisplayConfig,
    DEFAULT_EQUITY_COLUMNS, DEFAULT_OPTION_COLUMNS, DEFAULT_REFRESH_SECS, MAX_REFRESH_SECS,
    MIN_REFRESH_SECS,
};
pub use dashboard::{
    dashboard_router, format_cell, render_dashboard_html, render_panel_html, render_table_html,
    render_text, ChartKind, ChartSpec, DashboardQuery, DashboardSnapshot, DashboardSnapshotSource,
    ErrorBanner, InMemorySnapshotSource, NamedTable,
};
pub use demo::{demo_equity_payload, demo_fetcher, demo_forex_payload, demo_option_chain_payload};
pub use extract::{
    currency_table, equity_table, extract_currency_rates, extract_equity_rows,
    extract_option_chain, option_table, CurrencyRate, EquityRow, OptionChain, OptionLeg,
    OptionRow, SchemaError,
};
pub use fetch::{
    build_request, fetch_json, Endpoint, FetchConfig, FetchError, FetchRequest, HttpFetcher,
    HttpResponse, OptionSymbol, ReqwestBlockingFetcher, StaticFetcher, DEFAULT_FOREX_URL,
    DEFAULT_NSE_BASE_URL,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, log_watch_selection,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use pipeline::{
    run_cycle, selection_from_env, simulated_pnl_chart, ErrorKind, LiveSnapshotSource,
    PipelineError, Segment, Selection, SIMULATED_PNL,
};
pub use scheduler::run_refresh_loop;
pub use table::{flatten_record, Record, Table};
pub use transform::{
    drop_incomplete, filter_by_text, max_pain, rankings_table, top_by_open_interest,
    total_open_interest, MaxPain, OiRanking, SearchField, TOP_OI_LIMIT,
};
