//! Terminal watcher: re-runs the selected segment on the refresh interval and
//! prints each snapshot as text.

use std::sync::Arc;

use marketdash::{
    dashboard_config_from_env, demo_fetcher, init_logging, log_app_start, log_source_selected,
    log_watch_selection, logging_config_from_env, render_text, run_refresh_loop,
    selection_from_env, HttpFetcher, LiveSnapshotSource, ReqwestBlockingFetcher,
};

const COMPONENT: &str = "market_watch";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let config = dashboard_config_from_env()?;
    log_app_start(COMPONENT, &logging_cfg, &config);

    let max_ticks = match std::env::var("MDASH_WATCH_TICKS") {
        Ok(raw) => Some(raw.trim().parse::<u64>()?),
        Err(_) => None,
    };
    let selection = selection_from_env();
    log_watch_selection(&selection, max_ticks);

    let fetcher: Arc<dyn HttpFetcher> = if config.use_demo {
        log_source_selected(COMPONENT, "demo", Some("MDASH_USE_DEMO"));
        Arc::new(demo_fetcher(&config.fetch))
    } else {
        log_source_selected(COMPONENT, "live", None);
        Arc::new(ReqwestBlockingFetcher::new(config.fetch.timeout_ms)?)
    };
    let source = Arc::new(LiveSnapshotSource::new(fetcher, config.clone()));

    run_refresh_loop(
        source,
        selection,
        config.refresh_interval(),
        max_ticks,
        |tick, snapshot| println!("\n#{tick}\n{}", render_text(&snapshot)),
    )
    .await;

    Ok(())
}
