use std::sync::Arc;

use marketdash::{
    dashboard_config_from_env, dashboard_router, demo_fetcher, init_logging, log_app_bind,
    log_app_start, log_source_selected, logging_config_from_env, DashboardConfig,
    DashboardSnapshotSource, HttpFetcher, LiveSnapshotSource, ReqwestBlockingFetcher,
};

const COMPONENT: &str = "dashboard_server";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let config = dashboard_config_from_env()?;
    log_app_start(COMPONENT, &logging_cfg, &config);

    let source = source_from_config(&config)?;
    let app = dashboard_router(source, config.refresh_secs);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn source_from_config(
    config: &DashboardConfig,
) -> Result<Arc<dyn DashboardSnapshotSource>, Box<dyn std::error::Error>> {
    let fetcher: Arc<dyn HttpFetcher> = if config.use_demo {
        log_source_selected(COMPONENT, "demo", Some("MDASH_USE_DEMO"));
        Arc::new(demo_fetcher(&config.fetch))
    } else {
        log_source_selected(COMPONENT, "live", None);
        Arc::new(ReqwestBlockingFetcher::new(config.fetch.timeout_ms)?)
    };

    Ok(Arc::new(LiveSnapshotSource::new(fetcher, config.clone())))
}
