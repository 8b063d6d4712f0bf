//! Dashboard snapshot model, HTML/text rendering and HTTP routes.

use std::sync::{Arc, RwLock};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::config::clamp_refresh_secs;
use crate::fetch::OptionSymbol;
use crate::pipeline::{ErrorKind, Segment, Selection};
use crate::table::Table;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub segment: Segment,
    pub title: String,
    pub generated_at: String,
    pub tables: Vec<NamedTable>,
    pub charts: Vec<ChartSpec>,
    pub notices: Vec<String>,
    pub error: Option<ErrorBanner>,
}

impl DashboardSnapshot {
    pub fn new(segment: Segment, title: impl Into<String>) -> Self {
        Self {
            segment,
            title: title.into(),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            tables: Vec::new(),
            charts: Vec::new(),
            notices: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTable {
    pub title: String,
    pub table: Table,
}

impl NamedTable {
    pub fn new(title: impl Into<String>, table: Table) -> Self {
        Self {
            title: title.into(),
            table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub x: Vec<String>,
    pub y: Vec<f64>,
}

impl ChartSpec {
    pub fn bar(
        title: impl Into<String>,
        x_title: impl Into<String>,
        y_title: impl Into<String>,
        x: Vec<String>,
        y: Vec<f64>,
    ) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: title.into(),
            x_title: x_title.into(),
            y_title: y_title.into(),
            x,
            y,
        }
    }

    pub fn line(
        title: impl Into<String>,
        x_title: impl Into<String>,
        y_title: impl Into<String>,
        x: Vec<String>,
        y: Vec<f64>,
    ) -> Self {
        Self {
            kind: ChartKind::Line,
            ..Self::bar(title, x_title, y_title, x, y)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBanner {
    pub kind: ErrorKind,
    pub message: String,
    pub body_excerpt: Option<String>,
}

pub trait DashboardSnapshotSource: Send + Sync + 'static {
    fn snapshot(&self, selection: &Selection) -> DashboardSnapshot;
}

/// Returns the same snapshot for every selection.
#[derive(Clone)]
pub struct InMemorySnapshotSource {
    inner: Arc<RwLock<DashboardSnapshot>>,
}

impl InMemorySnapshotSource {
    pub fn new(snapshot: DashboardSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn replace_snapshot(&self, snapshot: DashboardSnapshot) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory snapshot lock should not be poisoned");
        *guard = snapshot;
    }
}

impl DashboardSnapshotSource for InMemorySnapshotSource {
    fn snapshot(&self, _selection: &Selection) -> DashboardSnapshot {
        self.inner
            .read()
            .expect("in-memory snapshot lock should not be poisoned")
            .clone()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub segment: Option<String>,
    pub symbol: Option<String>,
    pub q: Option<String>,
    /// Kept raw so a malformed value falls back to the default instead of
    /// rejecting the request.
    pub refresh: Option<String>,
}

impl DashboardQuery {
    pub fn selection(&self) -> Selection {
        Selection::from_parts(
            self.segment.as_deref(),
            self.symbol.as_deref(),
            self.q.as_deref(),
        )
    }

    pub fn refresh_secs(&self, default_secs: u64) -> u64 {
        let requested = self
            .refresh
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        clamp_refresh_secs(requested.unwrap_or(default_secs))
    }
}

pub fn dashboard_router(source: Arc<dyn DashboardSnapshotSource>, refresh_secs: u64) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/panel", get(get_dashboard_panel))
        .route("/dashboard/snapshot", get(get_dashboard_snapshot))
        .with_state(DashboardAppState {
            source,
            refresh_secs: clamp_refresh_secs(refresh_secs),
        })
}

pub fn render_dashboard_html(
    snapshot: &DashboardSnapshot,
    selection: &Selection,
    refresh_secs: u64,
) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>AutoTrade Pro Dashboard</title>\n");
    out.push_str(&format!("<script src=\"{PLOTLY_CDN}\"></script>\n"));
    out.push_str("<style>:root{--bg:#f4f6f8;--card:#fff;--ink:#17212b;--muted:#5f6a73;--line:#d7dce1;--head:#14343f;--err:#fdecea;--errink:#8a1c13;--info:#e8f3fb;--infoink:#0c4a6e}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Segoe UI\",sans-serif;background:var(--bg)}.layout{display:flex;min-height:100vh}.sidebar{width:260px;padding:20px;background:#102f3a;color:#eef5f7}.sidebar h2{margin-top:0;font-size:1.1rem}.sidebar label{display:block;margin:14px 0 6px;font-size:.85rem}.sidebar select,.sidebar input[type=text]{width:100%;padding:6px;border-radius:6px;border:1px solid #3b5b66}.main{flex:1;padding:20px;overflow:auto}.hero h1{margin:0 0 6px}.hero p{margin:0 0 12px;color:var(--muted)}.card{margin-top:16px;background:var(--card);border:1px solid var(--line);border-radius:12px;padding:12px;overflow:auto}table{border-collapse:collapse;width:100%}thead th{background:var(--head);color:#f2f7f9;font-size:.8rem;padding:8px;text-align:left}tbody td{font-size:.84rem;padding:6px 8px;border-bottom:1px solid var(--line);white-space:nowrap}.banner{margin-top:12px;padding:10px 14px;border-radius:8px}.banner-error{background:var(--err);color:var(--errink)}.banner-info{background:var(--info);color:var(--infoink)}.banner pre{white-space:pre-wrap;font-size:.75rem}.chart{height:380px}.meta{font-size:.8rem;color:var(--muted)}</style>\n");
    out.push_str("</head><body><div class=\"layout\">\n");
    out.push_str(&render_sidebar(selection, refresh_secs));
    out.push_str("<main class=\"main\">\n");
    out.push_str("<section class=\"hero\"><h1>AutoTrade Pro Dashboard</h1>");
    out.push_str("<p>Live Indian market data: equities, option chain open interest and currency rates.</p></section>\n");
    out.push_str("<div id=\"panel\">");
    out.push_str(&render_panel_html(snapshot));
    out.push_str("</div></main></div>\n");
    out.push_str(&render_script(refresh_secs));
    out.push_str("</body></html>\n");
    out
}

/// The refreshable main panel: title, banners, tables and chart mounts.
pub fn render_panel_html(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("<h2>{}</h2>", escape_html(&snapshot.title)));
    out.push_str(&format!(
        "<div class=\"meta\">Generated: {}</div>\n",
        escape_html(&snapshot.generated_at)
    ));

    if let Some(banner) = &snapshot.error {
        out.push_str("<div class=\"banner banner-error\" role=\"alert\">");
        out.push_str(&format!(
            "<b>Error fetching data ({}):</b> {}",
            banner.kind.as_str(),
            escape_html(&banner.message)
        ));
        if let Some(excerpt) = &banner.body_excerpt {
            out.push_str("<details><summary>Raw response</summary><pre>");
            out.push_str(&escape_html(excerpt));
            out.push_str("</pre></details>");
        }
        out.push_str("</div>\n");
    }

    for notice in &snapshot.notices {
        out.push_str("<div class=\"banner banner-info\">");
        out.push_str(&escape_html(notice));
        out.push_str("</div>\n");
    }

    for named in &snapshot.tables {
        out.push_str("<section class=\"card\">");
        out.push_str(&format!("<h3>{}</h3>", escape_html(&named.title)));
        out.push_str(&render_table_html(&named.table));
        out.push_str("</section>\n");
    }

    for idx in 0..snapshot.charts.len() {
        out.push_str(&format!(
            "<section class=\"card\"><div class=\"chart\" id=\"chart-{idx}\"></div></section>\n"
        ));
    }

    out.push_str("<script type=\"application/json\" id=\"chart-data\">");
    out.push_str(&charts_json(&snapshot.charts));
    out.push_str("</script>\n");
    out
}

pub fn render_table_html(table: &Table) -> String {
    let mut out = String::from("<table><thead><tr>");
    for column in &table.columns {
        out.push_str("<th>");
        out.push_str(&escape_html(column));
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody>\n");
    for (idx, row) in table.rows.iter().enumerate() {
        out.push_str(&format!("<tr data-row=\"{idx}\">"));
        for value in row {
            out.push_str("<td>");
            out.push_str(&escape_html(&format_cell(value)));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table>");
    out
}

/// Plain-text rendering for terminal output.
pub fn render_text(snapshot: &DashboardSnapshot) -> String {
    let mut out = format!("== {} ({}) ==\n", snapshot.title, snapshot.generated_at);

    if let Some(banner) = &snapshot.error {
        out.push_str(&format!("ERROR [{}] {}\n", banner.kind.as_str(), banner.message));
        if let Some(excerpt) = &banner.body_excerpt {
            out.push_str(&format!("  raw: {excerpt}\n"));
        }
    }
    for notice in &snapshot.notices {
        out.push_str(&format!("NOTE {notice}\n"));
    }

    for named in &snapshot.tables {
        out.push_str(&format!("\n-- {} --\n", named.title));
        out.push_str(&render_table_text(&named.table));
    }

    for chart in &snapshot.charts {
        out.push_str(&format!(
            "\n[{} chart] {} ({} points)\n",
            match chart.kind {
                ChartKind::Bar => "bar",
                ChartKind::Line => "line",
            },
            chart.title,
            chart.y.len()
        ));
    }

    out
}

fn render_table_text(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(format_cell).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            cells
                .iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    out.push_str(&line(table.columns.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    if cells.is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn render_sidebar(selection: &Selection, refresh_secs: u64) -> String {
    let mut out = String::from("<aside class=\"sidebar\"><h2>Settings</h2>\n");
    out.push_str("<form id=\"settings-form\" method=\"get\" action=\"/dashboard\">\n");

    out.push_str(&format!(
        "<label for=\"refresh\">Refresh Interval (seconds): <span id=\"refresh-value\">{refresh_secs}</span></label>"
    ));
    out.push_str(&format!(
        "<input type=\"range\" id=\"refresh\" name=\"refresh\" min=\"3\" max=\"60\" value=\"{refresh_secs}\">\n"
    ));

    out.push_str("<label for=\"segment\">Market Segment</label><select id=\"segment\" name=\"segment\">");
    for segment in Segment::ALL {
        out.push_str(&option_tag(
            segment.as_str(),
            segment == selection.segment,
        ));
    }
    out.push_str("</select>\n");

    out.push_str("<label for=\"symbol\">Option Symbol</label><select id=\"symbol\" name=\"symbol\">");
    for symbol in OptionSymbol::ALL {
        out.push_str(&option_tag(
            symbol.as_str(),
            symbol == selection.option_symbol,
        ));
    }
    out.push_str("</select>\n");

    out.push_str(&format!(
        "<label for=\"q\">Search Stock/Option</label><input type=\"text\" id=\"q\" name=\"q\" value=\"{}\">\n",
        escape_html(&selection.search)
    ));
    out.push_str("</form></aside>\n");
    out
}

fn option_tag(value: &str, selected: bool) -> String {
    let value = escape_html(value);
    if selected {
        format!("<option value=\"{value}\" selected>{value}</option>")
    } else {
        format!("<option value=\"{value}\">{value}</option>")
    }
}

fn render_script(refresh_secs: u64) -> String {
    let refresh_ms = refresh_secs.saturating_mul(1_000);
    format!(
        "<script>\n\
const form = document.getElementById('settings-form');\n\
form.addEventListener('change', () => form.submit());\n\
document.getElementById('refresh').addEventListener('input', (e) => {{ document.getElementById('refresh-value').textContent = e.target.value; }});\n\
function drawCharts() {{\n\
  const node = document.getElementById('chart-data');\n\
  if (!node || typeof Plotly === 'undefined') return;\n\
  JSON.parse(node.textContent).forEach((c, i) => {{\n\
    const trace = c.kind === 'bar'\n\
      ? {{ type: 'bar', x: c.x, y: c.y, name: c.title }}\n\
      : {{ type: 'scatter', mode: 'lines+markers', x: c.x, y: c.y, name: c.title }};\n\
    Plotly.react('chart-' + i, [trace], {{ title: c.title, xaxis: {{ title: c.x_title }}, yaxis: {{ title: c.y_title }} }}, {{ responsive: true }});\n\
  }});\n\
}}\n\
async function refresh() {{\n\
  try {{\n\
    const res = await fetch('/dashboard/panel' + window.location.search);\n\
    if (!res.ok) return;\n\
    document.getElementById('panel').innerHTML = await res.text();\n\
    drawCharts();\n\
  }} catch (err) {{ console.error(err); }}\n\
}}\n\
drawCharts();\n\
setInterval(refresh, {refresh_ms});\n\
</script>\n"
    )
}

fn charts_json(charts: &[ChartSpec]) -> String {
    serde_json::to_string(charts)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Clone)]
struct DashboardAppState {
    source: Arc<dyn DashboardSnapshotSource>,
    refresh_secs: u64,
}

async fn load_snapshot(
    state: &DashboardAppState,
    selection: Selection,
    route: &'static str,
) -> Result<DashboardSnapshot, StatusCode> {
    info!(
        component = "dashboard_server",
        event = "http.snapshot.request",
        route,
        segment = selection.segment.as_str(),
        symbol = selection.option_symbol.as_str()
    );

    let source = Arc::clone(&state.source);
    tokio::task::spawn_blocking(move || source.snapshot(&selection))
        .await
        .map_err(|err| {
            error!(
                component = "dashboard_server",
                event = "http.snapshot.join_error",
                route,
                error = %err
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_dashboard_html(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let selection = query.selection();
    let refresh_secs = query.refresh_secs(state.refresh_secs);
    let snapshot = load_snapshot(&state, selection.clone(), "/dashboard").await?;
    Ok(Html(render_dashboard_html(&snapshot, &selection, refresh_secs)))
}

async fn get_dashboard_panel(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let snapshot = load_snapshot(&state, query.selection(), "/dashboard/panel").await?;
    Ok(Html(render_panel_html(&snapshot)))
}

async fn get_dashboard_snapshot(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let snapshot = load_snapshot(&state, query.selection(), "/dashboard/snapshot").await?;
    Ok(Json(snapshot))
}
