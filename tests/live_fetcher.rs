use std::net::SocketAddr;

use axum::{
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use marketdash::{fetch_json, Endpoint, FetchConfig, FetchError, ReqwestBlockingFetcher};
use serde_json::{json, Value};

async fn set_session_cookie() -> impl IntoResponse {
    ([(SET_COOKIE, "nsit=warm; Path=/")], "<html>home</html>")
}

async fn failing_home() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>")
}

async fn echo_cookie(headers: HeaderMap) -> impl IntoResponse {
    let cookie = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let agent = headers.contains_key("user-agent");
    (
        [(CONTENT_TYPE, "application/json")],
        json!({"data": [], "cookie": cookie, "agent": agent}).to_string(),
    )
}

async fn block_page() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/html")], "<html>Access Denied</html>")
}

async fn forbidden() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, "{\"error\": \"blocked\"}")
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn fetch_from(addr: SocketAddr, endpoint: Endpoint) -> Result<Value, FetchError> {
    let cfg = FetchConfig {
        nse_base_url: format!("http://{addr}"),
        timeout_ms: 5_000,
        ..FetchConfig::default()
    };
    tokio::task::spawn_blocking(move || {
        let fetcher = ReqwestBlockingFetcher::new(cfg.timeout_ms)?;
        fetch_json(&fetcher, &endpoint, &cfg)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn warm_up_cookie_reaches_api_call() {
    let addr = serve(
        Router::new()
            .route("/", get(set_session_cookie))
            .route("/api/equity-stockIndices", get(echo_cookie)),
    )
    .await;

    let doc = fetch_from(addr, Endpoint::nifty_50()).await.unwrap();
    assert!(doc["cookie"].as_str().unwrap().contains("nsit=warm"));
    assert_eq!(doc["agent"], json!(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_warm_up_still_returns_api_json() {
    let addr = serve(
        Router::new()
            .route("/", get(failing_home))
            .route("/api/equity-stockIndices", get(echo_cookie)),
    )
    .await;

    let doc = fetch_from(addr, Endpoint::nifty_50()).await.unwrap();
    assert_eq!(doc["data"], json!([]));
    assert_eq!(doc["cookie"], json!(""));
}

#[tokio::test(flavor = "multi_thread")]
async fn html_content_type_from_live_server_is_malformed_response() {
    let addr = serve(
        Router::new()
            .route("/", get(set_session_cookie))
            .route("/api/equity-stockIndices", get(block_page)),
    )
    .await;

    let err = fetch_from(addr, Endpoint::nifty_50()).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse { .. }));
    assert!(err.body_excerpt().unwrap().contains("Access Denied"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_from_live_server_is_http_status_error() {
    let addr = serve(
        Router::new()
            .route("/", get(set_session_cookie))
            .route("/api/equity-stockIndices", get(forbidden)),
    )
    .await;

    match fetch_from(addr, Endpoint::nifty_50()).await.unwrap_err() {
        FetchError::HttpStatus {
            status, body_excerpt, ..
        } => {
            assert_eq!(status, 403);
            assert!(body_excerpt.contains("blocked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
