//! HTTP fetching for the exchange and currency endpoints.
//!
//! The exchange API answers bare requests with block pages, so requests carry a
//! browser-like header set and can be preceded by a warm-up GET of the site
//! root to pick up session cookies.

use std::collections::HashMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const DEFAULT_FOREX_URL: &str = "https://api.exchangerate.host/latest";
pub const DEFAULT_EQUITY_INDEX: &str = "NIFTY 50";
pub const DEFAULT_FOREX_BASE: &str = "USD";
pub const DEFAULT_FOREX_SYMBOLS: [&str; 4] = ["INR", "EUR", "JPY", "GBP"];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const ACCEPT: &str = "application/json, text/plain, */*";
const BODY_EXCERPT_CHARS: usize = 300;

// Unreserved characters plus the comma used in symbol lists.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSymbol {
    Nifty,
    BankNifty,
}

impl OptionSymbol {
    pub const ALL: [OptionSymbol; 2] = [OptionSymbol::Nifty, OptionSymbol::BankNifty];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY",
            Self::BankNifty => "BANKNIFTY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NIFTY" => Some(Self::Nifty),
            "BANKNIFTY" => Some(Self::BankNifty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    EquityIndex { index: String },
    OptionChain { symbol: OptionSymbol },
    CurrencyRates { base: String, symbols: Vec<String> },
}

impl Endpoint {
    pub fn nifty_50() -> Self {
        Self::EquityIndex {
            index: DEFAULT_EQUITY_INDEX.to_string(),
        }
    }

    pub fn usd_rates() -> Self {
        Self::CurrencyRates {
            base: DEFAULT_FOREX_BASE.to_string(),
            symbols: DEFAULT_FOREX_SYMBOLS
                .iter()
                .map(|code| (*code).to_string())
                .collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EquityIndex { .. } => "equity_index",
            Self::OptionChain { .. } => "option_chain",
            Self::CurrencyRates { .. } => "currency_rates",
        }
    }

    fn is_exchange(&self) -> bool {
        !matches!(self, Self::CurrencyRates { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub nse_base_url: String,
    pub forex_url: String,
    pub timeout_ms: u64,
    pub warm_up: bool,
    pub harden_headers: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            nse_base_url: DEFAULT_NSE_BASE_URL.to_string(),
            forex_url: DEFAULT_FOREX_URL.to_string(),
            timeout_ms: 10_000,
            warm_up: true,
            harden_headers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub warm_up_url: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client build error: {0}")]
    ClientBuild(String),
    #[error("invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        url: String,
        status: u16,
        body_excerpt: String,
    },
    #[error("malformed response from {url}: {message}")]
    MalformedResponse {
        url: String,
        message: String,
        body_excerpt: String,
    },
}

impl FetchError {
    pub fn body_excerpt(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body_excerpt, .. } | Self::MalformedResponse { body_excerpt, .. } => {
                Some(body_excerpt.as_str())
            }
            Self::ClientBuild(_) | Self::InvalidUrl { .. } | Self::Transport { .. } => None,
        }
    }
}

pub trait HttpFetcher: Send + Sync {
    fn get(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError>;
}

pub fn build_request(endpoint: &Endpoint, cfg: &FetchConfig) -> Result<FetchRequest, FetchError> {
    let base = cfg.nse_base_url.trim_end_matches('/');
    let url = match endpoint {
        Endpoint::EquityIndex { index } => {
            endpoint_url(&format!("{base}/api/equity-stockIndices"), &[("index", index.as_str())])?
        }
        Endpoint::OptionChain { symbol } => endpoint_url(
            &format!("{base}/api/option-chain-indices"),
            &[("symbol", symbol.as_str())],
        )?,
        Endpoint::CurrencyRates { base: currency, symbols } => endpoint_url(
            &cfg.forex_url,
            &[("base", currency.as_str()), ("symbols", symbols.join(",").as_str())],
        )?,
    };

    let mut headers = vec![
        ("User-Agent", USER_AGENT.to_string()),
        ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
    ];
    if cfg.harden_headers {
        headers.push(("Accept", ACCEPT.to_string()));
        if endpoint.is_exchange() {
            headers.push(("Referer", format!("{base}/")));
            headers.push(("X-Requested-With", "XMLHttpRequest".to_string()));
        }
    }

    let warm_up_url = (cfg.warm_up && endpoint.is_exchange()).then(|| format!("{base}/"));

    Ok(FetchRequest {
        url,
        warm_up_url,
        headers,
    })
}

fn endpoint_url(path: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
    let invalid = |message: String| FetchError::InvalidUrl {
        url: path.to_string(),
        message,
    };
    let mut url = Url::parse(path).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }

    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
    Ok(url.into())
}

/// Fetches `endpoint` and decodes the body as JSON.
pub fn fetch_json(
    fetcher: &dyn HttpFetcher,
    endpoint: &Endpoint,
    cfg: &FetchConfig,
) -> Result<Value, FetchError> {
    let result = build_request(endpoint, cfg).and_then(|request| {
        debug!(
            component = "fetch",
            event = "fetch.request",
            endpoint = endpoint.name(),
            url = %request.url,
            warm_up = request.warm_up_url.is_some()
        );
        let response = fetcher.get(&request)?;
        decode_json(&request.url, response)
    });

    if let Err(err) = &result {
        warn!(
            component = "fetch",
            event = "fetch.error",
            endpoint = endpoint.name(),
            error = %err
        );
    }
    result
}

fn decode_json(url: &str, response: HttpResponse) -> Result<Value, FetchError> {
    if !(200..300).contains(&response.status) {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: response.status,
            body_excerpt: excerpt(&response.body),
        });
    }

    if looks_like_html(&response) {
        return Err(FetchError::MalformedResponse {
            url: url.to_string(),
            message: "received an HTML page instead of JSON (likely a block or CAPTCHA page)"
                .to_string(),
            body_excerpt: excerpt(&response.body),
        });
    }

    serde_json::from_str(&response.body).map_err(|err| FetchError::MalformedResponse {
        url: url.to_string(),
        message: format!("invalid JSON: {err}"),
        body_excerpt: excerpt(&response.body),
    })
}

fn looks_like_html(response: &HttpResponse) -> bool {
    let html_type = response
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    html_type || response.body.trim_start().starts_with('<')
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

pub struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .cookie_store(true)
            .build()
            .map_err(|err| FetchError::ClientBuild(err.to_string()))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str, headers: &[(&'static str, String)]) -> Result<HttpResponse, FetchError> {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        if let Some(warm_up_url) = &request.warm_up_url {
            if let Err(err) = self.send(warm_up_url, &request.headers) {
                warn!(
                    component = "fetch",
                    event = "fetch.warm_up.error",
                    url = %warm_up_url,
                    error = %err
                );
            }
        }
        self.send(&request.url, &request.headers)
    }
}

/// Serves canned responses keyed by URL. Unknown URLs fail as transport errors.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, HttpResponse>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// Registers `response` under the URL `endpoint` resolves to. An endpoint
    /// whose URL cannot be built is left unregistered.
    pub fn with_endpoint(self, endpoint: &Endpoint, cfg: &FetchConfig, response: HttpResponse) -> Self {
        match build_request(endpoint, cfg) {
            Ok(request) => self.with(request.url, response),
            Err(_) => self,
        }
    }
}

impl HttpFetcher for StaticFetcher {
    fn get(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        self.responses
            .get(&request.url)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: request.url.clone(),
                message: "no canned response".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equity_url_percent_encodes_index_name() {
        let req = build_request(&Endpoint::nifty_50(), &FetchConfig::default()).unwrap();
        assert_eq!(
            req.url,
            "https://www.nseindia.com/api/equity-stockIndices?index=NIFTY%2050"
        );
        assert_eq!(req.warm_up_url.as_deref(), Some("https://www.nseindia.com/"));
    }

    #[test]
    fn query_values_escape_reserved_characters() {
        let endpoint = Endpoint::EquityIndex {
            index: "NIFTY M&M=1".to_string(),
        };
        let req = build_request(&endpoint, &FetchConfig::default()).unwrap();
        assert_eq!(
            req.url,
            "https://www.nseindia.com/api/equity-stockIndices?index=NIFTY%20M%26M%3D1"
        );
    }

    #[test]
    fn unparseable_base_url_is_invalid_url_error() {
        let cfg = FetchConfig {
            nse_base_url: "not a url".to_string(),
            ..FetchConfig::default()
        };
        let err = build_request(&Endpoint::nifty_50(), &cfg).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let fetcher = StaticFetcher::new();
        let err = fetch_json(&fetcher, &Endpoint::nifty_50(), &cfg).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn option_chain_url_uses_symbol() {
        let endpoint = Endpoint::OptionChain {
            symbol: OptionSymbol::BankNifty,
        };
        let req = build_request(&endpoint, &FetchConfig::default()).unwrap();
        assert_eq!(
            req.url,
            "https://www.nseindia.com/api/option-chain-indices?symbol=BANKNIFTY"
        );
    }

    #[test]
    fn currency_request_skips_warm_up_and_referer() {
        let req = build_request(&Endpoint::usd_rates(), &FetchConfig::default()).unwrap();
        assert_eq!(
            req.url,
            "https://api.exchangerate.host/latest?base=USD&symbols=INR,EUR,JPY,GBP"
        );
        assert!(req.warm_up_url.is_none());
        assert!(req.headers.iter().all(|(name, _)| *name != "Referer"));
    }

    #[test]
    fn plain_headers_only_carry_user_agent_and_language() {
        let cfg = FetchConfig {
            harden_headers: false,
            warm_up: false,
            ..FetchConfig::default()
        };
        let req = build_request(&Endpoint::nifty_50(), &cfg).unwrap();
        let names: Vec<&str> = req.headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["User-Agent", "Accept-Language"]);
        assert!(req.warm_up_url.is_none());
    }

    #[test]
    fn hardened_exchange_headers_include_referer() {
        let req = build_request(&Endpoint::nifty_50(), &FetchConfig::default()).unwrap();
        let names: Vec<&str> = req.headers.iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&"Accept"));
        assert!(names.contains(&"Referer"));
        assert!(names.contains(&"X-Requested-With"));
    }

    #[test]
    fn html_block_page_is_malformed_response() {
        let cfg = FetchConfig::default();
        let fetcher = StaticFetcher::new().with_endpoint(
            &Endpoint::nifty_50(),
            &cfg,
            HttpResponse::html(200, "<html><body>Access Denied</body></html>"),
        );

        let err = fetch_json(&fetcher, &Endpoint::nifty_50(), &cfg).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
        assert!(err.body_excerpt().unwrap().contains("Access Denied"));
    }

    #[test]
    fn html_body_without_content_type_is_still_detected() {
        let cfg = FetchConfig::default();
        let fetcher = StaticFetcher::new().with_endpoint(
            &Endpoint::nifty_50(),
            &cfg,
            HttpResponse {
                status: 200,
                content_type: None,
                body: "  <!DOCTYPE html><p>captcha</p>".to_string(),
            },
        );

        let err = fetch_json(&fetcher, &Endpoint::nifty_50(), &cfg).unwrap_err();
        match err {
            FetchError::MalformedResponse { message, .. } => assert!(message.contains("HTML")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_json_is_malformed_response() {
        let cfg = FetchConfig::default();
        let fetcher = StaticFetcher::new().with_endpoint(
            &Endpoint::usd_rates(),
            &cfg,
            HttpResponse::json("{\"rates\": {"),
        );

        let err = fetch_json(&fetcher, &Endpoint::usd_rates(), &cfg).unwrap_err();
        match err {
            FetchError::MalformedResponse { message, .. } => assert!(message.starts_with("invalid JSON")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_success_status_carries_body_excerpt() {
        let cfg = FetchConfig::default();
        let fetcher = StaticFetcher::new().with_endpoint(
            &Endpoint::nifty_50(),
            &cfg,
            HttpResponse::html(401, "unauthorized"),
        );

        let err = fetch_json(&fetcher, &Endpoint::nifty_50(), &cfg).unwrap_err();
        match err {
            FetchError::HttpStatus {
                status,
                body_excerpt,
                ..
            } => {
                assert_eq!(status, 401);
                assert_eq!(body_excerpt, "unauthorized");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_canned_response_is_transport_error() {
        let err = fetch_json(
            &StaticFetcher::new(),
            &Endpoint::nifty_50(),
            &FetchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.body_excerpt().is_none());
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(400);
        let cut = excerpt(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), BODY_EXCERPT_CHARS + 3);
    }

    #[test]
    fn option_symbol_parse_is_case_insensitive() {
        assert_eq!(OptionSymbol::parse("banknifty"), Some(OptionSymbol::BankNifty));
        assert_eq!(OptionSymbol::parse(" NIFTY "), Some(OptionSymbol::Nifty));
        assert_eq!(OptionSymbol::parse("FINNIFTY"), None);
    }
}
