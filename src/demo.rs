//! Bundled sample payloads so the dashboard runs without network access.

use serde_json::json;

use crate::fetch::{Endpoint, FetchConfig, HttpResponse, OptionSymbol, StaticFetcher};

pub fn demo_fetcher(cfg: &FetchConfig) -> StaticFetcher {
    let mut fetcher = StaticFetcher::new()
        .with_endpoint(
            &Endpoint::nifty_50(),
            cfg,
            HttpResponse::json(demo_equity_payload().to_string()),
        )
        .with_endpoint(
            &Endpoint::usd_rates(),
            cfg,
            HttpResponse::json(demo_forex_payload().to_string()),
        );

    for symbol in OptionSymbol::ALL {
        fetcher = fetcher.with_endpoint(
            &Endpoint::OptionChain { symbol },
            cfg,
            HttpResponse::json(demo_option_chain_payload(symbol).to_string()),
        );
    }

    fetcher
}

pub fn demo_equity_payload() -> serde_json::Value {
    let stamp = "16-Oct-2026 15:30:00";
    let rows: [(&str, f64, f64, f64); 7] = [
        ("NIFTY 50", 24_850.35, 112.4, 0.45),
        ("RELIANCE", 2_912.6, -14.2, -0.49),
        ("TCS", 4_105.1, 31.75, 0.78),
        ("HDFCBANK", 1_688.45, 9.3, 0.55),
        ("INFY", 1_902.0, -6.55, -0.34),
        ("ICICIBANK", 1_245.8, 4.1, 0.33),
        ("M&M", 2_955.25, 41.0, 1.41),
    ];

    let data: Vec<serde_json::Value> = rows
        .iter()
        .map(|&(symbol, last, change, p_change)| {
            let previous = last - change;
            json!({
                "symbol": symbol,
                "open": previous,
                "dayHigh": last.max(previous) * 1.004,
                "dayLow": last.min(previous) * 0.996,
                "lastPrice": last,
                "previousClose": previous,
                "change": change,
                "pChange": p_change,
                "totalTradedVolume": 1_250_000,
                "totalTradedValue": 3_640_000_000.0_f64,
                "lastUpdateTime": stamp,
                "yearHigh": last * 1.18,
                "yearLow": last * 0.81,
            })
        })
        .collect();

    json!({ "name": "NIFTY 50", "data": data })
}

pub fn demo_option_chain_payload(symbol: OptionSymbol) -> serde_json::Value {
    let (spot, step) = match symbol {
        OptionSymbol::Nifty => (24_850.0_f64, 50.0),
        OptionSymbol::BankNifty => (52_300.0_f64, 100.0),
    };
    let atm = (spot / step).round() * step;
    let expiries = ["30-Oct-2026", "27-Nov-2026"];

    let mut data = Vec::new();
    let mut strikes = Vec::new();
    for offset in -6i32..=6 {
        let strike = atm + f64::from(offset) * step;
        strikes.push(json!(strike));
        let distance = f64::from(offset.unsigned_abs());
        for (idx, expiry) in expiries.iter().enumerate() {
            let scale = if idx == 0 { 1.0 } else { 0.4 };
            let call_oi = ((90_000.0 - 9_000.0 * distance) * scale + f64::from(offset.max(0)) * 7_500.0).round();
            let put_oi = ((85_000.0 - 8_000.0 * distance) * scale + f64::from((-offset).max(0)) * 6_000.0).round();
            let mut row = json!({
                "strikePrice": strike,
                "expiryDate": expiry,
                "CE": {
                    "strikePrice": strike,
                    "expiryDate": expiry,
                    "openInterest": call_oi,
                    "changeinOpenInterest": (call_oi * 0.03).round(),
                    "lastPrice": ((spot - strike).max(0.0) + 40.0 / (1.0 + distance)).round(),
                },
            });
            // Deep out-of-the-money puts on the far expiry have no quotes.
            if !(idx == 1 && offset > 4) {
                row["PE"] = json!({
                    "strikePrice": strike,
                    "expiryDate": expiry,
                    "openInterest": put_oi,
                    "changeinOpenInterest": (put_oi * -0.02).round(),
                    "lastPrice": ((strike - spot).max(0.0) + 38.0 / (1.0 + distance)).round(),
                });
            }
            data.push(row);
        }
    }

    json!({
        "records": {
            "expiryDates": expiries,
            "timestamp": "16-Oct-2026 15:30:00",
            "underlyingValue": spot,
            "strikePrices": strikes,
            "data": data,
        }
    })
}

pub fn demo_forex_payload() -> serde_json::Value {
    json!({
        "base": "USD",
        "date": "2026-10-16",
        "rates": { "INR": 84.12, "EUR": 0.918, "JPY": 149.6, "GBP": 0.771 }
    })
}
