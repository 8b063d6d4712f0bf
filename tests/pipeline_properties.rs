use marketdash::{
    drop_incomplete, equity_table, extract_equity_rows, extract_option_chain, filter_by_text,
    max_pain, run_cycle, top_by_open_interest, total_open_interest, DashboardConfig, Endpoint,
    ErrorKind, HttpResponse, OptionSymbol, Segment, Selection, StaticFetcher, TOP_OI_LIMIT,
};
use serde_json::{json, Value};

fn option_payload(rows: &[(f64, Option<f64>, Option<f64>)]) -> Value {
    let data: Vec<Value> = rows
        .iter()
        .map(|(strike, call, put)| {
            json!({
                "expiryDate": "30-Jan-2025",
                "strikePrice": strike,
                "CE": {"openInterest": call},
                "PE": {"openInterest": put},
            })
        })
        .collect();
    let strikes: Vec<f64> = rows.iter().map(|(strike, _, _)| *strike).collect();
    json!({"records": {"data": data, "strikePrices": strikes}})
}

#[test]
fn equity_extraction_is_one_row_per_element_with_values_preserved() {
    let doc = json!({"data": [
        {"symbol": "TCS", "lastPrice": 3500, "change": 10, "pChange": 0.3, "perChange30d": 1.2},
        {"symbol": "INFY", "lastPrice": 1500, "change": -5, "pChange": -0.3},
        {"symbol": "WIPRO", "lastPrice": null}
    ]});

    let rows = extract_equity_rows(&doc).unwrap();
    assert_eq!(rows.len(), 3);

    let table = equity_table(&rows);
    for (idx, element) in doc["data"].as_array().unwrap().iter().enumerate() {
        for (key, value) in element.as_object().unwrap() {
            let col = table.column_index(key).unwrap();
            assert_eq!(&table.rows[idx][col], value, "row {idx} key {key}");
        }
    }
}

#[test]
fn tcs_filter_example_yields_single_row() {
    let doc = json!({"data": [
        {"symbol": "TCS", "lastPrice": 3500, "change": 10, "pChange": 0.3},
        {"symbol": "INFY", "lastPrice": 1500, "change": -5, "pChange": -0.3}
    ]});

    let rows = filter_by_text(&extract_equity_rows(&doc).unwrap(), "TCS");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "TCS");
}

#[test]
fn retained_option_rows_have_both_sides_and_exact_totals() {
    let doc = option_payload(&[
        (100.0, Some(10.0), Some(5.0)),
        (200.0, None, Some(5.0)),
        (300.0, Some(1.0), None),
        (400.0, Some(0.0), Some(0.0)),
    ]);

    let chain = extract_option_chain(&doc).unwrap();
    let kept = drop_incomplete(&chain.rows);
    let strikes: Vec<f64> = kept.iter().map(|row| row.strike_price).collect();
    assert_eq!(strikes, vec![100.0, 400.0]);
    assert_eq!(total_open_interest(&kept[0]), 15.0);
    assert_eq!(total_open_interest(&kept[1]), 0.0);
}

#[test]
fn max_pain_ties_resolve_to_first_row() {
    let doc = option_payload(&[
        (100.0, Some(1.0), Some(1.0)),
        (200.0, Some(4.0), Some(6.0)),
        (300.0, Some(9.0), Some(1.0)),
    ]);
    let rows = drop_incomplete(&extract_option_chain(&doc).unwrap().rows);
    assert_eq!(max_pain(&rows).unwrap().strike_price, 200.0);
}

#[test]
fn top_oi_listing_is_sorted_and_bounded() {
    let entries: Vec<(f64, Option<f64>, Option<f64>)> = (0..25)
        .map(|i| (1000.0 + 50.0 * i as f64, Some(((i * 7) % 11) as f64), Some(3.0)))
        .collect();
    let rows = drop_incomplete(&extract_option_chain(&option_payload(&entries)).unwrap().rows);

    let top = top_by_open_interest(&rows, TOP_OI_LIMIT);
    assert_eq!(top.len(), 10);
    assert!(top.windows(2).all(|pair| pair[0].total_oi >= pair[1].total_oi));

    let few = top_by_open_interest(&rows[..4], TOP_OI_LIMIT);
    assert_eq!(few.len(), 4);
}

#[test]
fn html_payload_becomes_malformed_response_banner_for_every_exchange_segment() {
    let config = DashboardConfig::default();
    let block_page = HttpResponse::html(200, "<!DOCTYPE html><html>captcha</html>");
    let fetcher = StaticFetcher::new()
        .with_endpoint(&Endpoint::nifty_50(), &config.fetch, block_page.clone())
        .with_endpoint(
            &Endpoint::OptionChain {
                symbol: OptionSymbol::Nifty,
            },
            &config.fetch,
            block_page.clone(),
        )
        .with_endpoint(&Endpoint::usd_rates(), &config.fetch, block_page);

    for segment in [Segment::Equity, Segment::Options, Segment::Forex] {
        let selection = Selection {
            segment,
            ..Selection::default()
        };
        let snapshot = run_cycle(&fetcher, &config, &selection);
        assert_eq!(
            snapshot.error.map(|banner| banner.kind),
            Some(ErrorKind::MalformedResponse)
        );
        assert!(snapshot.tables.is_empty());
    }
}

#[test]
fn non_finite_open_interest_never_wins_max_pain() {
    let doc = json!({"records": {
        "strikePrices": [100, 200],
        "data": [
            {"expiryDate": "30-Jan-2025", "strikePrice": 100,
             "CE": {"openInterest": 500}, "PE": {"openInterest": 5}},
            {"expiryDate": "30-Jan-2025", "strikePrice": 200,
             "CE": {"openInterest": "NaN"}, "PE": {"openInterest": 1}}
        ]
    }});

    let rows = drop_incomplete(&extract_option_chain(&doc).unwrap().rows);
    assert_eq!(rows.len(), 1);
    assert_eq!(max_pain(&rows).unwrap().strike_price, 100.0);
    let top = top_by_open_interest(&rows, TOP_OI_LIMIT);
    assert!(top.iter().all(|ranking| ranking.total_oi.is_finite()));
    assert_eq!(top[0].strike_price, 100.0);
}

#[test]
fn option_cycle_renders_good_rows_when_one_element_is_malformed() {
    let config = DashboardConfig::default();
    let doc = json!({"records": {
        "strikePrices": [100, 200],
        "data": [
            {"expiryDate": "30-Jan-2025", "strikePrice": 100,
             "CE": {"openInterest": 7}, "PE": {"openInterest": 3}},
            {"expiryDate": "30-Jan-2025", "strikePrice": null,
             "CE": {"openInterest": 900}, "PE": {"openInterest": 900}}
        ]
    }});
    let fetcher = StaticFetcher::new().with_endpoint(
        &Endpoint::OptionChain {
            symbol: OptionSymbol::Nifty,
        },
        &config.fetch,
        HttpResponse::json(doc.to_string()),
    );
    let selection = Selection {
        segment: Segment::Options,
        ..Selection::default()
    };

    let snapshot = run_cycle(&fetcher, &config, &selection);
    assert!(snapshot.error.is_none(), "{:?}", snapshot.error);
    assert_eq!(snapshot.tables[0].table.len(), 1);
    assert_eq!(snapshot.charts[0].title, "Max Pain Point: 100");
}
