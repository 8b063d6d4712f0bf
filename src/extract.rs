//! Shape-checked conversion of endpoint payloads into typed rows.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::table::{flatten_record, Record, Table};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing key `{path}`")]
    MissingKey { path: String },
    #[error("`{path}` should be {expected}")]
    WrongType { path: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityRow {
    pub symbol: String,
    pub last_price: Option<f64>,
    pub change: Option<f64>,
    pub p_change: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub previous_close: Option<f64>,
    pub total_traded_volume: Option<f64>,
    pub total_traded_value: Option<f64>,
    pub last_update_time: Option<String>,
    /// The source object, flattened, with every field untouched.
    pub record: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OptionLeg {
    pub open_interest: Option<f64>,
    pub change_in_open_interest: Option<f64>,
    pub last_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionRow {
    pub expiry_date: String,
    pub strike_price: f64,
    pub call: Option<OptionLeg>,
    pub put: Option<OptionLeg>,
    pub record: Record,
}

impl OptionRow {
    pub fn call_open_interest(&self) -> Option<f64> {
        self.call.and_then(|leg| leg.open_interest)
    }

    pub fn put_open_interest(&self) -> Option<f64> {
        self.put.and_then(|leg| leg.open_interest)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionChain {
    pub rows: Vec<OptionRow>,
    pub strike_prices: Vec<f64>,
    pub expiry_dates: Vec<String>,
    pub timestamp: Option<String>,
    pub underlying_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRate {
    pub currency: String,
    pub rate: f64,
}

pub fn extract_equity_rows(doc: &Value) -> Result<Vec<EquityRow>, SchemaError> {
    let root = as_object(doc, "$")?;
    let data = as_array(require(root, "data", "data")?, "data")?;

    data.iter()
        .enumerate()
        .map(|(idx, item)| {
            let path = format!("data[{idx}]");
            let object = as_object(item, &path)?;
            let symbol = require_string(object, "symbol", &path)?;

            Ok(EquityRow {
                symbol,
                last_price: number_field(object, "lastPrice"),
                change: number_field(object, "change"),
                p_change: number_field(object, "pChange"),
                open: number_field(object, "open"),
                day_high: number_field(object, "dayHigh"),
                day_low: number_field(object, "dayLow"),
                previous_close: number_field(object, "previousClose"),
                total_traded_volume: number_field(object, "totalTradedVolume"),
                total_traded_value: number_field(object, "totalTradedValue"),
                last_update_time: object
                    .get("lastUpdateTime")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                record: flatten_record(object),
            })
        })
        .collect()
}

pub fn extract_option_chain(doc: &Value) -> Result<OptionChain, SchemaError> {
    let root = as_object(doc, "$")?;
    let records = as_object(require(root, "records", "records")?, "records")?;
    let data = as_array(require(records, "data", "records.data")?, "records.data")?;
    let strikes = as_array(
        require(records, "strikePrices", "records.strikePrices")?,
        "records.strikePrices",
    )?;

    let strike_prices = strikes.iter().filter_map(lenient_number).collect();

    // A malformed element is an incomplete row: skip it and keep the rest.
    let rows = data
        .iter()
        .enumerate()
        .filter_map(
            |(idx, item)| match option_row(item, &format!("records.data[{idx}]")) {
                Ok(row) => Some(row),
                Err(err) => {
                    debug!(
                        component = "extract",
                        event = "option_row.skipped",
                        error = %err
                    );
                    None
                }
            },
        )
        .collect();

    let expiry_dates = records
        .get("expiryDates")
        .and_then(Value::as_array)
        .map(|dates| {
            dates
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(OptionChain {
        rows,
        strike_prices,
        expiry_dates,
        timestamp: records
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string),
        underlying_value: number_field(records, "underlyingValue"),
    })
}

fn option_row(item: &Value, path: &str) -> Result<OptionRow, SchemaError> {
    let object = as_object(item, path)?;
    let strike_price = match object.get("strikePrice") {
        None => {
            return Err(SchemaError::MissingKey {
                path: format!("{path}.strikePrice"),
            })
        }
        Some(value) => lenient_number(value).ok_or_else(|| SchemaError::WrongType {
            path: format!("{path}.strikePrice"),
            expected: "a number",
        })?,
    };

    // Newer payloads name the per-row expiry `expiryDates`.
    let expiry_key = if object.contains_key("expiryDate") {
        "expiryDate"
    } else {
        "expiryDates"
    };
    let expiry_date = match object.get(expiry_key) {
        None => {
            return Err(SchemaError::MissingKey {
                path: format!("{path}.expiryDate"),
            })
        }
        Some(Value::String(date)) => date.clone(),
        Some(_) => {
            return Err(SchemaError::WrongType {
                path: format!("{path}.{expiry_key}"),
                expected: "a string",
            })
        }
    };

    let mut record = flatten_record(object);
    if expiry_key != "expiryDate" {
        if let Some(value) = record.remove(expiry_key) {
            record.insert("expiryDate".to_string(), value);
        }
    }

    Ok(OptionRow {
        expiry_date,
        strike_price,
        call: option_leg(object, "CE", path)?,
        put: option_leg(object, "PE", path)?,
        record,
    })
}

fn option_leg(
    object: &Map<String, Value>,
    side: &str,
    path: &str,
) -> Result<Option<OptionLeg>, SchemaError> {
    match object.get(side) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(leg)) => Ok(Some(OptionLeg {
            open_interest: number_field(leg, "openInterest"),
            change_in_open_interest: number_field(leg, "changeinOpenInterest"),
            last_price: number_field(leg, "lastPrice"),
        })),
        Some(_) => Err(SchemaError::WrongType {
            path: format!("{path}.{side}"),
            expected: "an object",
        }),
    }
}

pub fn extract_currency_rates(doc: &Value) -> Result<Vec<CurrencyRate>, SchemaError> {
    let root = as_object(doc, "$")?;
    let rates = as_object(require(root, "rates", "rates")?, "rates")?;

    rates
        .iter()
        .map(|(code, value)| {
            value
                .as_f64()
                .map(|rate| CurrencyRate {
                    currency: code.clone(),
                    rate,
                })
                .ok_or_else(|| SchemaError::WrongType {
                    path: format!("rates.{code}"),
                    expected: "a number",
                })
        })
        .collect()
}

pub fn equity_table(rows: &[EquityRow]) -> Table {
    Table::from_records(rows.iter().map(|row| &row.record))
}

pub fn option_table(rows: &[OptionRow]) -> Table {
    Table::from_records(rows.iter().map(|row| &row.record))
}

pub fn currency_table(rates: &[CurrencyRate]) -> Table {
    let mut table = Table::new(vec!["Currency".to_string(), "Rate".to_string()]);
    table.rows = rates
        .iter()
        .map(|rate| vec![Value::from(rate.currency.clone()), Value::from(rate.rate)])
        .collect();
    table
}

fn require<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, SchemaError> {
    object.get(key).ok_or_else(|| SchemaError::MissingKey {
        path: path.to_string(),
    })
}

fn require_string(
    object: &Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<String, SchemaError> {
    let path = format!("{parent}.{key}");
    match require(object, key, &path)? {
        Value::String(value) => Ok(value.clone()),
        _ => Err(SchemaError::WrongType {
            path,
            expected: "a string",
        }),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::WrongType {
        path: path.to_string(),
        expected: "an object",
    })
}

fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| SchemaError::WrongType {
        path: path.to_string(),
        expected: "a list",
    })
}

fn number_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(lenient_number)
}

/// Accepts JSON numbers and numeric strings (the exchange sends both).
fn lenient_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}
