//! Pure derivations over extracted rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{EquityRow, OptionRow};
use crate::table::Table;

pub const TOP_OI_LIMIT: usize = 10;

/// Rows that expose one designated text field for search.
pub trait SearchField {
    fn search_field(&self) -> &str;
}

impl SearchField for EquityRow {
    fn search_field(&self) -> &str {
        &self.symbol
    }
}

impl SearchField for OptionRow {
    fn search_field(&self) -> &str {
        &self.expiry_date
    }
}

/// Case-insensitive substring match on the designated field. Blank terms keep every row.
pub fn filter_by_text<T: SearchField + Clone>(rows: &[T], term: &str) -> Vec<T> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }

    rows.iter()
        .filter(|row| row.search_field().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Keeps option rows carrying both call and put open interest.
pub fn drop_incomplete(rows: &[OptionRow]) -> Vec<OptionRow> {
    rows.iter()
        .filter(|row| row.call_open_interest().is_some() && row.put_open_interest().is_some())
        .cloned()
        .collect()
}

pub fn total_open_interest(row: &OptionRow) -> f64 {
    row.call_open_interest().unwrap_or(0.0) + row.put_open_interest().unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OiRanking {
    pub expiry_date: String,
    pub strike_price: f64,
    pub call_oi: f64,
    pub put_oi: f64,
    pub total_oi: f64,
}

impl OiRanking {
    fn from_row(row: &OptionRow) -> Self {
        Self {
            expiry_date: row.expiry_date.clone(),
            strike_price: row.strike_price,
            call_oi: row.call_open_interest().unwrap_or(0.0),
            put_oi: row.put_open_interest().unwrap_or(0.0),
            total_oi: total_open_interest(row),
        }
    }
}

/// Highest total open interest first; equal totals keep input order.
pub fn top_by_open_interest(rows: &[OptionRow], n: usize) -> Vec<OiRanking> {
    let mut ranked: Vec<OiRanking> = rows.iter().map(OiRanking::from_row).collect();
    ranked.sort_by(|a, b| b.total_oi.total_cmp(&a.total_oi));
    ranked.truncate(n);
    ranked
}

pub fn rankings_table(rankings: &[OiRanking]) -> Table {
    let mut table = Table::new(
        ["strikePrice", "CE.openInterest", "PE.openInterest", "totalOI"]
            .iter()
            .map(|name| (*name).to_string())
            .collect(),
    );
    table.rows = rankings
        .iter()
        .map(|ranking| {
            vec![
                Value::from(ranking.strike_price),
                Value::from(ranking.call_oi),
                Value::from(ranking.put_oi),
                Value::from(ranking.total_oi),
            ]
        })
        .collect();
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxPain {
    pub strike_price: f64,
    pub total_oi: f64,
}

/// Strike with the largest total open interest; the first row wins ties.
pub fn max_pain(rows: &[OptionRow]) -> Option<MaxPain> {
    let mut best: Option<MaxPain> = None;
    for row in rows {
        let total_oi = total_open_interest(row);
        match best {
            Some(current) if total_oi <= current.total_oi => {}
            _ => {
                best = Some(MaxPain {
                    strike_price: row.strike_price,
                    total_oi,
                })
            }
        }
    }
    best
}
