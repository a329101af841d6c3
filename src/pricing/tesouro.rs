//! Tesouro Direto price/rate history (`precotaxatesourodireto.csv`).
//!
//! The daily Selic-linked bond price (PU Base Manhã of "Tesouro Selic")
//! stands in for the CDI when the central bank series is not wanted.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;
use crate::importers::{cell, decode_latin1, parse_csv, parse_date, parse_f64_lenient};

const SELIC_BOND: &str = "Tesouro Selic";

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => decode_latin1(bytes),
    }
}

/// Highest "Tesouro Selic" base price per base date, for
/// `start <= date < end`.
pub fn parse_selic_prices(content: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<(NaiveDate, f64)>> {
    let table = parse_csv(content)?;
    let missing = |name: &str| FundsError::Parse(format!("missing Tesouro CSV column: {}", name));
    let tipo_idx = table.column("Tipo Titulo").ok_or_else(|| missing("Tipo Titulo"))?;
    let base_idx = table.column("Data Base").ok_or_else(|| missing("Data Base"))?;
    let pu_idx = table.column("PU Base Manha").ok_or_else(|| missing("PU Base Manha"))?;

    let mut prices: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in &table.rows {
        if cell(row, tipo_idx) != SELIC_BOND {
            continue;
        }
        let (Some(base_date), Some(pu)) = (
            parse_date(cell(row, base_idx)),
            parse_f64_lenient(cell(row, pu_idx)),
        ) else {
            continue;
        };
        if base_date < start || base_date >= end {
            continue;
        }
        prices
            .entry(base_date)
            .and_modify(|p| *p = p.max(pu))
            .or_insert(pu);
    }

    debug!("Tesouro Selic: {} base dates in range", prices.len());
    Ok(prices.into_iter().collect())
}

pub fn fetch_selic_prices(
    transport: &dyn Transport,
    config: &FundsConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
    let bytes = transport.get(&config.tesouro_csv_url)?;
    parse_selic_prices(&decode(&bytes), start, end)
}
