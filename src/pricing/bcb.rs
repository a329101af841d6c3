//! Central bank (BCB) SGS time series API.
//!
//! `GET {base}/bcdata.sgs.{code}/dados?formato=json` answers
//! `[{"data": "02/01/2024", "valor": "0.043739"}, ...]`. Rates come as
//! percent per day.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;
use crate::importers::parse_f64_lenient;

#[derive(Debug, Deserialize)]
struct SgsPoint {
    data: String,
    valor: SgsValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SgsValue {
    Text(String),
    Number(f64),
}

impl SgsValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            SgsValue::Text(s) => parse_f64_lenient(s),
            SgsValue::Number(n) => Some(*n),
        }
    }
}

pub fn sgs_url(base_url: &str, code: u32) -> String {
    format!("{}/bcdata.sgs.{}/dados?formato=json", base_url, code)
}

/// Parse an SGS JSON payload into (date, value) pairs, sorted by date.
pub fn parse_sgs(bytes: &[u8]) -> Result<Vec<(NaiveDate, f64)>> {
    let points: Vec<SgsPoint> =
        serde_json::from_slice(bytes).map_err(|e| FundsError::parse("invalid BCB SGS payload", e))?;

    let mut series = Vec::with_capacity(points.len());
    for point in points {
        let date = NaiveDate::parse_from_str(point.data.trim(), "%d/%m/%Y")
            .map_err(|e| FundsError::parse(format!("invalid BCB date '{}'", point.data), e))?;
        match point.valor.as_f64() {
            Some(value) => series.push((date, value)),
            None => debug!("Skipping BCB point without value on {}", date),
        }
    }
    series.sort_by_key(|(d, _)| *d);
    Ok(series)
}

/// Download series `code` and keep points with `start <= date <= end`.
pub fn fetch_sgs(
    transport: &dyn Transport,
    config: &FundsConfig,
    code: u32,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
    let bytes = transport.get(&sgs_url(&config.bcb_base_url, code))?;
    let series: Vec<(NaiveDate, f64)> = parse_sgs(&bytes)?
        .into_iter()
        .filter(|(d, _)| *d >= start && *d <= end)
        .collect();
    debug!("BCB series {}: {} points in range", code, series.len());
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgs_url() {
        assert_eq!(
            sgs_url("http://api.bcb.gov.br/dados/serie", 12),
            "http://api.bcb.gov.br/dados/serie/bcdata.sgs.12/dados?formato=json"
        );
    }

    #[test]
    fn test_parse_sgs_text_and_numbers() {
        let payload = br#"[{"data":"03/01/2024","valor":"0.043739"},{"data":"02/01/2024","valor":0.04}]"#;
        let series = parse_sgs(payload).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series[1].1, 0.043739);
    }

    #[test]
    fn test_parse_sgs_rejects_html() {
        let err = parse_sgs(b"<html>erro</html>").unwrap_err();
        assert!(matches!(err, FundsError::Parse(_)));
    }
}
