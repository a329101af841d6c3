use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;
use crate::panel::Panel;

/// Yahoo Finance chart response
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Yahoo symbol for a B3 ticker: `.SA` is appended unless already present
/// or the ticker is an index (`^BVSP`).
pub fn yahoo_symbol(ticker: &str) -> String {
    let ticker = ticker.trim().to_uppercase();
    if ticker.ends_with(".SA") || ticker.starts_with('^') {
        ticker
    } else {
        format!("{}.SA", ticker)
    }
}

pub fn chart_url(base_url: &str, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    let period1 = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
    let period2 = end.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
    format!(
        "{}/{}?period1={}&period2={}&interval=1d",
        base_url,
        symbol.replace('^', "%5E"),
        period1,
        period2
    )
}

/// Parse a chart payload into daily adjusted closes (plain close when the
/// adjusted series is absent). Days without a price are skipped.
pub fn parse_chart(bytes: &[u8]) -> Result<Vec<(NaiveDate, f64)>> {
    let data: YahooChartResponse =
        serde_json::from_slice(bytes).map_err(|e| FundsError::parse("invalid Yahoo Finance payload", e))?;

    if let Some(error) = data.chart.error {
        return Err(FundsError::Parse(format!(
            "Yahoo Finance API error: {} - {}",
            error.code, error.description
        )));
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FundsError::NoData("no data returned from Yahoo Finance".to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let adjusted = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .and_then(|a| a.adjclose);
    let closes = match adjusted {
        Some(values) => values,
        None => result
            .indicators
            .quote
            .into_iter()
            .next()
            .and_then(|q| q.close)
            .ok_or_else(|| FundsError::Parse("no close prices in Yahoo Finance payload".to_string()))?,
    };

    let mut prices = Vec::with_capacity(timestamps.len());
    for (i, &timestamp) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| FundsError::Parse(format!("invalid timestamp {}", timestamp)))?
            .date_naive();
        if let Some(close) = closes.get(i).copied().flatten() {
            prices.push((date, close));
        }
    }
    Ok(prices)
}

/// Daily adjusted closes of `symbol` for `start <= date < end`.
pub fn fetch_history(
    transport: &dyn Transport,
    config: &FundsConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
    info!("Fetching historical prices for {} from {} to {}", symbol, start, end);
    let bytes = transport.get(&chart_url(&config.yahoo_base_url, symbol, start, end))?;
    let prices: Vec<(NaiveDate, f64)> = parse_chart(&bytes)?
        .into_iter()
        .filter(|(d, _)| *d >= start && *d < end)
        .collect();
    debug!("Fetched {} historical prices", prices.len());
    Ok(prices)
}

/// Adjusted closes for listed stocks or indices, one column per Yahoo
/// symbol.
pub fn fetch_stocks(
    transport: &dyn Transport,
    config: &FundsConfig,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Panel> {
    let mut rows = Vec::new();
    for ticker in tickers {
        let symbol = yahoo_symbol(ticker);
        for (date, price) in fetch_history(transport, config, &symbol, start, end)? {
            rows.push((date, symbol.clone(), price));
        }
    }
    Ok(Panel::from_long(rows))
}
