// Pricing module - benchmark series from BCB, Tesouro Direto and Yahoo Finance

pub mod bcb;
pub mod tesouro;
pub mod yahoo;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;
use crate::panel::Panel;

pub use yahoo::fetch_stocks;

const IBOV_SYMBOL: &str = "^BVSP";

/// Where the CDI series comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CdiMethod {
    /// BCB SGS 12, daily CDI
    Bcb,
    /// BCB SGS 11, daily Selic
    Selic,
    /// Tesouro Selic bond base price
    Tesouro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Benchmark {
    Cdi(CdiMethod),
    ImaB,
    ImaB5,
    ImaB5Plus,
    Ibov,
}

impl Benchmark {
    /// Column name of the series. Every CDI method is labelled "CDI".
    pub fn label(&self) -> &'static str {
        match self {
            Benchmark::Cdi(_) => "CDI",
            Benchmark::ImaB => "IMA-B",
            Benchmark::ImaB5 => "IMA-B 5",
            Benchmark::ImaB5Plus => "IMA-B 5+",
            Benchmark::Ibov => "IBOV",
        }
    }

    /// BCB SGS series code, for series published there
    pub fn sgs_code(&self) -> Option<u32> {
        match self {
            Benchmark::Cdi(CdiMethod::Bcb) => Some(12),
            Benchmark::Cdi(CdiMethod::Selic) => Some(11),
            Benchmark::ImaB => Some(12466),
            Benchmark::ImaB5 => Some(12467),
            Benchmark::ImaB5Plus => Some(12468),
            Benchmark::Cdi(CdiMethod::Tesouro) | Benchmark::Ibov => None,
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Benchmark::Cdi(CdiMethod::Bcb) => f.write_str("CDI-BCB"),
            Benchmark::Cdi(CdiMethod::Selic) => f.write_str("CDI-SELIC"),
            Benchmark::Cdi(CdiMethod::Tesouro) => f.write_str("CDI-TESOURO"),
            other => f.write_str(other.label()),
        }
    }
}

impl FromStr for Benchmark {
    type Err = FundsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "CDI" | "CDI-BCB" => Ok(Benchmark::Cdi(CdiMethod::Bcb)),
            "CDI-SELIC" => Ok(Benchmark::Cdi(CdiMethod::Selic)),
            "CDI-TESOURO" => Ok(Benchmark::Cdi(CdiMethod::Tesouro)),
            "IMA-B" => Ok(Benchmark::ImaB),
            "IMA-B 5" => Ok(Benchmark::ImaB5),
            "IMA-B 5+" => Ok(Benchmark::ImaB5Plus),
            "IBOV" => Ok(Benchmark::Ibov),
            _ => Err(FundsError::UnknownBenchmark {
                name: s.to_string(),
            }),
        }
    }
}

/// A benchmark as both index levels (first level is 1) and daily returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub levels: Vec<f64>,
    /// Daily returns as fractions; the first is `NaN` for price-based sources
    pub returns: Vec<f64>,
}

impl BenchmarkSeries {
    /// Series published as daily returns in percent (BCB SGS).
    pub fn from_daily_rates(name: &str, points: &[(NaiveDate, f64)]) -> Self {
        let returns: Vec<f64> = points.iter().map(|(_, v)| v / 100.0).collect();
        let mut growth = 1.0;
        let levels = returns
            .iter()
            .enumerate()
            .map(|(i, r)| {
                growth *= 1.0 + r;
                if i == 0 {
                    1.0
                } else {
                    growth
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            dates: points.iter().map(|(d, _)| *d).collect(),
            levels,
            returns,
        }
    }

    /// Series published as prices (Tesouro, Yahoo).
    pub fn from_prices(name: &str, points: &[(NaiveDate, f64)]) -> Self {
        let first = points.first().map(|(_, p)| *p).unwrap_or(f64::NAN);
        let returns = points
            .iter()
            .enumerate()
            .map(|(i, (_, p))| if i == 0 { f64::NAN } else { p / points[i - 1].1 - 1.0 })
            .collect();
        Self {
            name: name.to_string(),
            dates: points.iter().map(|(d, _)| *d).collect(),
            levels: points.iter().map(|(_, p)| p / first).collect(),
            returns,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Levels as a one-column panel named after the benchmark.
    pub fn to_panel(&self) -> Panel {
        Panel::from_series(&self.name, &self.dates, &self.levels)
    }

    /// Daily returns as a one-column panel named `"Retorno <name>"`.
    pub fn returns_panel(&self) -> Panel {
        Panel::from_series(&format!("Retorno {}", self.name), &self.dates, &self.returns)
    }
}

/// Parse `name` and download the benchmark. Unknown names fail before any
/// request is made.
pub fn fetch_benchmark(
    transport: &dyn Transport,
    config: &FundsConfig,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BenchmarkSeries> {
    let benchmark: Benchmark = name.parse()?;
    fetch_benchmark_series(transport, config, benchmark, start, end)
}

pub fn fetch_benchmark_series(
    transport: &dyn Transport,
    config: &FundsConfig,
    benchmark: Benchmark,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BenchmarkSeries> {
    if start > end {
        return Err(FundsError::InvalidParameter(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    let started = Instant::now();

    let series = match benchmark {
        Benchmark::Cdi(CdiMethod::Tesouro) => {
            let prices = tesouro::fetch_selic_prices(transport, config, start, end)?;
            BenchmarkSeries::from_prices(benchmark.label(), &prices)
        }
        Benchmark::Ibov => {
            let prices = yahoo::fetch_history(transport, config, IBOV_SYMBOL, start, end)?;
            BenchmarkSeries::from_prices(benchmark.label(), &prices)
        }
        _ => {
            let code = benchmark.sgs_code().ok_or_else(|| FundsError::UnknownBenchmark {
                name: benchmark.to_string(),
            })?;
            let rates = bcb::fetch_sgs(transport, config, code, start, end)?;
            BenchmarkSeries::from_daily_rates(benchmark.label(), &rates)
        }
    };

    if series.is_empty() {
        return Err(FundsError::NoData(format!(
            "{} between {} and {}",
            benchmark, start, end
        )));
    }

    info!(
        "Benchmark {} finished in {:.2} minutes ({} points)",
        benchmark,
        started.elapsed().as_secs_f64() / 60.0,
        series.len()
    );
    Ok(series)
}
