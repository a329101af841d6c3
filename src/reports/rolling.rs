//! Holding-period (rolling window) comparisons against benchmarks.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, warn};

use super::risk_return::normalize;
use crate::error::{FundsError, Result};
use crate::panel::Panel;

/// Benchmark columns carrying this marker hold returns, not levels, and are
/// left out of the comparisons.
const RETURN_COLUMN_MARKER: &str = "Retorno";

/// Returns over every window of `hp` rows for funds and benchmarks on their
/// common dates.
///
/// Dates are outer-joined, rows with any missing value dropped, the result
/// normalized and compared `hp` rows apart. The first `hp` rows have no
/// window and are dropped, as are windows that are not finite (a zero
/// starting value or a zero level).
pub fn rolling_window_returns(funds: &Panel, hp: usize, benchmarks: &Panel) -> Result<Panel> {
    if hp == 0 {
        return Err(FundsError::InvalidParameter(
            "holding period must be at least one day".to_string(),
        ));
    }

    let joined = funds.outer_join(benchmarks).dropna();
    let normalized = normalize(&joined);
    let windowed = normalized.map_columns(|col| {
        col.iter()
            .enumerate()
            .map(|(i, v)| {
                if i < hp {
                    f64::NAN
                } else {
                    v / col[i - hp] - 1.0
                }
            })
            .collect()
    });
    let finite = |r: usize| windowed.row(r).iter().all(|v| v.is_finite());
    let kept = windowed.filter_rows(|r| r >= hp && finite(r));
    let dropped = windowed.n_rows().saturating_sub(hp) - kept.n_rows();
    if dropped > 0 {
        warn!("Dropped {} rolling windows with non-finite returns", dropped);
    }
    Ok(kept)
}

fn comparable_benchmarks(benchmarks: &Panel) -> Vec<String> {
    benchmarks
        .columns()
        .iter()
        .filter(|c| !c.contains(RETURN_COLUMN_MARKER))
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
pub struct BeatsOptions {
    pub hp: usize,
    /// Minimum share of winning windows, as a fraction
    pub limit: f64,
    /// Benchmarks with fewer rolling rows than this are not evaluated
    pub min_observations: usize,
}

impl BeatsOptions {
    pub fn new(hp: usize) -> Self {
        Self {
            hp,
            limit: 0.6,
            min_observations: 252,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkBeat {
    pub fund: String,
    /// (benchmark, share of windows where the fund did better)
    pub ratios: Vec<(String, f64)>,
}

/// Share of rolling windows in which each fund beat each benchmark.
///
/// A fund is reported only when every evaluated benchmark was beaten in at
/// least `limit` of the windows. Best ratios first.
pub fn beats_benchmark(funds: &Panel, benchmarks: &Panel, opts: &BeatsOptions) -> Result<Vec<BenchmarkBeat>> {
    let bench_names = comparable_benchmarks(benchmarks);
    let mut results = Vec::new();

    'funds: for fund in funds.columns() {
        let fund_panel = funds.select(std::slice::from_ref(fund));
        let mut ratios = Vec::new();
        let mut all_pass = true;

        for bench in &bench_names {
            let rolling = rolling_window_returns(
                &fund_panel,
                opts.hp,
                &benchmarks.select(std::slice::from_ref(bench)),
            )?;
            if rolling.n_rows() == 0 {
                debug!("{} has no overlapping windows, skipping", fund);
                continue 'funds;
            }
            if rolling.n_rows() < opts.min_observations {
                continue;
            }

            let fund_col = rolling.column_at(0);
            let bench_col = rolling.column_at(1);
            let wins = fund_col
                .iter()
                .zip(bench_col)
                .filter(|(f, b)| *f - *b > 0.0)
                .count();
            let ratio = wins as f64 / rolling.n_rows() as f64;
            if ratio < opts.limit {
                all_pass = false;
            }
            ratios.push((bench.clone(), ratio));
        }

        if all_pass && !ratios.is_empty() {
            results.push(BenchmarkBeat {
                fund: fund.clone(),
                ratios,
            });
        }
    }

    results.sort_by(|a, b| compare_desc(&b.ratios, &a.ratios));
    Ok(results)
}

fn compare_desc(a: &[(String, f64)], b: &[(String, f64)]) -> Ordering {
    for ((_, x), (_, y)) in a.iter().zip(b) {
        match x.partial_cmp(y) {
            Some(Ordering::Equal) | None => continue,
            Some(other) => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[derive(Debug, Clone)]
pub struct OutperformanceOptions {
    /// Benchmark the ratio cutoff applies to; `None` applies it to all
    pub cutoff_benchmark: Option<String>,
    /// Minimum mean fund/benchmark ratio (1.0 = 100% of the benchmark)
    pub min_ratio: f64,
}

impl Default for OutperformanceOptions {
    fn default() -> Self {
        Self {
            cutoff_benchmark: Some("CDI".to_string()),
            min_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcessReturn {
    pub benchmark: String,
    /// Mean excess over windows where the fund did at least as well
    pub mean_above: f64,
    /// Mean shortfall over windows where the fund did worse (negative)
    pub mean_below: f64,
    /// Mean of fund return / benchmark return
    pub mean_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outperformance {
    pub fund: String,
    pub stats: Vec<ExcessReturn>,
}

impl Outperformance {
    pub fn against(&self, benchmark: &str) -> Option<&ExcessReturn> {
        self.stats.iter().find(|s| s.benchmark == benchmark)
    }
}

fn mean_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// How much, on average, each fund beats or trails each benchmark over
/// `hp`-day windows, filtered by the mean ratio against the cutoff benchmark.
pub fn outperformance_stats(
    funds: &Panel,
    benchmarks: &Panel,
    hp: usize,
    opts: &OutperformanceOptions,
) -> Result<Vec<Outperformance>> {
    let bench_names = comparable_benchmarks(benchmarks);
    if let Some(cutoff) = &opts.cutoff_benchmark {
        if !bench_names.contains(cutoff) {
            return Err(FundsError::UnknownBenchmark {
                name: cutoff.clone(),
            });
        }
    }

    let mut results = Vec::new();
    'funds: for fund in funds.columns() {
        let fund_panel = funds.select(std::slice::from_ref(fund));
        let mut stats = Vec::new();

        for bench in &bench_names {
            let rolling = rolling_window_returns(
                &fund_panel,
                hp,
                &benchmarks.select(std::slice::from_ref(bench)),
            )?;
            if rolling.n_rows() == 0 {
                continue 'funds;
            }

            let pairs: Vec<(f64, f64)> = rolling
                .column_at(0)
                .iter()
                .copied()
                .zip(rolling.column_at(1).iter().copied())
                .collect();
            stats.push(ExcessReturn {
                benchmark: bench.clone(),
                mean_above: mean_or_zero(pairs.iter().map(|(f, b)| f - b).filter(|e| *e >= 0.0)),
                mean_below: mean_or_zero(pairs.iter().map(|(f, b)| f - b).filter(|e| *e < 0.0)),
                mean_ratio: mean_or_zero(pairs.iter().map(|(f, b)| f / b)),
            });
        }

        let ratio_of = |name: &str| {
            stats
                .iter()
                .find(|s| s.benchmark == name)
                .map(|s| s.mean_ratio)
                .unwrap_or(0.0)
        };
        let keep = match &opts.cutoff_benchmark {
            Some(cutoff) => ratio_of(cutoff) >= opts.min_ratio,
            None => bench_names.iter().all(|b| ratio_of(b) >= opts.min_ratio),
        };
        if keep {
            results.push(Outperformance {
                fund: fund.clone(),
                stats,
            });
        }
    }

    results.sort_by(|a, b| {
        let ra: Vec<(String, f64)> = a.stats.iter().map(|s| (s.benchmark.clone(), s.mean_ratio)).collect();
        let rb: Vec<(String, f64)> = b.stats.iter().map(|s| (s.benchmark.clone(), s.mean_ratio)).collect();
        compare_desc(&rb, &ra)
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn growth(n: usize, rate: f64) -> Vec<f64> {
        (0..n).map(|i| (1.0 + rate).powi(i as i32)).collect()
    }

    fn panel(columns: &[(&str, Vec<f64>)]) -> Panel {
        let n = columns[0].1.len();
        Panel::new(
            dates(n),
            columns.iter().map(|(name, _)| name.to_string()).collect(),
            columns.iter().map(|(_, v)| v.clone()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rolling_window_on_monotone_series() {
        let n = 30;
        let hp = 5;
        let funds = panel(&[("F", growth(n, 0.01))]);
        let bench = panel(&[("CDI", growth(n, 0.001))]);
        let rolling = rolling_window_returns(&funds, hp, &bench).unwrap();
        assert_eq!(rolling.n_rows(), n - hp);
        assert!(rolling.iter_columns().all(|(_, col)| col.iter().all(|v| *v > 0.0)));
        let expected = 1.01f64.powi(hp as i32) - 1.0;
        assert!((rolling.column("F").unwrap()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_window_drops_non_overlapping_dates() {
        let funds = Panel::from_series("F", &dates(10)[..6], &growth(6, 0.01));
        let bench = Panel::from_series("B", &dates(10)[3..], &growth(7, 0.01));
        let rolling = rolling_window_returns(&funds, 1, &bench).unwrap();
        // Three common dates, minus one for the window
        assert_eq!(rolling.n_rows(), 2);
    }

    #[test]
    fn test_rolling_window_drops_zero_levels() {
        let n = 20;
        let mut fund = growth(n, 0.01);
        fund[0] = 0.0;
        let funds = panel(&[("ZERO", fund)]);
        let bench = panel(&[("CDI", growth(n, 0.001))]);
        let rolling = rolling_window_returns(&funds, 5, &bench).unwrap();
        assert_eq!(rolling.n_rows(), 0);

        let mut fund = growth(n, 0.01);
        fund[10] = 0.0;
        let funds = panel(&[("GAP", fund)]);
        let rolling = rolling_window_returns(&funds, 5, &bench).unwrap();
        assert!(rolling.n_rows() > 0);
        assert!(rolling.iter_columns().all(|(_, col)| col.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_beats_benchmark_skips_zero_start() {
        let n = 40;
        let mut zero = growth(n, 0.01);
        zero[0] = 0.0;
        let funds = panel(&[("ZERO", zero)]);
        let benches = panel(&[("CDI", growth(n, 0.001))]);
        let mut opts = BeatsOptions::new(5);
        opts.min_observations = 1;
        assert!(beats_benchmark(&funds, &benches, &opts).unwrap().is_empty());
    }

    #[test]
    fn test_rolling_window_rejects_zero_hp() {
        let funds = panel(&[("F", growth(3, 0.01))]);
        let err = rolling_window_returns(&funds, 0, &funds).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_beats_benchmark_limit_and_min_observations() {
        let n = 40;
        let funds = panel(&[("WIN", growth(n, 0.002)), ("LOSE", growth(n, 0.0001))]);
        let benches = panel(&[
            ("CDI", growth(n, 0.001)),
            ("Retorno CDI", vec![0.001; n]),
        ]);
        let mut opts = BeatsOptions::new(5);
        opts.min_observations = 10;

        let result = beats_benchmark(&funds, &benches, &opts).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].fund, "WIN");
        assert_eq!(result[0].ratios, vec![("CDI".to_string(), 1.0)]);

        opts.min_observations = 1000;
        assert!(beats_benchmark(&funds, &benches, &opts).unwrap().is_empty());
    }

    #[test]
    fn test_outperformance_stats() {
        let n = 20;
        let funds = panel(&[("A", growth(n, 0.002)), ("B", growth(n, 0.0005))]);
        let benches = panel(&[("CDI", growth(n, 0.001))]);

        let result = outperformance_stats(&funds, &benches, 5, &OutperformanceOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        let cdi = result[0].against("CDI").unwrap();
        assert!(cdi.mean_ratio > 1.9 && cdi.mean_ratio < 2.1);
        assert!(cdi.mean_above > 0.0);
        assert_eq!(cdi.mean_below, 0.0);

        let opts = OutperformanceOptions {
            cutoff_benchmark: None,
            min_ratio: 0.0,
        };
        let all = outperformance_stats(&funds, &benches, 5, &opts).unwrap();
        assert_eq!(all.iter().map(|o| o.fund.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_outperformance_unknown_cutoff() {
        let funds = panel(&[("A", growth(10, 0.002))]);
        let benches = panel(&[("IBOV", growth(10, 0.001))]);
        let err = outperformance_stats(&funds, &benches, 2, &OutperformanceOptions::default()).unwrap_err();
        assert!(matches!(err, FundsError::UnknownBenchmark { .. }));
    }
}
