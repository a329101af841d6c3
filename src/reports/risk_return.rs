use chrono::Datelike;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::TRADING_DAYS_PER_YEAR;
use crate::error::{FundsError, Result};
use crate::panel::Panel;

/// Annualized risk and return of one fund (fractions, not percentages)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReturn {
    pub fund: String,
    pub volatility: f64,
    pub annual_return: f64,
}

/// Last cumulative return reached in each calendar year, per fund.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyReturns {
    pub years: Vec<i32>,
    pub funds: Vec<String>,
    /// `values[fund][year]`, `NaN` when the fund has no data that year
    pub values: Vec<Vec<f64>>,
}

impl YearlyReturns {
    pub fn get(&self, fund: &str, year: i32) -> Option<f64> {
        let f = self.funds.iter().position(|n| n == fund)?;
        let y = self.years.iter().position(|&v| v == year)?;
        Some(self.values[f][y])
    }
}

#[derive(Debug, Clone)]
pub struct RiskReturnReport {
    /// Funds with both metrics defined, best annual return first
    pub summary: Vec<RiskReturn>,
    pub normalized: Panel,
    pub daily_returns: Panel,
    pub cumulative_returns: Panel,
    pub yearly_returns: YearlyReturns,
}

/// Divide each column by its first non-missing value.
pub fn normalize(quotas: &Panel) -> Panel {
    quotas.map_columns(normalize_column)
}

fn normalize_column(values: &[f64]) -> Vec<f64> {
    match values.iter().find(|v| !v.is_nan()) {
        Some(&first) if first != 0.0 => values.iter().map(|v| v / first).collect(),
        _ => vec![f64::NAN; values.len()],
    }
}

/// Simple return against the previous non-missing observation of the same
/// column. Missing rows stay missing; the first observation has no return.
pub fn daily_returns(quotas: &Panel) -> Panel {
    quotas.map_columns(|col| {
        let mut previous: Option<f64> = None;
        col.iter()
            .map(|&v| {
                if v.is_nan() {
                    return f64::NAN;
                }
                let ret = match previous {
                    Some(p) if p != 0.0 => v / p - 1.0,
                    _ => f64::NAN,
                };
                previous = Some(v);
                ret
            })
            .collect()
    })
}

/// Running product of `1 + r` over non-missing returns, minus one.
pub fn cumulative_returns(returns: &Panel) -> Panel {
    returns.map_columns(|col| {
        let mut growth = 1.0;
        col.iter()
            .map(|&r| {
                if r.is_nan() {
                    f64::NAN
                } else {
                    growth *= 1.0 + r;
                    growth - 1.0
                }
            })
            .collect()
    })
}

pub fn yearly_returns(cumulative: &Panel) -> YearlyReturns {
    let years: Vec<i32> = cumulative
        .dates()
        .iter()
        .map(|d| d.year())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = cumulative
        .iter_columns()
        .map(|(_, col)| {
            let mut last: BTreeMap<i32, f64> = BTreeMap::new();
            for (date, v) in cumulative.dates().iter().zip(col) {
                if !v.is_nan() {
                    last.insert(date.year(), *v);
                }
            }
            years
                .iter()
                .map(|y| last.get(y).copied().unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    YearlyReturns {
        years,
        funds: cumulative.columns().to_vec(),
        values,
    }
}

/// `(last / first)^(252 / T) - 1` with `T` the number of observations.
pub fn annualized_return(first: f64, last: f64, observations: usize) -> f64 {
    if observations < 2 || first == 0.0 || first.is_nan() || last.is_nan() {
        return f64::NAN;
    }
    (last / first).powf(TRADING_DAYS_PER_YEAR as f64 / observations as f64) - 1.0
}

/// Sample standard deviation of the non-missing returns, times √252.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    let clean: Vec<f64> = returns.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.len() < 2 {
        return f64::NAN;
    }

    let n = clean.len() as f64;
    let mean = clean.iter().sum::<f64>() / n;
    let var = clean
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    var.sqrt() * (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

/// Risk/return comparison of every column of `quotas` (one column per fund).
pub fn compute_risk_return(quotas: &Panel) -> RiskReturnReport {
    let normalized = normalize(quotas);
    let daily = daily_returns(&normalized);
    let cumulative = cumulative_returns(&daily);
    let yearly = yearly_returns(&cumulative);

    let mut summary: Vec<RiskReturn> = (0..normalized.n_cols())
        .filter_map(|idx| {
            let observations = normalized.valid_count(idx);
            let (_, first) = normalized.first_valid(idx)?;
            let (_, last) = normalized.last_valid(idx)?;
            let row = RiskReturn {
                fund: normalized.columns()[idx].clone(),
                volatility: annualized_volatility(daily.column_at(idx)),
                annual_return: annualized_return(first, last, observations),
            };
            (row.volatility.is_finite() && row.annual_return.is_finite()).then_some(row)
        })
        .collect();
    summary.sort_by(|a, b| {
        b.annual_return
            .partial_cmp(&a.annual_return)
            .unwrap_or(Ordering::Equal)
    });

    tracing::debug!(
        "Risk/return computed for {} of {} funds",
        summary.len(),
        quotas.n_cols()
    );

    RiskReturnReport {
        summary,
        normalized,
        daily_returns: daily,
        cumulative_returns: cumulative,
        yearly_returns: yearly,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Return,
    Volatility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub best: Vec<RiskReturn>,
    pub worst: Vec<RiskReturn>,
}

/// Best and worst `n` funds. For volatility, best means least volatile.
pub fn rank_funds(summary: &[RiskReturn], n: usize, by: RankBy) -> Ranking {
    let mut sorted = summary.to_vec();
    match by {
        RankBy::Return => sorted.sort_by(|a, b| {
            b.annual_return
                .partial_cmp(&a.annual_return)
                .unwrap_or(Ordering::Equal)
        }),
        RankBy::Volatility => sorted.sort_by(|a, b| {
            a.volatility
                .partial_cmp(&b.volatility)
                .unwrap_or(Ordering::Equal)
        }),
    }
    let best = sorted.iter().take(n).cloned().collect();
    let worst = sorted.iter().rev().take(n).cloned().collect();
    Ranking { best, worst }
}

/// Quantile with linear interpolation between closest ranks.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Keep funds strictly inside the `(q, 1 - q)` quantile band of both
/// volatility and return.
pub fn remove_outliers(summary: &[RiskReturn], q: f64) -> Result<Vec<RiskReturn>> {
    if !(0.0..0.5).contains(&q) {
        return Err(FundsError::InvalidParameter(format!(
            "outlier quantile must be in [0, 0.5), got {}",
            q
        )));
    }
    let vols: Vec<f64> = summary.iter().map(|r| r.volatility).collect();
    let rets: Vec<f64> = summary.iter().map(|r| r.annual_return).collect();
    let (vol_lo, vol_hi) = (quantile(&vols, q), quantile(&vols, 1.0 - q));
    let (ret_lo, ret_hi) = (quantile(&rets, q), quantile(&rets, 1.0 - q));

    Ok(summary
        .iter()
        .filter(|r| {
            r.volatility > vol_lo
                && r.volatility < vol_hi
                && r.annual_return > ret_lo
                && r.annual_return < ret_hi
        })
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn summary_row(fund: &str, volatility: f64, annual_return: f64) -> RiskReturn {
        RiskReturn {
            fund: fund.to_string(),
            volatility,
            annual_return,
        }
    }

    #[test]
    fn test_normalize_with_different_start_dates() {
        let quotas = Panel::from_long(vec![
            (d(2024, 1, 1), "A".to_string(), 2.0),
            (d(2024, 1, 2), "A".to_string(), 3.0),
            (d(2024, 1, 2), "B".to_string(), 10.0),
            (d(2024, 1, 3), "B".to_string(), 12.0),
        ]);
        let normalized = normalize(&quotas);
        for idx in 0..normalized.n_cols() {
            assert_eq!(normalized.first_valid(idx).map(|(_, v)| v), Some(1.0));
        }
        let b = normalized.column("B").unwrap();
        assert!(b[0].is_nan());
        assert!(approx(b[2], 1.2));
    }

    #[test]
    fn test_daily_returns_skip_gaps() {
        let quotas = Panel::new(
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec!["A".to_string()],
            vec![vec![1.0, f64::NAN, 1.21]],
        )
        .unwrap();
        let returns = daily_returns(&quotas);
        let col = returns.column("A").unwrap();
        assert!(col[0].is_nan());
        assert!(col[1].is_nan());
        assert!(approx(col[2], 0.21));

        let cumulative = cumulative_returns(&returns);
        assert!(approx(cumulative.column("A").unwrap()[2], 0.21));
    }

    #[test]
    fn test_annualized_return_of_constant_daily_growth() {
        let g = 0.0004_f64;
        let t = 5000usize;
        let last = (1.0 + g).powi(t as i32 - 1);
        let expected = (1.0 + g).powi(252) - 1.0;
        let annual = annualized_return(1.0, last, t);
        assert!(((annual - expected) / expected).abs() < 1e-3);
        assert!(annualized_return(1.0, 1.1, 1).is_nan());
    }

    #[test]
    fn test_annualized_volatility_sample_std() {
        let returns = [0.01, -0.01, f64::NAN, 0.01, -0.01];
        let expected = (0.0004_f64 / 3.0).sqrt() * 252f64.sqrt();
        assert!(approx(annualized_volatility(&returns), expected));
        assert!(annualized_volatility(&[0.01]).is_nan());
    }

    #[test]
    fn test_compute_risk_return_drops_single_observation() {
        let quotas = Panel::from_long(vec![
            (d(2023, 12, 28), "A".to_string(), 1.0),
            (d(2023, 12, 29), "A".to_string(), 1.01),
            (d(2024, 1, 2), "A".to_string(), 1.0302),
            (d(2024, 1, 3), "A".to_string(), 1.0405),
            (d(2024, 1, 3), "ONE".to_string(), 5.0),
        ]);
        let report = compute_risk_return(&quotas);
        assert_eq!(report.summary.len(), 1);
        assert_eq!(report.summary[0].fund, "A");
        assert_eq!(report.yearly_returns.years, vec![2023, 2024]);
        assert!(approx(report.yearly_returns.get("A", 2023).unwrap(), 0.01));
        assert!(approx(report.yearly_returns.get("A", 2024).unwrap(), 0.0405));
        assert!(report.yearly_returns.get("ONE", 2023).unwrap().is_nan());
    }

    #[test]
    fn test_summary_sorted_by_return() {
        let dates = [d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)];
        let mut rows = Vec::new();
        for (name, values) in [("LOW", [1.0, 1.01, 1.0]), ("HIGH", [1.0, 1.05, 1.1])] {
            for (date, v) in dates.iter().zip(values) {
                rows.push((*date, name.to_string(), v));
            }
        }
        let report = compute_risk_return(&Panel::from_long(rows));
        let order: Vec<&str> = report.summary.iter().map(|r| r.fund.as_str()).collect();
        assert_eq!(order, vec!["HIGH", "LOW"]);
    }

    #[test]
    fn test_rank_funds() {
        let summary = vec![
            summary_row("A", 0.10, 0.12),
            summary_row("B", 0.02, 0.09),
            summary_row("C", 0.30, 0.20),
        ];
        let by_return = rank_funds(&summary, 1, RankBy::Return);
        assert_eq!(by_return.best[0].fund, "C");
        assert_eq!(by_return.worst[0].fund, "B");

        let by_vol = rank_funds(&summary, 2, RankBy::Volatility);
        assert_eq!(by_vol.best[0].fund, "B");
        assert_eq!(by_vol.worst[0].fund, "C");
        assert_eq!(by_vol.best.len(), 2);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        assert!(approx(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5));
        assert!(approx(quantile(&[4.0, 1.0, 3.0, 2.0], 0.25), 1.75));
    }

    #[test]
    fn test_remove_outliers() {
        let summary: Vec<RiskReturn> = (0..10)
            .map(|i| summary_row(&format!("F{}", i), i as f64 / 100.0, i as f64 / 50.0))
            .collect();
        let kept = remove_outliers(&summary, 0.1).unwrap();
        let names: Vec<&str> = kept.iter().map(|r| r.fund.as_str()).collect();
        assert_eq!(names, vec!["F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8"]);

        assert!(remove_outliers(&summary, 0.5).unwrap_err().is_config());
    }
}
