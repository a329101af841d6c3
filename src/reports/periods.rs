//! Compounded returns per calendar period (month, quarter, semester, year).

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FundsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Frequency {
    Monthly,
    Quarterly,
    Semiannual,
    Yearly,
}

impl Frequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::Semiannual => 2,
            Frequency::Yearly => 1,
        }
    }

    /// 1-based period of `date` within its year
    pub fn period_of(&self, date: NaiveDate) -> u32 {
        let months_per_period = 12 / self.periods_per_year();
        (date.month() - 1) / months_per_period + 1
    }

    /// Plural noun used for the period axis
    pub fn axis_label(&self) -> &'static str {
        match self {
            Frequency::Monthly => "Meses",
            Frequency::Quarterly => "Trimestres",
            Frequency::Semiannual => "Semestres",
            Frequency::Yearly => "Anos",
        }
    }

    /// Adjective used in chart titles ("Retornos Mensais")
    pub fn title_label(&self) -> &'static str {
        match self {
            Frequency::Monthly => "Mensais",
            Frequency::Quarterly => "Trimestrais",
            Frequency::Semiannual => "Semestrais",
            Frequency::Yearly => "Anuais",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Frequency::Monthly => "M",
            Frequency::Quarterly => "Q",
            Frequency::Semiannual => "SEM",
            Frequency::Yearly => "Y",
        };
        f.write_str(code)
    }
}

impl FromStr for Frequency {
    type Err = FundsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "M" | "MONTH" | "MONTHLY" => Ok(Frequency::Monthly),
            "Q" | "QUARTER" | "QUARTERLY" => Ok(Frequency::Quarterly),
            "SEM" | "SEMESTER" | "SEMIANNUAL" => Ok(Frequency::Semiannual),
            "Y" | "YEAR" | "YEARLY" => Ok(Frequency::Yearly),
            other => Err(FundsError::InvalidParameter(format!(
                "unknown period frequency: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReturn {
    pub year: i32,
    /// 1-based index within the year
    pub period: u32,
    pub value: f64,
}

/// Compound daily returns within each period. Missing daily returns count
/// as zero; periods without any date are absent.
pub fn period_returns(dates: &[NaiveDate], daily_returns: &[f64], freq: Frequency) -> Vec<PeriodReturn> {
    let mut grouped: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, ret) in dates.iter().zip(daily_returns) {
        let growth = grouped.entry((date.year(), freq.period_of(*date))).or_insert(1.0);
        if ret.is_finite() {
            *growth *= 1.0 + ret;
        }
    }

    grouped
        .into_iter()
        .map(|((year, period), growth)| PeriodReturn {
            year,
            period,
            value: growth - 1.0,
        })
        .collect()
}

/// Per year, share of periods in which the fund did better than the
/// benchmark. Ties count for neither side; a year with no win scores zero.
pub fn beat_ratio_by_year(fund: &[PeriodReturn], benchmark: &[PeriodReturn]) -> BTreeMap<i32, f64> {
    let bench: BTreeMap<(i32, u32), f64> = benchmark
        .iter()
        .map(|p| ((p.year, p.period), p.value))
        .collect();

    let mut tally: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
    for p in fund {
        let entry = tally.entry(p.year).or_insert((0, 0));
        let Some(b) = bench.get(&(p.year, p.period)) else {
            continue;
        };
        let diff = p.value - b;
        if diff > 0.0 {
            entry.0 += 1;
        } else if diff < 0.0 {
            entry.1 += 1;
        }
    }

    tally
        .into_iter()
        .map(|(year, (won, lost))| {
            let ratio = if won > 0 {
                won as f64 / (won + lost) as f64
            } else {
                0.0
            };
            (year, ratio)
        })
        .collect()
}
