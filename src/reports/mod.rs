// Reports module - risk/return metrics, rolling-window comparisons and period returns

pub mod periods;
pub mod risk_return;
pub mod rolling;

pub use periods::{beat_ratio_by_year, period_returns, Frequency, PeriodReturn};
pub use risk_return::{
    annualized_return, annualized_volatility, compute_risk_return, cumulative_returns,
    daily_returns, normalize, rank_funds, remove_outliers, RankBy, Ranking, RiskReturn,
    RiskReturnReport, YearlyReturns,
};
pub use rolling::{
    beats_benchmark, outperformance_stats, rolling_window_returns, BeatsOptions, BenchmarkBeat,
    ExcessReturn, Outperformance, OutperformanceOptions,
};
