//! Compare equity funds against CDI and IBOV for one year.
//!
//! ```text
//! cargo run --example compare_funds -- 2024 ./charts
//! RUST_LOG=cotas=debug cargo run --example compare_funds
//! ```

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cotas::charts::{self, ChartOptions, Highlight};
use cotas::display;
use cotas::importers::daily_report::fetch_daily_reports;
use cotas::importers::registry::fetch_registry;
use cotas::importers::{FetchProgress, FetchStage, ReportQuery};
use cotas::pricing::fetch_benchmark;
use cotas::reports::{self, BeatsOptions, Frequency};
use cotas::{merge, FundsConfig, HttpTransport, Panel};

const HOLDING_PERIOD: usize = 21;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cotas=info")))
        .init();

    let mut args = std::env::args().skip(1);
    let today = Local::now().date_naive();
    let year: i32 = match args.next() {
        Some(y) => y.parse().with_context(|| format!("invalid year: {}", y))?,
        None => today.year() - 1,
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "charts".to_string()));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {:?}", out_dir))?;

    let config = FundsConfig::load(None).context("loading configuration")?;
    let transport = HttpTransport::new(&config)?;

    let registry = fetch_registry(&transport, &config, &["Ações".to_string()])?;
    info!("{} equity funds in the registry", registry.len());

    let bar = ProgressBar::new(12);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("progress template")?
            .progress_chars("=> "),
    );
    let on_progress = |p: &FetchProgress| {
        bar.set_length(p.total as u64);
        match p.stage {
            FetchStage::Downloading => bar.set_message(format!("baixando {}/{:02}", p.year, p.month)),
            FetchStage::Parsing => bar.set_message(format!("lendo {}/{:02}", p.year, p.month)),
            FetchStage::Complete => bar.set_position(p.completed as u64),
        }
    };
    let query = ReportQuery::new(vec![year], (1..=12).collect())
        .with_min_shareholders(100)
        .with_min_net_assets(10_000_000.0);
    let records = fetch_daily_reports(&transport, &config, &query, today, Some(&on_progress))?;
    bar.finish_with_message(format!("{} registros", records.len()));

    let merged = merge(&registry, &records);
    let quotas = merged.quota_panel();
    let report = reports::compute_risk_return(&quotas);
    println!("{}", display::format_risk_return_table(&report.summary, &config.display));

    let start = NaiveDate::from_ymd_opt(year, 1, 1).context("start date")?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31).context("end date")?;
    let cdi = fetch_benchmark(&transport, &config, "CDI", start, end)?;
    let ibov = fetch_benchmark(&transport, &config, "IBOV", start, end)?;
    let benchmarks: Panel = cdi.to_panel().outer_join(&ibov.to_panel());

    let beats = reports::beats_benchmark(&quotas, &benchmarks, &BeatsOptions::new(HOLDING_PERIOD))?;
    println!("{}", display::format_beats_table(&beats, &config.display));

    let cdi_point = reports::compute_risk_return(&cdi.to_panel())
        .summary
        .first()
        .map(|r| Highlight::new("CDI", r.volatility, r.annual_return));
    let scatter = charts::risk_return_scatter(&report.summary, None, cdi_point.as_ref(), &ChartOptions::default());
    charts::save_svg(&out_dir.join("risco_retorno.svg"), &scatter)?;

    if let Some(best) = report.summary.first() {
        let rolling = reports::rolling_window_returns(&quotas.select(&[best.fund.clone()]), HOLDING_PERIOD, &benchmarks)?;
        let chart = charts::rolling_returns_chart(&best.fund, &rolling, HOLDING_PERIOD);
        charts::save_svg(&out_dir.join("janela_movel.svg"), &chart)?;

        if let Some(returns) = report.daily_returns.column(&best.fund) {
            let heatmap = charts::returns_heatmap(&best.fund, report.daily_returns.dates(), returns, Frequency::Monthly);
            charts::save_svg(&out_dir.join("heatmap.svg"), &heatmap)?;
        }
    }

    info!("Charts written to {:?}", out_dir);
    Ok(())
}
