//! End-to-end runs of registry + daily report download, merge and metrics
//! against canned CVM archives.

mod common;

use anyhow::Result;
use chrono::NaiveDate;

use common::{class_history_url, class_history_zip, daily_report_zip, registry_url, registry_zip};
use cotas::importers::daily_report::{fetch_daily_reports, report_url};
use cotas::importers::registry::fetch_registry;
use cotas::importers::ReportQuery;
use cotas::reports::{compute_risk_return, rolling_window_returns};
use cotas::{canonicalize, merge, FundsConfig, MemoryTransport, Panel};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn transport_for(config: &FundsConfig, report_rows: &[(&str, &str, f64)]) -> Result<MemoryTransport> {
    Ok(MemoryTransport::new()
        .with_body(
            class_history_url(config),
            class_history_zip(&[("11.111.111/0001-11", "Fundo de Ações")])?,
        )
        .with_body(
            registry_url(config),
            registry_zip(&[("11111111000111", "FUNDO ALPHA"), ("22222222000122", "FUNDO BETA")])?,
        )
        .with_body(
            report_url(&config.cvm_base_url, 2024, 1),
            daily_report_zip(2024, 1, report_rows)?,
        ))
}

#[test]
fn test_registry_and_two_quotas_give_ten_percent() -> Result<()> {
    let config = FundsConfig::default();
    let transport = transport_for(
        &config,
        &[
            ("11.111.111/0001-11", "2024-01-02", 1.0),
            ("11.111.111/0001-11", "2024-01-03", 1.1),
        ],
    )?;

    let registry = fetch_registry(&transport, &config, &[])?;
    assert_eq!(registry.len(), 2);

    let query = ReportQuery::new(vec![2024], vec![1]);
    let records = fetch_daily_reports(&transport, &config, &query, date(2024, 6, 1), None)?;
    assert_eq!(records.len(), 2);

    let merged = merge(&registry, &records);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.funds(), vec!["11.111.111/0001-11 // FUNDO ALPHA".to_string()]);

    let report = compute_risk_return(&merged.quota_panel());
    let fund = "11.111.111/0001-11 // FUNDO ALPHA";
    let normalized = report.normalized.column(fund).unwrap();
    assert_eq!(normalized[0], 1.0);
    assert!((normalized[1] - 1.1).abs() < 1e-12);
    let daily = report.daily_returns.column(fund).unwrap();
    assert!((daily[1] - 0.10).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_inner_join_keeps_only_common_identifiers() -> Result<()> {
    let config = FundsConfig::default();
    // Registry {A, B}, report {B, C}
    let transport = transport_for(
        &config,
        &[
            ("22222222000122", "2024-01-02", 2.0),
            ("33333333000133", "2024-01-02", 3.0),
        ],
    )?;

    let registry = fetch_registry(&transport, &config, &[])?;
    let records = fetch_daily_reports(
        &transport,
        &config,
        &ReportQuery::new(vec![2024], vec![1]),
        date(2024, 6, 1),
        None,
    )?;
    let merged = merge(&registry, &records);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged.rows[0].cnpj, canonicalize("22222222000122"));
    assert_eq!(merged.rows[0].legal_name, "FUNDO BETA");
    Ok(())
}

#[test]
fn test_class_filter_and_identifier_allow_list() -> Result<()> {
    let config = FundsConfig::default();
    let transport = transport_for(
        &config,
        &[
            ("11111111000111", "2024-01-02", 1.0),
            ("22222222000122", "2024-01-02", 2.0),
        ],
    )?;

    // BETA has no class on record and is kept by the class filter
    let registry = fetch_registry(&transport, &config, &["Ações".to_string()])?;
    assert_eq!(registry.len(), 2);

    let query = ReportQuery::new(vec![2024], vec![1]).with_cnpjs(&["11.111.111/0001-11".to_string()]);
    let records = fetch_daily_reports(&transport, &config, &query, date(2024, 6, 1), None)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cnpj, "11.111.111/0001-11");
    Ok(())
}

#[test]
fn test_rolling_window_on_monotone_series() -> Result<()> {
    let n = 30;
    let hp = 5;
    let dates: Vec<NaiveDate> = (0..n).map(|i| date(2024, 1, 1) + chrono::Days::new(i as u64)).collect();
    let fund: Vec<f64> = (0..n).map(|i| 1.0 + 0.01 * i as f64).collect();
    let bench: Vec<f64> = (0..n).map(|i| 100.0 * 1.001_f64.powi(i as i32)).collect();

    let funds = Panel::from_series("F", &dates, &fund);
    let benchmarks = Panel::from_series("CDI", &dates, &bench);
    let rolling = rolling_window_returns(&funds, hp, &benchmarks)?;

    assert_eq!(rolling.n_rows(), n - hp);
    for (_, col) in rolling.iter_columns() {
        assert!(col.iter().all(|v| *v > 0.0));
    }
    Ok(())
}

#[test]
fn test_missing_month_is_not_found() {
    let config = FundsConfig::default();
    let transport = MemoryTransport::new();
    let err = fetch_daily_reports(
        &transport,
        &config,
        &ReportQuery::new(vec![2024], vec![2]),
        date(2024, 6, 1),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        cotas::FundsError::Transport(cotas::TransportError::NotFound { .. })
    ));
}
