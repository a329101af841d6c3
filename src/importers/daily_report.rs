//! CVM daily report (informe diário) importer.
//!
//! Each month of `inf_diario_fi` carries one row per fund per business day
//! with the quota value, net assets and flows. Recent months are published
//! as individual archives; years before 2021 are bundled into one yearly
//! archive under `HIST/`.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use super::{cell, parse_date, parse_f64_lenient, read_zip_csv, RawTable};
use crate::cnpj::canonicalize;
use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;

/// First year published as monthly archives
const MONTHLY_ARCHIVES_SINCE: i32 = 2021;
/// Up to this year the yearly archive holds a single yearly CSV
const YEARLY_MEMBER_UNTIL: i32 = 2004;
/// Fund-type filtering only applies from this year on
const FUND_TYPE_SINCE: i32 = 2004;

const ACCEPTED_FUND_TYPES: [&str; 3] = ["FI", "FIF", "CLASSES - FIF"];

/// One fund on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReportRecord {
    pub date: NaiveDate,
    pub cnpj: String,
    pub quota: f64,
    pub net_assets: f64,
    pub total_value: Option<f64>,
    pub shareholders: Option<u32>,
    pub inflows: Option<f64>,
    pub outflows: Option<f64>,
}

/// Which months to download and which rows to keep.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    /// Identifier allow-list; empty keeps every fund
    pub cnpjs: Vec<String>,
    pub min_shareholders: Option<u32>,
    pub min_net_assets: Option<f64>,
}

impl ReportQuery {
    pub fn new(years: Vec<i32>, months: Vec<u32>) -> Self {
        Self {
            years,
            months,
            ..Default::default()
        }
    }

    pub fn with_cnpjs(mut self, cnpjs: &[String]) -> Self {
        self.cnpjs = cnpjs.to_vec();
        self
    }

    pub fn with_min_shareholders(mut self, min: u32) -> Self {
        self.min_shareholders = Some(min);
        self
    }

    pub fn with_min_net_assets(mut self, min: f64) -> Self {
        self.min_net_assets = Some(min);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(bad) = self.months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(FundsError::InvalidParameter(format!(
                "month must be between 1 and 12, got {}",
                bad
            )));
        }
        if let Some(min) = self.min_net_assets {
            if !min.is_finite() {
                return Err(FundsError::InvalidParameter(
                    "minimum net assets must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStage {
    Downloading,
    Parsing,
    Complete,
}

/// Progress information for daily report downloads
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub stage: FetchStage,
    pub year: i32,
    pub month: u32,
    /// Months handled so far, including this one
    pub completed: usize,
    pub total: usize,
    pub records: usize,
}

pub fn report_url(base_url: &str, year: i32, month: u32) -> String {
    if year >= MONTHLY_ARCHIVES_SINCE {
        format!(
            "{}/FI/DOC/INF_DIARIO/DADOS/inf_diario_fi_{:04}{:02}.zip",
            base_url, year, month
        )
    } else {
        format!("{}/FI/DOC/INF_DIARIO/DADOS/HIST/inf_diario_fi_{:04}.zip", base_url, year)
    }
}

pub fn report_member(year: i32, month: u32) -> String {
    if year > YEARLY_MEMBER_UNTIL {
        format!("inf_diario_fi_{:04}{:02}.csv", year, month)
    } else {
        format!("inf_diario_fi_{:04}.csv", year)
    }
}

/// Months strictly after `today`'s month are not published yet.
fn is_published(year: i32, month: u32, today: NaiveDate) -> bool {
    year < today.year() || (year == today.year() && month <= today.month())
}

/// Turn one parsed CSV into records, applying the query filters.
///
/// Cells that do not parse become missing values; rows without a date,
/// quota or net assets are dropped, as are rows with a negative quota or
/// negative net assets.
pub fn parse_daily_report(table: &RawTable, year: i32, query: &ReportQuery) -> Result<Vec<DailyReportRecord>> {
    let date_idx = table.require_column("DT_COMPTC")?;
    let cnpj_idx = table
        .column_containing("CNPJ_FUNDO")
        .ok_or_else(|| FundsError::Parse("missing CVM column: CNPJ_FUNDO".to_string()))?;
    let type_idx = table
        .column_containing("TP_FUNDO")
        .filter(|_| year >= FUND_TYPE_SINCE);
    let quota_idx = table.require_column("VL_QUOTA")?;
    let assets_idx = table.require_column("VL_PATRIM_LIQ")?;
    let holders_idx = table.column("NR_COTST");
    let total_idx = table.column("VL_TOTAL");
    let inflow_idx = table.column("CAPTC_DIA");
    let outflow_idx = table.column("RESG_DIA");

    let allowed: HashSet<String> = query.cnpjs.iter().map(|c| canonicalize(c)).collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        if let Some(idx) = type_idx {
            if !ACCEPTED_FUND_TYPES.contains(&cell(row, idx)) {
                continue;
            }
        }

        let cnpj = canonicalize(cell(row, cnpj_idx));
        if !allowed.is_empty() && !allowed.contains(&cnpj) {
            continue;
        }

        let (Some(date), Some(quota), Some(net_assets)) = (
            parse_date(cell(row, date_idx)),
            parse_f64_lenient(cell(row, quota_idx)),
            parse_f64_lenient(cell(row, assets_idx)),
        ) else {
            skipped += 1;
            continue;
        };
        if quota < 0.0 || net_assets < 0.0 {
            skipped += 1;
            continue;
        }

        let shareholders = holders_idx.and_then(|i| cell(row, i).parse::<u32>().ok());
        if let Some(min) = query.min_shareholders {
            if shareholders.map(|n| n < min).unwrap_or(true) {
                continue;
            }
        }
        if let Some(min) = query.min_net_assets {
            if net_assets < min {
                continue;
            }
        }

        records.push(DailyReportRecord {
            date,
            cnpj,
            quota,
            net_assets,
            total_value: total_idx.and_then(|i| parse_f64_lenient(cell(row, i))),
            shareholders,
            inflows: inflow_idx.and_then(|i| parse_f64_lenient(cell(row, i))),
            outflows: outflow_idx.and_then(|i| parse_f64_lenient(cell(row, i))),
        });
    }

    if skipped > 0 {
        debug!(
            "Skipped {} daily report rows with missing or negative date/quota/net assets",
            skipped
        );
    }
    Ok(records)
}

/// One record per (date, cnpj), keeping the last occurrence, sorted by date
/// then identifier.
pub fn dedup_records(records: Vec<DailyReportRecord>) -> Vec<DailyReportRecord> {
    let mut last: HashMap<(NaiveDate, String), usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        last.insert((record.date, record.cnpj.clone()), i);
    }
    let mut kept: Vec<DailyReportRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(i, r)| last.get(&(r.date, r.cnpj.clone())) == Some(i))
        .map(|(_, r)| r)
        .collect();
    kept.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.cnpj.cmp(&b.cnpj)));
    kept
}

/// Download daily reports for every published (year, month) in `query`.
///
/// Months run sequentially; the first failure aborts the call. Yearly
/// archives (before 2021) are downloaded once and reused for each month.
pub fn fetch_daily_reports(
    transport: &dyn Transport,
    config: &FundsConfig,
    query: &ReportQuery,
    today: NaiveDate,
    progress: Option<&dyn Fn(&FetchProgress)>,
) -> Result<Vec<DailyReportRecord>> {
    query.validate()?;
    let started = Instant::now();

    let periods: Vec<(i32, u32)> = query
        .years
        .iter()
        .flat_map(|&y| query.months.iter().map(move |&m| (y, m)))
        .filter(|&(y, m)| is_published(y, m, today))
        .collect();
    let total = periods.len();

    let mut archives: HashMap<String, Vec<u8>> = HashMap::new();
    let mut parsed_members: HashSet<(i32, String)> = HashSet::new();
    let mut records = Vec::new();

    for (done, (year, month)) in periods.into_iter().enumerate() {
        let notify = |stage: FetchStage, count: usize| {
            if let Some(cb) = progress {
                cb(&FetchProgress {
                    stage,
                    year,
                    month,
                    completed: done + 1,
                    total,
                    records: count,
                });
            }
        };

        let member = report_member(year, month);
        if !parsed_members.insert((year, member.clone())) {
            // Yearly CSV already read for an earlier month
            notify(FetchStage::Complete, records.len());
            continue;
        }

        let url = report_url(&config.cvm_base_url, year, month);
        if !archives.contains_key(&url) {
            notify(FetchStage::Downloading, records.len());
            let bytes = transport.get(&url)?;
            archives.insert(url.clone(), bytes);
        }
        let Some(bytes) = archives.get(&url) else {
            continue;
        };

        notify(FetchStage::Parsing, records.len());
        let table = read_zip_csv(bytes, &member)?;
        let month_records = parse_daily_report(&table, year, query)?;
        debug!("{}-{:02}: {} records kept", year, month, month_records.len());
        records.extend(month_records);

        if year >= MONTHLY_ARCHIVES_SINCE {
            archives.remove(&url);
        }
        notify(FetchStage::Complete, records.len());
    }

    let records = dedup_records(records);
    info!(
        "Daily reports finished in {:.2} minutes ({} records)",
        started.elapsed().as_secs_f64() / 60.0,
        records.len()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::MemoryTransport;
    use crate::importers::parse_csv;
    use crate::importers::test_support::zip_bytes;
    use std::cell::RefCell;

    const HEADER: &str =
        "TP_FUNDO_CLASSE;CNPJ_FUNDO_CLASSE;ID_SUBCLASSE;DT_COMPTC;VL_TOTAL;VL_QUOTA;VL_PATRIM_LIQ;CAPTC_DIA;RESG_DIA;NR_COTST";

    fn table(rows: &[&str]) -> RawTable {
        let mut content = String::from(HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        parse_csv(&content).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_report_urls() {
        let base = "http://dados.cvm.gov.br/dados";
        assert_eq!(
            report_url(base, 2024, 3),
            "http://dados.cvm.gov.br/dados/FI/DOC/INF_DIARIO/DADOS/inf_diario_fi_202403.zip"
        );
        assert_eq!(
            report_url(base, 2019, 7),
            "http://dados.cvm.gov.br/dados/FI/DOC/INF_DIARIO/DADOS/HIST/inf_diario_fi_2019.zip"
        );
        assert_eq!(report_member(2019, 7), "inf_diario_fi_201907.csv");
        assert_eq!(report_member(2003, 7), "inf_diario_fi_2003.csv");
    }

    #[test]
    fn test_is_published() {
        let today = date(2024, 5, 15);
        assert!(is_published(2023, 12, today));
        assert!(is_published(2024, 5, today));
        assert!(!is_published(2024, 6, today));
        assert!(!is_published(2025, 1, today));
    }

    #[test]
    fn test_parse_daily_report_filters() {
        let table = table(&[
            "FI;11.111.111/0001-11;;2024-01-02;100;1.5;1000000;0;0;50",
            "FIF;22.222.222/0001-22;;2024-01-02;100;2.0;500;0;0;5",
            "FII;33.333.333/0001-33;;2024-01-02;100;3.0;1000000;0;0;50",
            "FI;44.444.444/0001-44;;2024-01-02;100;;1000000;0;0;50",
        ]);
        let all = parse_daily_report(&table, 2024, &ReportQuery::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].shareholders, Some(50));
        assert_eq!(all[0].total_value, Some(100.0));

        let query = ReportQuery::default().with_min_shareholders(10);
        let rows = parse_daily_report(&table, 2024, &query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cnpj, "11.111.111/0001-11");

        let query = ReportQuery::default().with_min_net_assets(1000.0);
        assert_eq!(parse_daily_report(&table, 2024, &query).unwrap().len(), 1);

        let query = ReportQuery::default().with_cnpjs(&["22222222000122".to_string()]);
        let rows = parse_daily_report(&table, 2024, &query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quota, 2.0);
    }

    #[test]
    fn test_parse_daily_report_drops_negative_values() {
        let table = table(&[
            "FI;11.111.111/1111-11;;2024-01-02;100;-1.5;-100.0;0;0;5",
            "FI;22.222.222/0001-22;;2024-01-02;100;1.5;-100.0;0;0;5",
            "FI;33.333.333/0001-33;;2024-01-02;100;-0.1;100.0;0;0;5",
            "FI;44.444.444/0001-44;;2024-01-02;100;0.0;0.0;0;0;5",
        ]);
        let rows = parse_daily_report(&table, 2024, &ReportQuery::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cnpj, "44.444.444/0001-44");
        assert!(rows.iter().all(|r| r.quota >= 0.0 && r.net_assets >= 0.0));
    }

    #[test]
    fn test_parse_daily_report_lenient_casts() {
        let table = table(&["FI;11111111000111;;2024-01-02;abc;1.5;10;;x;n/a"]);
        let rows = parse_daily_report(&table, 2024, &ReportQuery::default()).unwrap();
        assert_eq!(rows[0].total_value, None);
        assert_eq!(rows[0].inflows, None);
        assert_eq!(rows[0].outflows, None);
        assert_eq!(rows[0].shareholders, None);
    }

    #[test]
    fn test_dedup_keeps_last() {
        let base = DailyReportRecord {
            date: date(2024, 1, 2),
            cnpj: "B".to_string(),
            quota: 1.0,
            net_assets: 1.0,
            total_value: None,
            shareholders: None,
            inflows: None,
            outflows: None,
        };
        let mut second = base.clone();
        second.quota = 2.0;
        let mut earlier = base.clone();
        earlier.date = date(2024, 1, 1);
        earlier.cnpj = "Z".to_string();

        let kept = dedup_records(vec![base, earlier, second]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].cnpj, "Z");
        assert_eq!(kept[1].quota, 2.0);
    }

    #[test]
    fn test_invalid_month_fails_before_download() {
        let transport = MemoryTransport::new();
        let query = ReportQuery::new(vec![2024], vec![13]);
        let err = fetch_daily_reports(&transport, &FundsConfig::default(), &query, date(2024, 12, 31), None)
            .unwrap_err();
        assert!(err.is_config());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_fetch_skips_future_months_and_reports_progress() {
        let config = FundsConfig::default();
        let csv = format!("{}\nFI;11111111000111;;2024-01-02;1;1.0;10;0;0;3\n", HEADER);
        let transport = MemoryTransport::new().with_body(
            report_url(&config.cvm_base_url, 2024, 1),
            zip_bytes(&[("inf_diario_fi_202401.csv", csv.as_bytes())]),
        );
        let seen = RefCell::new(Vec::new());
        let callback = |p: &FetchProgress| seen.borrow_mut().push((p.stage.clone(), p.month));

        let query = ReportQuery::new(vec![2024], vec![1, 2]);
        let records =
            fetch_daily_reports(&transport, &config, &query, date(2024, 1, 20), Some(&callback)).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(seen.borrow().last(), Some(&(FetchStage::Complete, 1)));
    }

    #[test]
    fn test_fetch_downloads_yearly_archive_once() {
        let config = FundsConfig::default();
        let jan = format!("{}\nFI;11111111000111;;2019-01-02;1;1.0;10;0;0;3\n", HEADER);
        let feb = format!("{}\nFI;11111111000111;;2019-02-01;1;1.1;10;0;0;3\n", HEADER);
        let transport = MemoryTransport::new().with_body(
            report_url(&config.cvm_base_url, 2019, 1),
            zip_bytes(&[
                ("inf_diario_fi_201901.csv", jan.as_bytes()),
                ("inf_diario_fi_201902.csv", feb.as_bytes()),
            ]),
        );

        let query = ReportQuery::new(vec![2019], vec![1, 2]);
        let records = fetch_daily_reports(&transport, &config, &query, date(2024, 1, 1), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_fetch_propagates_missing_month() {
        let config = FundsConfig::default();
        let transport = MemoryTransport::new();
        let query = ReportQuery::new(vec![2024], vec![1]);
        let err = fetch_daily_reports(&transport, &config, &query, date(2024, 6, 1), None).unwrap_err();
        assert!(matches!(err, FundsError::Transport(TransportError::NotFound { .. })));
    }
}
