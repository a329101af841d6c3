//! Join daily report rows with registry metadata.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::cnpj::canonicalize;
use crate::importers::daily_report::dedup_records;
use crate::importers::{DailyReportRecord, FundClass, FundRegistryEntry};
use crate::panel::Panel;

/// One report row enriched with the fund's registry data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub cnpj: String,
    pub legal_name: String,
    pub class: Option<FundClass>,
    /// `"<cnpj> // <legal name>"`, the column name used in panels and charts
    pub display_key: String,
    pub quota: f64,
    pub net_assets: f64,
    pub total_value: Option<f64>,
    pub shareholders: Option<u32>,
    pub inflows: Option<f64>,
    pub outflows: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedFundSeries {
    /// Sorted by date, then identifier
    pub rows: Vec<MergedRow>,
}

pub fn display_key(cnpj: &str, legal_name: &str) -> String {
    format!("{} // {}", cnpj, legal_name)
}

/// Split a display key back into (identifier, name).
pub fn split_display_key(key: &str) -> (&str, &str) {
    match key.split_once(" // ") {
        Some((cnpj, name)) => (cnpj, name),
        None => (key, ""),
    }
}

/// Inner join of report rows and registry entries on the canonical
/// identifier. Unmatched identifiers on either side are dropped.
pub fn merge(registry: &[FundRegistryEntry], report: &[DailyReportRecord]) -> MergedFundSeries {
    if registry.is_empty() || report.is_empty() {
        return MergedFundSeries::default();
    }

    let mut by_cnpj: HashMap<String, &FundRegistryEntry> = HashMap::new();
    for entry in registry {
        let cnpj = canonicalize(&entry.cnpj);
        if by_cnpj.contains_key(&cnpj) {
            warn!("Duplicate registry entry for {}, keeping the first", cnpj);
            continue;
        }
        by_cnpj.insert(cnpj, entry);
    }

    let records = dedup_records(
        report
            .iter()
            .cloned()
            .map(|mut r| {
                r.cnpj = canonicalize(&r.cnpj);
                r
            })
            .collect(),
    );

    let mut unmatched = HashSet::new();
    let rows: Vec<MergedRow> = records
        .into_iter()
        .filter_map(|r| {
            let Some(entry) = by_cnpj.get(&r.cnpj) else {
                unmatched.insert(r.cnpj);
                return None;
            };
            Some(MergedRow {
                display_key: display_key(&r.cnpj, &entry.legal_name),
                legal_name: entry.legal_name.clone(),
                class: entry.class,
                date: r.date,
                cnpj: r.cnpj,
                quota: r.quota,
                net_assets: r.net_assets,
                total_value: r.total_value,
                shareholders: r.shareholders,
                inflows: r.inflows,
                outflows: r.outflows,
            })
        })
        .collect();

    if !unmatched.is_empty() {
        debug!("{} reported funds missing from the registry", unmatched.len());
    }
    MergedFundSeries { rows }
}

impl MergedFundSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct display keys in order of first appearance
    pub fn funds(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.display_key.as_str()))
            .map(|r| r.display_key.clone())
            .collect()
    }

    /// Quotas pivoted to one column per fund, keyed by display key.
    pub fn quota_panel(&self) -> Panel {
        Panel::from_long(
            self.rows
                .iter()
                .map(|r| (r.date, r.display_key.clone(), r.quota)),
        )
    }

    /// Keep only the listed identifiers (any formatting).
    pub fn filter_funds(&self, cnpjs: &[String]) -> MergedFundSeries {
        let wanted: HashSet<String> = cnpjs.iter().map(|c| canonicalize(c)).collect();
        MergedFundSeries {
            rows: self
                .rows
                .iter()
                .filter(|r| wanted.contains(&r.cnpj))
                .cloned()
                .collect(),
        }
    }
}
