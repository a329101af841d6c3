// Import module - CVM open-data parsers (registry, daily reports, FIP/FIDC)

pub mod daily_report;
pub mod registry;
pub mod structured;

use chrono::NaiveDate;
use encoding_rs::WINDOWS_1252;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{FundsError, Result};

pub use daily_report::{DailyReportRecord, FetchProgress, FetchStage, ReportQuery};
pub use registry::{FundClass, FundRegistryEntry, FundStatus};

/// Untyped `;`-delimited table as published by CVM: one header row, string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column named exactly `name` (case-insensitive)
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Index of the first column whose name contains `fragment`.
    ///
    /// CVM renamed several columns over time (`CNPJ_FUNDO` became
    /// `CNPJ_FUNDO_CLASSE`), so lookups by fragment cover both layouts.
    pub fn column_containing(&self, fragment: &str) -> Option<usize> {
        let fragment = fragment.to_ascii_uppercase();
        self.headers
            .iter()
            .position(|h| h.trim().to_ascii_uppercase().contains(&fragment))
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| FundsError::Parse(format!("missing CVM column: {}", name)))
    }
}

/// Cell value, trimmed; empty when the row is short
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// Decode an ISO-8859-1 payload (CVM files are Latin-1).
pub fn decode_latin1(bytes: &[u8]) -> String {
    let (decoded, _, _) = WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}

/// Parse `;`-delimited CSV text into a [`RawTable`].
pub fn parse_csv(content: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .quoting(false)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FundsError::parse("invalid CSV header", e))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| FundsError::parse("invalid CSV record", e))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(RawTable { headers, rows })
}

/// Open a ZIP archive held in memory and parse member `member` as CVM CSV.
///
/// Payloads that are not ZIP archives (HTML error pages, truncated
/// downloads) surface as [`FundsError::Parse`].
pub fn read_zip_csv(bytes: &[u8], member: &str) -> Result<RawTable> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FundsError::parse(format!("payload for {} is not a ZIP archive", member), e))?;

    let mut file = archive
        .by_name(member)
        .map_err(|e| FundsError::parse(format!("ZIP member {} not found", member), e))?;

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|e| FundsError::parse(format!("failed to read ZIP member {}", member), e))?;

    let table = parse_csv(&decode_latin1(&raw))?;
    tracing::debug!("Parsed {} rows from {}", table.len(), member);
    Ok(table)
}

/// Lenient float cast: empty or malformed cells become `None`.
///
/// Accepts both `1234.56` (CVM daily reports) and `1.234,56` (Tesouro).
pub fn parse_f64_lenient(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    crate::utils::parse_decimal_br(trimmed).ok()
}

/// Parse CVM (`2024-01-31`) or Brazilian (`31/01/2024`) dates.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}
