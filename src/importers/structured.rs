//! Private equity (FIP) and receivables (FIDC) fund reports.
//!
//! Both are returned untyped: their layouts change often and callers
//! usually only look at a handful of columns.

use std::time::Instant;
use tracing::info;

use super::{decode_latin1, parse_csv, read_zip_csv, RawTable};
use crate::config::FundsConfig;
use crate::error::{FundsError, Result};
use crate::http::Transport;

pub fn fip_url(base_url: &str, year: i32) -> String {
    format!(
        "{}/FIP/DOC/INF_TRIMESTRAL/DADOS/inf_trimestral_fip_{:04}.csv",
        base_url, year
    )
}

pub fn fidc_url(base_url: &str, year: i32, month: u32) -> String {
    format!(
        "{}/FIDC/DOC/INF_MENSAL/DADOS/inf_mensal_fidc_{:04}{:02}.zip",
        base_url, year, month
    )
}

/// Table X.2 (quota values and returns per share class)
pub fn fidc_member(year: i32, month: u32) -> String {
    format!("inf_mensal_fidc_tab_X_2_{:04}{:02}.csv", year, month)
}

/// Quarterly FIP report for `year` (a plain CSV, not zipped).
pub fn fetch_fip(transport: &dyn Transport, config: &FundsConfig, year: i32) -> Result<RawTable> {
    let started = Instant::now();
    let bytes = transport.get(&fip_url(&config.cvm_base_url, year))?;
    let table = parse_csv(&decode_latin1(&bytes))?;
    info!(
        "FIP {} finished in {:.2} minutes ({} rows)",
        year,
        started.elapsed().as_secs_f64() / 60.0,
        table.len()
    );
    Ok(table)
}

/// Monthly FIDC report, table X.2.
pub fn fetch_fidc(transport: &dyn Transport, config: &FundsConfig, year: i32, month: u32) -> Result<RawTable> {
    if !(1..=12).contains(&month) {
        return Err(FundsError::InvalidParameter(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }
    let started = Instant::now();
    let bytes = transport.get(&fidc_url(&config.cvm_base_url, year, month))?;
    let table = read_zip_csv(&bytes, &fidc_member(year, month))?;
    info!(
        "FIDC {}-{:02} finished in {:.2} minutes ({} rows)",
        year,
        month,
        started.elapsed().as_secs_f64() / 60.0,
        table.len()
    );
    Ok(table)
}
