//! Terminal tables for the comparison results
//!
//! Presentation only: numbers arrive as fractions and are formatted the
//! Brazilian way (`12,34%`), signed values colored when the
//! [`DisplayConfig`] asks for it.

use colored::Colorize;
use itertools::Itertools;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::config::DisplayConfig;
use crate::importers::FundRegistryEntry;
use crate::merge::split_display_key;
use crate::reports::{BenchmarkBeat, Outperformance, RiskReturn, YearlyReturns};
use crate::utils::format_percent;

fn signed_percent(value: f64, config: &DisplayConfig) -> String {
    let text = format_percent(value, config.precision);
    if !config.colorize || !value.is_finite() {
        return text;
    }
    if value >= 0.0 {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// Rows beyond `max_rows` are summarized in a trailing line.
fn limit<'a, T>(rows: &'a [T], config: &DisplayConfig) -> (&'a [T], Option<String>) {
    if config.max_rows == 0 || rows.len() <= config.max_rows {
        return (rows, None);
    }
    let hidden = rows.len() - config.max_rows;
    (
        &rows[..config.max_rows],
        Some(format!("\n... {} more rows", hidden)),
    )
}

fn finish(mut table: Table, first_numeric: usize, footer: Option<String>) -> String {
    table.with(Style::modern());
    table.modify(Columns::new(first_numeric..), Alignment::right());
    let mut output = table.to_string();
    if let Some(footer) = footer {
        output.push_str(&footer);
    }
    output
}

/// Annualized return and volatility per fund.
pub fn format_risk_return_table(summary: &[RiskReturn], config: &DisplayConfig) -> String {
    #[derive(Tabled)]
    struct RiskReturnRow {
        #[tabled(rename = "CNPJ")]
        cnpj: String,
        #[tabled(rename = "Fundo")]
        name: String,
        #[tabled(rename = "Retorno (%aa)")]
        annual_return: String,
        #[tabled(rename = "Volatilidade (%aa)")]
        volatility: String,
    }

    if summary.is_empty() {
        return format_empty("Nenhum fundo com dados suficientes", config);
    }

    let (shown, footer) = limit(summary, config);
    let rows: Vec<RiskReturnRow> = shown
        .iter()
        .map(|r| {
            let (cnpj, name) = split_display_key(&r.fund);
            RiskReturnRow {
                cnpj: cnpj.to_string(),
                name: name.to_string(),
                annual_return: signed_percent(r.annual_return, config),
                volatility: format_percent(r.volatility, config.precision),
            }
        })
        .collect();

    finish(Table::new(&rows), 2, footer)
}

/// Funds that beat every benchmark, one column per benchmark.
pub fn format_beats_table(beats: &[BenchmarkBeat], config: &DisplayConfig) -> String {
    if beats.is_empty() {
        return format_empty("Nenhum fundo supera os benchmarks", config);
    }

    let benchmarks: Vec<&str> = beats
        .iter()
        .flat_map(|b| b.ratios.iter().map(|(name, _)| name.as_str()))
        .unique()
        .collect();

    let (shown, footer) = limit(beats, config);
    let mut builder = Builder::default();
    builder.push_record(
        ["Fundo".to_string()]
            .into_iter()
            .chain(benchmarks.iter().map(|b| format!("Supera {}", b))),
    );
    for beat in shown {
        let cells = benchmarks.iter().map(|b| {
            beat.ratios
                .iter()
                .find(|(name, _)| name.as_str() == *b)
                .map(|(_, ratio)| format_percent(*ratio, config.precision))
                .unwrap_or_else(|| "-".to_string())
        });
        builder.push_record([beat.fund.clone()].into_iter().chain(cells));
    }

    finish(builder.build(), 1, footer)
}

/// Mean excess returns per fund and benchmark.
pub fn format_outperformance_table(stats: &[Outperformance], config: &DisplayConfig) -> String {
    if stats.is_empty() {
        return format_empty("Nenhum fundo atende ao critério", config);
    }

    let (shown, footer) = limit(stats, config);
    let mut builder = Builder::default();
    builder.push_record([
        "Fundo",
        "Benchmark",
        "Média acima",
        "Média abaixo",
        "Razão média",
    ]);
    for fund in shown {
        for excess in &fund.stats {
            builder.push_record([
                fund.fund.clone(),
                excess.benchmark.clone(),
                signed_percent(excess.mean_above, config),
                signed_percent(excess.mean_below, config),
                format_percent(excess.mean_ratio, config.precision),
            ]);
        }
    }

    finish(builder.build(), 2, footer)
}

/// Cumulative return reached by the end of each year, funds as rows.
pub fn format_yearly_returns_table(yearly: &YearlyReturns, config: &DisplayConfig) -> String {
    if yearly.funds.is_empty() || yearly.years.is_empty() {
        return format_empty("Sem retornos anuais", config);
    }

    let (shown, footer) = limit(&yearly.funds, config);
    let mut builder = Builder::default();
    builder.push_record(
        ["Fundo".to_string()]
            .into_iter()
            .chain(yearly.years.iter().map(|y| y.to_string())),
    );
    for (fund, values) in shown.iter().zip(&yearly.values) {
        builder.push_record(
            [fund.clone()]
                .into_iter()
                .chain(values.iter().map(|v| signed_percent(*v, config))),
        );
    }

    finish(builder.build(), 1, footer)
}

/// Registry entries kept after the status, type and class filters.
pub fn format_registry_table(entries: &[FundRegistryEntry], config: &DisplayConfig) -> String {
    #[derive(Tabled)]
    struct RegistryRow {
        #[tabled(rename = "CNPJ")]
        cnpj: String,
        #[tabled(rename = "Denominação")]
        legal_name: String,
        #[tabled(rename = "Tipo")]
        fund_type: String,
        #[tabled(rename = "Classe")]
        class: String,
    }

    if entries.is_empty() {
        return format_empty("Nenhum fundo encontrado", config);
    }

    let (shown, footer) = limit(entries, config);
    let rows: Vec<RegistryRow> = shown
        .iter()
        .map(|e| RegistryRow {
            cnpj: e.cnpj.clone(),
            legal_name: e.legal_name.clone(),
            fund_type: e.fund_type.clone(),
            class: e.class_label.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    let mut output = table.to_string();
    if let Some(footer) = footer {
        output.push_str(&footer);
    }
    output
}

/// Notice printed in place of a table without rows.
pub fn format_empty(message: &str, config: &DisplayConfig) -> String {
    if config.colorize {
        format!("{} {}\n", "ℹ".blue().bold(), message)
    } else {
        format!("ℹ {}\n", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> DisplayConfig {
        DisplayConfig {
            precision: 2,
            max_rows: 0,
            colorize: false,
        }
    }

    #[test]
    fn test_risk_return_table() {
        let summary = vec![RiskReturn {
            fund: "00000000000191 // FUNDO ALPHA".to_string(),
            volatility: 0.05,
            annual_return: 0.1234,
        }];
        let table = format_risk_return_table(&summary, &plain());
        assert!(table.contains("Retorno (%aa)"));
        assert!(table.contains("FUNDO ALPHA"));
        assert!(table.contains("12,34%"));
        assert!(table.contains("5,00%"));
    }

    #[test]
    fn test_max_rows_footer() {
        let summary: Vec<RiskReturn> = (0..3)
            .map(|i| RiskReturn {
                fund: format!("{} // FUNDO {}", i, i),
                volatility: 0.01,
                annual_return: 0.01,
            })
            .collect();
        let config = DisplayConfig {
            max_rows: 2,
            ..plain()
        };
        let table = format_risk_return_table(&summary, &config);
        assert!(table.contains("FUNDO 1"));
        assert!(!table.contains("FUNDO 2"));
        assert!(table.ends_with("... 1 more rows"));
    }

    #[test]
    fn test_beats_table_columns() {
        let beats = vec![BenchmarkBeat {
            fund: "F".to_string(),
            ratios: vec![("CDI".to_string(), 0.75), ("IBOV".to_string(), 0.6)],
        }];
        let table = format_beats_table(&beats, &plain());
        assert!(table.contains("Supera CDI"));
        assert!(table.contains("Supera IBOV"));
        assert!(table.contains("75,00%"));
    }

    #[test]
    fn test_yearly_table_negative_values() {
        let yearly = YearlyReturns {
            years: vec![2023, 2024],
            funds: vec!["F".to_string()],
            values: vec![vec![0.1, -0.05]],
        };
        let table = format_yearly_returns_table(&yearly, &plain());
        assert!(table.contains("2024"));
        assert!(table.contains("-5,00%"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(format_outperformance_table(&[], &plain()).contains("Nenhum fundo"));
        assert!(format_registry_table(&[], &plain()).contains("Nenhum fundo encontrado"));
    }

    #[test]
    fn test_empty_notice_respects_colorize() {
        assert_eq!(format_empty("Sem dados", &plain()), "ℹ Sem dados\n");
        assert!(!format_risk_return_table(&[], &plain()).contains('\u{1b}'));
    }
}
