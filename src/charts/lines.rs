use std::cmp::Ordering;

use super::{
    extent, legend, polyline, scale_y, svg_footer, svg_header, time_axis, title, x_positions, y_grid,
    ChartOptions, LegendEntry, BEST_COLOR, FUND_COLOR, PADDING, PALETTE, WORST_COLOR,
};
use crate::cnpj::canonicalize;
use crate::merge::split_display_key;
use crate::panel::Panel;
use crate::utils::fold_text;

/// Quota chart together with the data actually drawn.
#[derive(Debug, Clone)]
pub struct EvolutionChart {
    pub data: Panel,
    pub svg: String,
}

/// Columns of `quotas` (keyed `"<cnpj> // <name>"`) requested by `funds`.
///
/// An entry selects a column when it equals the identifier or the name.
/// When no name matches exactly, names containing an entry (accents and case
/// folded) are taken instead.
fn select_funds(quotas: &Panel, funds: &[String]) -> Vec<String> {
    let wanted: Vec<String> = funds.iter().map(|f| f.trim().to_uppercase()).collect();
    let wanted_cnpjs: Vec<String> = wanted
        .iter()
        .filter(|f| f.chars().any(|c| c.is_ascii_digit()))
        .map(|f| canonicalize(f))
        .collect();

    let by_cnpj: Vec<&String> = quotas
        .columns()
        .iter()
        .filter(|c| {
            let (cnpj, _) = split_display_key(c);
            wanted.iter().any(|w| w == cnpj) || wanted_cnpjs.iter().any(|w| w == cnpj)
        })
        .collect();

    let mut by_name: Vec<&String> = quotas
        .columns()
        .iter()
        .filter(|c| {
            let (_, name) = split_display_key(c);
            !name.is_empty() && wanted.iter().any(|w| *w == name.to_uppercase())
        })
        .collect();

    if by_name.is_empty() {
        let folded: Vec<String> = wanted.iter().map(|w| fold_text(w)).filter(|w| !w.is_empty()).collect();
        by_name = quotas
            .columns()
            .iter()
            .filter(|c| {
                let name = fold_text(split_display_key(c).1);
                folded.iter().any(|w| name.contains(w.as_str()))
            })
            .collect();
    }

    let mut selected: Vec<String> = Vec::new();
    for column in by_name.into_iter().chain(by_cnpj) {
        if !selected.contains(column) {
            selected.push(column.clone());
        }
    }
    selected
}

/// Quota evolution of the requested funds.
///
/// Columns without any value are dropped and only dates on which every
/// selected fund has a positive quota are kept. With more than two funds the
/// best and worst final quotas are highlighted and labelled. `None` when no
/// fund matches or no date survives.
pub fn fund_evolution(quotas: &Panel, funds: &[String], opts: &ChartOptions) -> Option<EvolutionChart> {
    let selected = select_funds(quotas, funds);
    if selected.is_empty() {
        tracing::warn!("No fund found for {:?}", funds);
        return None;
    }

    let mut data = quotas.select(&selected);
    let empty: Vec<String> = (0..data.n_cols())
        .filter(|&i| data.valid_count(i) == 0)
        .map(|i| data.columns()[i].clone())
        .collect();
    data.retain_columns(|name| !empty.iter().any(|e| e == name));
    let data = data.filter_rows(|r| data.n_cols() > 0 && data.row(r).iter().all(|v| *v > 0.0));
    if data.is_empty() || data.n_cols() == 0 {
        return None;
    }

    let highlights = if data.n_cols() > 2 {
        let last = data.row(data.n_rows() - 1);
        let order = |a: &(usize, &f64), b: &(usize, &f64)| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal);
        let best = last.iter().enumerate().max_by(order).map(|(i, _)| i);
        let worst = last.iter().enumerate().min_by(order).map(|(i, _)| i);
        best.zip(worst)
    } else {
        None
    };

    let width = opts.width as f64;
    let height = opts.height as f64;
    let xs = x_positions(data.n_rows(), width);
    let y_range = opts
        .y_limits
        .or_else(|| extent(data.iter_columns().flat_map(|(_, col)| col.iter().copied())))?;

    let mut svg = svg_header(opts.width, opts.height);
    if let Some(text) = &opts.title {
        title(&mut svg, width, text);
    }
    y_grid(&mut svg, y_range, width, height, "");

    let points = |col: &[f64]| -> Vec<(f64, f64)> {
        xs.iter()
            .zip(col)
            .map(|(x, v)| (*x, scale_y(*v, y_range, height)))
            .collect()
    };

    // Plain series first so the highlighted ones are drawn on top
    for (i, (_, col)) in data.iter_columns().enumerate() {
        if highlights.is_some_and(|(best, worst)| i == best || i == worst) {
            continue;
        }
        let stroke = if data.n_cols() > 2 { opts.color.as_str() } else { FUND_COLOR };
        svg.push_str(&polyline(&points(col), stroke, 1.0));
    }

    if let Some((best, worst)) = highlights {
        for (idx, color, dy) in [(best, BEST_COLOR, -8.0), (worst, WORST_COLOR, 14.0)] {
            let col = data.column_at(idx);
            let pts = points(col);
            svg.push_str(&polyline(&pts, color, 1.5));
            if let Some((x, y)) = pts.last() {
                let (cnpj, _) = split_display_key(&data.columns()[idx]);
                svg.push_str(&format!(
                    r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" font-weight="bold" fill="{color}">{label}</text>"#,
                    x = x,
                    y = y + dy,
                    color = color,
                    label = super::escape_xml(cnpj)
                ));
            }
        }
    }

    time_axis(&mut svg, data.dates(), &xs, height);
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="start">Cotas</text>"#,
        x = 4.0,
        y = PADDING - 8.0
    ));
    svg.push_str(svg_footer());

    Some(EvolutionChart { data, svg })
}

/// Rolling `hp`-day returns of `fund` against every other column of
/// `rolling` (as produced by `rolling_window_returns`), in percent.
pub fn rolling_returns_chart(fund: &str, rolling: &Panel, hp: usize) -> String {
    let opts = ChartOptions::default();
    let width = opts.width as f64;
    let height = opts.height as f64;

    let Some(y_range) = extent(
        rolling
            .iter_columns()
            .flat_map(|(_, col)| col.iter().map(|v| v * 100.0)),
    ) else {
        return String::new();
    };
    let xs = x_positions(rolling.n_rows(), width);
    let points = |col: &[f64]| -> Vec<(f64, f64)> {
        xs.iter()
            .zip(col)
            .filter(|(_, v)| v.is_finite())
            .map(|(x, v)| (*x, scale_y(v * 100.0, y_range, height)))
            .collect()
    };

    let mut svg = svg_header(opts.width, opts.height);
    title(&mut svg, width, &format!("Retorno de {} dias", hp));
    y_grid(&mut svg, y_range, width, height, "%");

    let mut entries = Vec::new();
    let benchmarks = rolling.iter_columns().filter(|(name, _)| *name != fund);
    for ((name, col), color) in benchmarks.zip(PALETTE.iter().cycle()) {
        svg.push_str(&polyline(&points(col), color, 1.0));
        entries.push(LegendEntry {
            label: name.to_string(),
            color: color.to_string(),
        });
    }
    if let Some(col) = rolling.column(fund) {
        svg.push_str(&polyline(&points(col), FUND_COLOR, 2.0));
        let (_, name) = split_display_key(fund);
        let label = if name.is_empty() { fund } else { name };
        entries.insert(
            0,
            LegendEntry {
                label: label.to_string(),
                color: FUND_COLOR.to_string(),
            },
        );
    }

    time_axis(&mut svg, rolling.dates(), &xs, height);
    legend(&mut svg, &entries, width);
    svg.push_str(svg_footer());
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, month, day).unwrap()
    }

    fn quotas() -> Panel {
        Panel::new(
            vec![d(1, 2), d(1, 3), d(1, 4)],
            vec![
                "00000000000001 // FUNDO AÇÕES ALPHA".to_string(),
                "00000000000002 // FUNDO RENDA FIXA BETA".to_string(),
                "00000000000003 // FUNDO AÇÕES GAMA".to_string(),
                "00000000000004 // FUNDO VAZIO".to_string(),
            ],
            vec![
                vec![1.0, 1.1, 1.3],
                vec![2.0, 2.0, 2.1],
                vec![f64::NAN, 0.9, 0.8],
                vec![f64::NAN, f64::NAN, f64::NAN],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_select_by_cnpj_and_name() {
        let selected = select_funds(
            &quotas(),
            &["00000000000001".to_string(), "fundo renda fixa beta".to_string()],
        );
        assert_eq!(
            selected,
            vec![
                "00000000000002 // FUNDO RENDA FIXA BETA".to_string(),
                "00000000000001 // FUNDO AÇÕES ALPHA".to_string(),
            ]
        );
    }

    #[test]
    fn test_select_falls_back_to_accent_insensitive_substring() {
        let selected = select_funds(&quotas(), &["acoes".to_string()]);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|c| c.contains("AÇÕES")));
    }

    #[test]
    fn test_evolution_keeps_positive_complete_rows() {
        let funds = vec!["FUNDO".to_string()];
        let chart = fund_evolution(&quotas(), &funds, &ChartOptions::default()).unwrap();
        assert_eq!(chart.data.n_cols(), 3);
        assert_eq!(chart.data.dates(), &[d(1, 3), d(1, 4)]);
        assert!(chart.svg.contains(&format!("fill=\"{}\">00000000000002</text>", BEST_COLOR)));
        assert!(chart.svg.contains(&format!("fill=\"{}\">00000000000003</text>", WORST_COLOR)));
    }

    #[test]
    fn test_evolution_without_match() {
        let funds = vec!["INEXISTENTE".to_string()];
        assert!(fund_evolution(&quotas(), &funds, &ChartOptions::default()).is_none());
    }

    #[test]
    fn test_rolling_chart_has_fund_and_benchmarks() {
        let rolling = Panel::new(
            vec![d(1, 2), d(1, 3)],
            vec!["00000000000001 // FUNDO X".to_string(), "CDI".to_string()],
            vec![vec![0.01, 0.02], vec![0.005, 0.006]],
        )
        .unwrap();
        let svg = rolling_returns_chart("00000000000001 // FUNDO X", &rolling, 21);
        assert!(svg.contains("Retorno de 21 dias"));
        assert!(svg.contains(">FUNDO X</text>"));
        assert!(svg.contains(">CDI</text>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
    }
}
