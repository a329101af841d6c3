use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::{escape_xml, svg_footer, svg_header, title, HEIGHT, WIDTH};
use crate::reports::periods::{beat_ratio_by_year, period_returns, Frequency, PeriodReturn};

const MONTH_LABELS: [&str; 12] = [
    "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
];

const LEFT_PAD: f64 = 55.0;
const RIGHT_PAD: f64 = 20.0;
const TOP_PAD: f64 = 40.0;
const BOTTOM_PAD: f64 = 30.0;

fn period_label(freq: Frequency, period: u32) -> String {
    match freq {
        Frequency::Monthly => MONTH_LABELS
            .get(period as usize - 1)
            .map(|l| l.to_string())
            .unwrap_or_else(|| period.to_string()),
        _ => period.to_string(),
    }
}

/// Blend white into the positive (green) or negative (red) base color,
/// keeping a minimum intensity.
fn cell_color(value: f64, max_abs: f64) -> (String, f64) {
    let t = 0.2 + 0.8 * (value.abs() / max_abs).min(1.0);
    let (br, bg, bb) = if value >= 0.0 {
        (79.0, 164.0, 135.0)
    } else {
        (175.0, 75.0, 100.0)
    };
    let r = 255.0 * (1.0 - t) + br * t;
    let g = 255.0 * (1.0 - t) + bg * t;
    let b = 255.0 * (1.0 - t) + bb * t;
    (format!("rgb({:.0},{:.0},{:.0})", r, g, b), t)
}

struct Grid {
    years: Vec<i32>,
    cells: BTreeMap<(i32, u32), f64>,
    max_abs: f64,
}

impl Grid {
    fn new(returns: &[PeriodReturn]) -> Self {
        let cells: BTreeMap<(i32, u32), f64> = returns.iter().map(|p| ((p.year, p.period), p.value)).collect();
        let mut years: Vec<i32> = cells.keys().map(|(y, _)| *y).collect();
        years.dedup();
        let max_abs = cells.values().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        Self {
            years,
            cells,
            max_abs: if max_abs == 0.0 { 1.0 } else { max_abs },
        }
    }
}

fn push_cell(svg: &mut String, (x, y, w, h): (f64, f64, f64, f64), fill: &str, text: &str, text_color: &str, bold: bool) {
    svg.push_str(&format!(
        r##"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{fill}" stroke="#ffffff" stroke-width="0.5" />"##,
        x = x,
        y = y,
        w = w,
        h = h,
        fill = fill
    ));
    if !text.is_empty() {
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-size="9" fill="{color}"{weight}>{text}</text>"#,
            x = x + w / 2.0,
            y = y + h / 2.0 + 3.0,
            color = text_color,
            weight = if bold { r#" font-weight="bold""# } else { "" },
            text = text
        ));
    }
}

/// Draw the years × periods grid, plus one extra column per year when
/// `extra` is given (header, value per year as a fraction).
fn render(
    title_text: &str,
    grid: &Grid,
    freq: Frequency,
    extra: Option<(&str, &BTreeMap<i32, f64>)>,
) -> String {
    if grid.years.is_empty() {
        return String::new();
    }

    let width = WIDTH as f64;
    let height = HEIGHT as f64;
    let periods = freq.periods_per_year() as usize;
    let cols = periods + usize::from(extra.is_some());
    let cell_w = (width - LEFT_PAD - RIGHT_PAD) / cols as f64;
    let cell_h = (height - TOP_PAD - BOTTOM_PAD) / grid.years.len() as f64;

    let mut svg = svg_header(WIDTH, HEIGHT);
    title(&mut svg, width, title_text);

    for period in 1..=periods as u32 {
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" fill="#808080">{label}</text>"##,
            x = LEFT_PAD + (period as f64 - 0.5) * cell_w,
            y = height - BOTTOM_PAD + 12.0,
            label = period_label(freq, period)
        ));
    }
    if let Some((header, _)) = extra {
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-weight="bold" fill="#000">{label}</text>"##,
            x = LEFT_PAD + (periods as f64 + 0.5) * cell_w,
            y = TOP_PAD - 6.0,
            label = escape_xml(header)
        ));
    }
    svg.push_str(&format!(
        r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-weight="bold" fill="#808080">{label}</text>"##,
        x = width / 2.0,
        y = height - 4.0,
        label = freq.axis_label()
    ));

    for (row, year) in grid.years.iter().enumerate() {
        let y_top = TOP_PAD + row as f64 * cell_h;
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="end" fill="#808080">{year}</text>"##,
            x = LEFT_PAD - 5.0,
            y = y_top + cell_h / 2.0 + 3.0,
            year = year
        ));

        for period in 1..=periods as u32 {
            let x_left = LEFT_PAD + (period - 1) as f64 * cell_w;
            match grid.cells.get(&(*year, period)) {
                Some(v) => {
                    let (fill, t) = cell_color(*v, grid.max_abs);
                    let text_color = if t > 0.6 { "#ffffff" } else { "#262626" };
                    let text = format!("{:.2}", v * 100.0);
                    push_cell(&mut svg, (x_left, y_top, cell_w, cell_h), &fill, &text, text_color, false);
                }
                None => push_cell(&mut svg, (x_left, y_top, cell_w, cell_h), "#f5f5f5", "", "", false),
            }
        }

        if let Some((_, ratios)) = extra {
            let x_left = LEFT_PAD + periods as f64 * cell_w;
            let ratio = ratios.get(year).copied().unwrap_or(0.0);
            // Centered on 50%: green when the fund won most periods
            let (fill, t) = cell_color((ratio - 0.5) * 2.0, 1.0);
            let text_color = if t > 0.6 { "#ffffff" } else { "#262626" };
            let text = format!("{:.2}%", ratio * 100.0);
            push_cell(&mut svg, (x_left, y_top, cell_w, cell_h), &fill, &text, text_color, true);
        }
    }

    svg.push_str(svg_footer());
    svg
}

/// Compounded returns of one series per year and period, in percent.
/// Periods without data are drawn as empty cells.
pub fn returns_heatmap(name: &str, dates: &[NaiveDate], returns: &[f64], freq: Frequency) -> String {
    let grid = Grid::new(&period_returns(dates, returns, freq));
    render(
        &format!("Retornos {} (%) - {}", freq.title_label(), name),
        &grid,
        freq,
        None,
    )
}

/// Fund grid plus an `"Ultrapassa <benchmark>"` column holding, per year,
/// the share of periods in which the fund beat the benchmark. Both return
/// series are aligned on `dates`.
pub fn benchmark_heatmap(
    name: &str,
    dates: &[NaiveDate],
    fund_returns: &[f64],
    bench_name: &str,
    bench_returns: &[f64],
    freq: Frequency,
) -> String {
    let fund = period_returns(dates, fund_returns, freq);
    let bench = period_returns(dates, bench_returns, freq);
    let ratios = beat_ratio_by_year(&fund, &bench);
    let header = format!("Ultrapassa {}", bench_name);

    render(
        &format!("Retornos {} (%) - {}", freq.title_label(), name),
        &Grid::new(&fund),
        freq,
        Some((header.as_str(), &ratios)),
    )
}
