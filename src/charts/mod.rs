//! Standalone SVG charts.
//!
//! Every renderer returns the SVG document as a `String`; nothing touches
//! the filesystem unless [`save_svg`] is called. Values are fractions and
//! are shown as percentages.

pub mod heatmap;
pub mod lines;
pub mod scatter;

use chrono::{Datelike, NaiveDate};
use std::path::Path;

use crate::error::Result;

pub use heatmap::{benchmark_heatmap, returns_heatmap};
pub use lines::{fund_evolution, rolling_returns_chart, EvolutionChart};
pub use scatter::{risk_return_scatter, Highlight};

// Same base size as the QuantStats figures (~576x288)
const WIDTH: u32 = 576;
const HEIGHT: u32 = 288;
const PADDING: f64 = 36.0;

pub(crate) const FUND_COLOR: &str = "#348dc1";
pub(crate) const BENCHMARK_COLOR: &str = "#d62728";
pub(crate) const ACCENT_COLOR: &str = "#8c8c8c";
pub(crate) const BEST_COLOR: &str = "#2ca02c";
pub(crate) const WORST_COLOR: &str = "#d62728";
pub(crate) const PALETTE: [&str; 6] = ["#ff9933", "#9467bd", "#8c564b", "#e377c2", "#17becf", "#bcbd22"];

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    /// Fixed x range (in the axis unit, e.g. % for scatter plots)
    pub x_limits: Option<(f64, f64)>,
    pub y_limits: Option<(f64, f64)>,
    /// Color of the non-highlighted series or points
    pub color: String,
    pub title: Option<String>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            x_limits: None,
            y_limits: None,
            color: ACCENT_COLOR.to_string(),
            title: None,
        }
    }
}

impl ChartOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Write an SVG document to `path`.
pub fn save_svg(path: &Path, svg: &str) -> Result<()> {
    std::fs::write(path, svg)?;
    tracing::debug!("Saved chart to {:?}", path);
    Ok(())
}

pub(crate) fn svg_header(width: u32, height: u32) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style><rect width="100%" height="100%" fill="#ffffff" />"##,
        w = width,
        h = height
    )
}

pub(crate) fn svg_footer() -> &'static str {
    "</svg>"
}

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) fn title(svg: &mut String, width: f64, text: &str) {
    svg.push_str(&format!(
        r##"<text x="{x:.2}" y="18" text-anchor="middle" font-size="13" font-weight="bold" fill="#000">{text}</text>"##,
        x = width / 2.0,
        text = escape_xml(text)
    ));
}

/// Min/max over finite values, widened when flat. `None` when empty.
pub(crate) fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if !min_v.is_finite() || !max_v.is_finite() {
        return None;
    }
    if min_v == max_v {
        let adjust = if min_v == 0.0 { 1.0 } else { min_v.abs() * 0.1 };
        min_v -= adjust;
        max_v += adjust;
    }
    Some((min_v, max_v))
}

/// Map `value` in `[min_v, max_v]` to a y pixel (top is max).
pub(crate) fn scale_y(value: f64, (min_v, max_v): (f64, f64), height: f64) -> f64 {
    let inner_height = height - 2.0 * PADDING;
    let norm = (value - min_v) / (max_v - min_v);
    PADDING + (1.0 - norm) * inner_height
}

pub(crate) fn scale_x(value: f64, (min_v, max_v): (f64, f64), width: f64) -> f64 {
    let inner_width = width - 2.0 * PADDING;
    let norm = (value - min_v) / (max_v - min_v);
    PADDING + norm * inner_width
}

pub(crate) fn x_positions(len: usize, width: f64) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    if len == 1 {
        return vec![width / 2.0];
    }

    let inner_width = width - 2.0 * PADDING;
    (0..len)
        .map(|i| PADDING + inner_width * (i as f64 / (len - 1) as f64))
        .collect()
}

pub(crate) fn polyline(points: &[(f64, f64)], stroke: &str, stroke_width: f64) -> String {
    if points.is_empty() {
        return String::new();
    }

    let coords = points
        .iter()
        .map(|(x, y)| format!("{:.2},{:.2}", x, y))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"<polyline fill="none" stroke="{stroke}" stroke-width="{stroke_width}" points="{coords}" />"#,
        stroke = stroke,
        stroke_width = stroke_width,
        coords = coords
    )
}

/// Horizontal grid lines with value labels on the left.
pub(crate) fn y_grid(svg: &mut String, range: (f64, f64), width: f64, height: f64, unit: &str) {
    let ticks = 5;
    for i in 0..=ticks {
        let value = range.0 + (range.1 - range.0) * i as f64 / ticks as f64;
        let y = scale_y(value, range, height);
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#e5e5e5" stroke-width="0.5" />"##,
            x1 = PADDING,
            x2 = width - PADDING,
            y = y
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{value:.1}{unit}</text>"#,
            x = PADDING - 4.0,
            y = y + 3.0,
            value = value,
            unit = unit
        ));
    }
}

/// Date labels along the bottom axis, one per year (or per month for
/// short series).
pub(crate) fn time_axis(svg: &mut String, dates: &[NaiveDate], xs: &[f64], height: f64) {
    let monthly = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => first.year() == last.year(),
        _ => return,
    };
    let axis_y = height - PADDING + 5.0;

    let mut last_key: Option<(i32, u32)> = None;
    for (date, x) in dates.iter().zip(xs) {
        let key = if monthly {
            (date.year(), date.month())
        } else {
            (date.year(), 0)
        };
        if last_key == Some(key) {
            continue;
        }
        last_key = Some(key);

        let label = if monthly {
            date.format("%Y-%m").to_string()
        } else {
            date.year().to_string()
        };
        svg.push_str(&format!(
            r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="#ccc" stroke-width="1" />"##,
            x = x,
            y1 = axis_y,
            y2 = axis_y + 4.0
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            x = x,
            y = axis_y + 16.0,
            label = label
        ));
    }
}

pub(crate) struct LegendEntry {
    pub label: String,
    pub color: String,
}

pub(crate) fn legend(svg: &mut String, entries: &[LegendEntry], width: f64) {
    let x = width - PADDING - 150.0;
    let mut y = PADDING + 10.0;
    for entry in entries {
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="1.5" />"##,
            x1 = x,
            x2 = x + 20.0,
            y = y - 4.0,
            color = entry.color
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="start" fill="#333">{label}</text>"##,
            x = x + 26.0,
            y = y,
            label = escape_xml(&entry.label)
        ));
        y += 14.0;
    }
}
