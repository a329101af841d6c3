use super::{
    escape_xml, extent, scale_x, scale_y, svg_footer, svg_header, title, y_grid, ChartOptions,
    BENCHMARK_COLOR, FUND_COLOR, PADDING,
};
use crate::reports::RiskReturn;

/// A labelled point drawn on top of the fund cloud (a portfolio or a
/// benchmark). Metrics are fractions.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub name: String,
    pub volatility: f64,
    pub annual_return: f64,
}

impl Highlight {
    pub fn new(name: impl Into<String>, volatility: f64, annual_return: f64) -> Self {
        Self {
            name: name.into(),
            volatility,
            annual_return,
        }
    }
}

/// Annualized volatility (x) against annualized return (y), in percent.
///
/// Funds are drawn as translucent gray points; the portfolio (blue) and the
/// benchmark (red) as large labelled points.
pub fn risk_return_scatter(
    summary: &[RiskReturn],
    portfolio: Option<&Highlight>,
    benchmark: Option<&Highlight>,
    opts: &ChartOptions,
) -> String {
    let highlights: Vec<(&Highlight, &str)> = portfolio
        .map(|h| (h, FUND_COLOR))
        .into_iter()
        .chain(benchmark.map(|h| (h, BENCHMARK_COLOR)))
        .collect();

    let xs = summary
        .iter()
        .map(|r| r.volatility * 100.0)
        .chain(highlights.iter().map(|(h, _)| h.volatility * 100.0));
    let ys = summary
        .iter()
        .map(|r| r.annual_return * 100.0)
        .chain(highlights.iter().map(|(h, _)| h.annual_return * 100.0));

    let (Some(x_range), Some(y_range)) = (
        opts.x_limits.or_else(|| extent(xs)),
        opts.y_limits.or_else(|| extent(ys)),
    ) else {
        return String::new();
    };

    let width = opts.width as f64;
    let height = opts.height as f64;
    let mut svg = svg_header(opts.width, opts.height);
    title(
        &mut svg,
        width,
        opts.title.as_deref().unwrap_or("Risco x Retorno"),
    );
    y_grid(&mut svg, y_range, width, height, "%");

    for row in summary {
        let (x, y) = (row.volatility * 100.0, row.annual_return * 100.0);
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        svg.push_str(&format!(
            r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="3" fill="{color}" fill-opacity="0.45"><title>{name}</title></circle>"#,
            cx = scale_x(x, x_range, width),
            cy = scale_y(y, y_range, height),
            color = opts.color,
            name = escape_xml(&row.fund)
        ));
    }

    for (point, color) in highlights {
        let cx = scale_x(point.volatility * 100.0, x_range, width);
        let cy = scale_y(point.annual_return * 100.0, y_range, height);
        svg.push_str(&format!(
            r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="8" fill="{color}" />"#,
            cx = cx,
            cy = cy,
            color = color
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" font-weight="bold" fill="{color}">{name}</text>"#,
            x = cx + 12.0,
            y = cy - 8.0,
            color = color,
            name = escape_xml(&point.name)
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">Volatilidade (%aa)</text>"#,
        x = width / 2.0,
        y = height - 8.0
    ));
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="start">Retorno (%aa)</text>"#,
        x = 4.0,
        y = PADDING - 8.0
    ));
    svg.push_str(svg_footer());
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Vec<RiskReturn> {
        vec![
            RiskReturn {
                fund: "A // FUNDO A".to_string(),
                volatility: 0.05,
                annual_return: 0.12,
            },
            RiskReturn {
                fund: "B // FUNDO B&C".to_string(),
                volatility: 0.10,
                annual_return: 0.08,
            },
        ]
    }

    #[test]
    fn test_scatter_draws_every_fund() {
        let svg = risk_return_scatter(&summary(), None, None, &ChartOptions::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("fill-opacity=\"0.45\"").count(), 2);
        assert!(svg.contains("FUNDO B&amp;C"));
    }

    #[test]
    fn test_scatter_highlights() {
        let portfolio = Highlight::new("Carteira", 0.07, 0.10);
        let cdi = Highlight::new("CDI", 0.001, 0.11);
        let svg = risk_return_scatter(&summary(), Some(&portfolio), Some(&cdi), &ChartOptions::default());
        assert!(svg.contains(">Carteira</text>"));
        assert!(svg.contains(&format!("fill=\"{}\">CDI</text>", BENCHMARK_COLOR)));
    }

    #[test]
    fn test_scatter_empty_summary() {
        assert!(risk_return_scatter(&[], None, None, &ChartOptions::default()).is_empty());
    }
}
