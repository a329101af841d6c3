//! Utility functions for number parsing and formatting
//!
//! Brazilian sources write numbers as `1.234,56`; tables printed by this
//! crate follow the same convention. Returns are fractions internally and
//! only become percentages here.

use crate::error::{FundsError, Result};

/// Core formatting function with Brazilian locale conventions:
/// - Thousands separator: `.` (period)
/// - Decimal separator: `,` (comma)
///
/// # Examples
/// ```
/// use cotas::utils::format_number_br;
///
/// assert_eq!(format_number_br(1234.56, 2), "1.234,56");
/// assert_eq!(format_number_br(-0.5, 1), "-0,5");
/// ```
pub fn format_number_br(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer_part, decimal_part) = match formatted.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (formatted.as_str(), None),
    };

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec!['.', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    match decimal_part {
        Some(d) => format!("{}{},{}", sign, with_separators, d),
        None => format!("{}{}", sign, with_separators),
    }
}

/// Format a fraction as a percentage: `0.1234` → `"12,34%"`
///
/// # Examples
/// ```
/// use cotas::utils::format_percent;
///
/// assert_eq!(format_percent(0.1234, 2), "12,34%");
/// ```
pub fn format_percent(fraction: f64, decimals: usize) -> String {
    if !fraction.is_finite() {
        return "-".to_string();
    }
    format!("{}%", format_number_br(fraction * 100.0, decimals))
}

/// Parse a Brazilian-formatted number (`1.234,56`, `6,47%`).
pub fn parse_decimal_br(input: &str) -> Result<f64> {
    let cleaned = input
        .trim()
        .replace('.', "")
        .replace(',', ".")
        .replace('%', "");
    if cleaned.is_empty() {
        return Err(FundsError::Parse("empty decimal input".to_string()));
    }
    cleaned
        .parse::<f64>()
        .map_err(|err| FundsError::parse(format!("invalid decimal '{}'", input), err))
}

/// Fold accents and case so fund names compare loosely
/// (`"Ações"` and `"ACOES"` match).
pub fn fold_text(input: &str) -> String {
    use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}
