//! Wide date-indexed table of `f64` series.
//!
//! Rows are sorted unique dates, columns are named series and `NaN` marks a
//! missing observation. Quotas, returns and benchmark levels all travel as
//! panels between the merger, the metrics and the charts.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{FundsError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    /// Column-major: `values[col][row]`
    values: Vec<Vec<f64>>,
}

impl Panel {
    /// Build from aligned columns. Dates must be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(FundsError::InvalidParameter(format!(
                "{} column names for {} columns",
                columns.len(),
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| v.len() != dates.len()) {
            return Err(FundsError::InvalidParameter(format!(
                "column length {} does not match {} dates",
                bad.len(),
                dates.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FundsError::InvalidParameter(
                "panel dates must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { dates, columns, values })
    }

    /// Single-column panel from unsorted (date, value) pairs; later
    /// duplicates of a date overwrite earlier ones.
    pub fn from_series(name: &str, dates: &[NaiveDate], values: &[f64]) -> Self {
        Self::from_long(
            dates
                .iter()
                .zip(values)
                .map(|(d, v)| (*d, name.to_string(), *v)),
        )
    }

    /// Pivot long (date, column, value) triples. Columns keep their order of
    /// first appearance.
    pub fn from_long(rows: impl IntoIterator<Item = (NaiveDate, String, f64)>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut col_index: HashMap<String, usize> = HashMap::new();
        let mut cells: BTreeMap<NaiveDate, HashMap<usize, f64>> = BTreeMap::new();

        for (date, column, value) in rows {
            let idx = match col_index.get(&column) {
                Some(idx) => *idx,
                None => {
                    columns.push(column.clone());
                    col_index.insert(column, columns.len() - 1);
                    columns.len() - 1
                }
            };
            cells.entry(date).or_default().insert(idx, value);
        }

        let dates: Vec<NaiveDate> = cells.keys().copied().collect();
        let mut values = vec![vec![f64::NAN; dates.len()]; columns.len()];
        for (row, row_cells) in cells.values().enumerate() {
            for (col, value) in row_cells {
                values[*col][row] = *value;
            }
        }
        Self { dates, columns, values }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    pub fn column_at(&self, idx: usize) -> &[f64] {
        &self.values[idx]
    }

    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Number of non-missing observations in a column
    pub fn valid_count(&self, idx: usize) -> usize {
        self.values[idx].iter().filter(|v| !v.is_nan()).count()
    }

    pub fn first_valid(&self, idx: usize) -> Option<(NaiveDate, f64)> {
        self.dates
            .iter()
            .zip(&self.values[idx])
            .find(|(_, v)| !v.is_nan())
            .map(|(d, v)| (*d, *v))
    }

    pub fn last_valid(&self, idx: usize) -> Option<(NaiveDate, f64)> {
        self.dates
            .iter()
            .zip(&self.values[idx])
            .rev()
            .find(|(_, v)| !v.is_nan())
            .map(|(d, v)| (*d, *v))
    }

    /// Apply `f` to every column, keeping names and dates.
    pub fn map_columns(&self, f: impl Fn(&[f64]) -> Vec<f64>) -> Panel {
        Panel {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|c| f(c)).collect(),
        }
    }

    /// Keep the named columns, in the given order. Unknown names are ignored.
    pub fn select(&self, names: &[String]) -> Panel {
        let idxs: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        Panel {
            dates: self.dates.clone(),
            columns: idxs.iter().map(|&i| self.columns[i].clone()).collect(),
            values: idxs.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    /// Keep rows for which `keep(row_index)` is true.
    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> Panel {
        let rows: Vec<usize> = (0..self.n_rows()).filter(|&r| keep(r)).collect();
        Panel {
            dates: rows.iter().map(|&r| self.dates[r]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    pub fn row(&self, r: usize) -> Vec<f64> {
        self.values.iter().map(|col| col[r]).collect()
    }

    /// Drop every row holding at least one missing value.
    pub fn dropna(&self) -> Panel {
        self.filter_rows(|r| self.values.iter().all(|col| !col[r].is_nan()))
    }

    /// Drop rows where every value is missing.
    pub fn dropna_all(&self) -> Panel {
        self.filter_rows(|r| self.values.iter().any(|col| !col[r].is_nan()))
    }

    /// Union of dates, columns of `self` followed by those of `other`.
    /// Columns of `other` whose name already exists are suffixed with `_2`.
    pub fn outer_join(&self, other: &Panel) -> Panel {
        let dates: Vec<NaiveDate> = self
            .dates
            .iter()
            .chain(other.dates.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut columns = Vec::with_capacity(self.n_cols() + other.n_cols());
        let mut values = Vec::with_capacity(self.n_cols() + other.n_cols());
        for source in [self, other] {
            for (name, col) in source.iter_columns() {
                let mut aligned = vec![f64::NAN; dates.len()];
                for (d, v) in source.dates.iter().zip(col) {
                    aligned[position[d]] = *v;
                }
                let name = if columns.iter().any(|c: &String| c == name) {
                    format!("{}_2", name)
                } else {
                    name.to_string()
                };
                columns.push(name);
                values.push(aligned);
            }
        }
        Panel { dates, columns, values }
    }

    /// Append a column aligned on this panel's dates.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.dates.len() {
            return Err(FundsError::InvalidParameter(format!(
                "column length {} does not match {} dates",
                values.len(),
                self.dates.len()
            )));
        }
        self.columns.push(name.into());
        self.values.push(values);
        Ok(())
    }

    /// Drop columns for which `keep(name)` is false.
    pub fn retain_columns(&mut self, keep: impl Fn(&str) -> bool) {
        let columns = std::mem::take(&mut self.columns);
        let values = std::mem::take(&mut self.values);
        for (name, col) in columns.into_iter().zip(values) {
            if keep(&name) {
                self.columns.push(name);
                self.values.push(col);
            }
        }
    }
}
