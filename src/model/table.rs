use crate::{Error, Result};
use std::fmt;

/// Rows shown when a table is rendered for logging.
const DISPLAY_ROWS: usize = 20;

/// Numeric rows of uniform width, stored row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    n_cols: usize,
    values: Vec<f64>,
}

impl Table {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if n_cols == 0 && !rows.is_empty() {
            return Err(Error::parse("rows must have at least one field"));
        }
        let mut values = Vec::with_capacity(rows.len() * n_cols);

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::parse(format!(
                    "row {} has {} fields, expected {}",
                    i + 1,
                    row.len(),
                    n_cols
                )));
            }
            values.extend(row);
        }

        Ok(Self { n_cols, values })
    }

    /// Parses a headerless CSV body. Empty fields become `NaN`.
    pub fn from_csv(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::parse(format!("request body is not valid UTF-8: {}", e)))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut n_cols = None;
        let mut values = Vec::new();

        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| Error::parse(format!("malformed CSV: {}", e)))?;
            let width = *n_cols.get_or_insert(record.len());
            if record.len() != width {
                return Err(Error::parse(format!(
                    "row {} has {} fields, expected {}",
                    i + 1,
                    record.len(),
                    width
                )));
            }

            for (j, field) in record.iter().enumerate() {
                values.push(parse_field(field).ok_or_else(|| {
                    Error::parse(format!(
                        "row {}, column {}: '{}' is not a number",
                        i + 1,
                        j + 1,
                        field
                    ))
                })?);
            }
        }

        Ok(Self {
            n_cols: n_cols.unwrap_or(0),
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.values.len() / self.n_cols
        }
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.n_rows() {
            return None;
        }
        let start = index * self.n_cols;
        self.values.get(start..start + self.n_cols)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.n_cols.max(1))
    }
}

fn parse_field(field: &str) -> Option<f64> {
    if field.is_empty() {
        Some(f64::NAN)
    } else {
        field.parse().ok()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{} rows x {} columns]", self.n_rows(), self.n_cols)?;
        for (i, row) in self.rows().take(DISPLAY_ROWS).enumerate() {
            write!(f, "{}:", i)?;
            for value in row {
                write!(f, " {}", value)?;
            }
            writeln!(f)?;
        }
        if self.n_rows() > DISPLAY_ROWS {
            writeln!(f, "... ({} more rows)", self.n_rows() - DISPLAY_ROWS)?;
        }
        Ok(())
    }
}
