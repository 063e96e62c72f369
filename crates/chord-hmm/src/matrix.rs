use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Row sums must land within this of 1.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Dense row-major matrix whose rows are probability distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ProbabilityMatrix {
    /// Row-normalize non-negative weights.
    ///
    /// A row with no mass becomes uniform: it carries no information, and a
    /// zero row would make the state unreachable-from or absorbing.
    pub fn from_weights(rows: usize, cols: usize, mut values: Vec<f64>) -> Result<Self> {
        check_shape("weights", rows, cols, &values)?;
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(Error::InvalidProbability(*bad));
        }

        if cols > 0 {
            for row in values.chunks_exact_mut(cols) {
                let total: f64 = row.iter().sum();
                if total > 0.0 {
                    row.iter_mut().for_each(|v| *v /= total);
                } else {
                    row.iter_mut().for_each(|v| *v = 1.0 / cols as f64);
                }
            }
        }

        Ok(Self { rows, cols, values })
    }

    /// Wrap values whose rows are already distributions, checking that they
    /// are.
    pub fn from_probabilities(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        check_shape("probabilities", rows, cols, &values)?;
        let matrix = Self { rows, cols, values };
        for r in 0..rows {
            let sum: f64 = matrix.row(r).iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE || matrix.row(r).iter().any(|v| *v < 0.0) {
                return Err(Error::RowNotNormalized { row: r, sum });
            }
        }
        Ok(matrix)
    }

    /// Rows produced by a softmax whose degenerate entries were zeroed.
    /// Such rows may sum to less than 1.
    pub(crate) fn from_softmax_rows(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        Self { rows, cols, values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|r| self.row(r).iter().sum()).collect()
    }

    /// Keep the listed rows and columns (in the order given) and
    /// renormalize rows over the surviving columns.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> Result<Self> {
        self.check_indices(rows, cols)?;
        let values = rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| self.get(r, c)))
            .collect();
        Self::from_weights(rows.len(), cols.len(), values)
    }

    /// Keep the listed rows with every column. Rows stay normalized.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let all: Vec<usize> = (0..self.cols).collect();
        self.check_indices(rows, &all)?;
        let values = rows.iter().flat_map(|&r| self.row(r).iter().copied()).collect();
        Ok(Self {
            rows: rows.len(),
            cols: self.cols,
            values,
        })
    }

    /// Fail unless this matrix is `rows` × `cols`.
    pub fn expect_shape(&self, what: &'static str, rows: usize, cols: usize) -> Result<()> {
        if self.rows != rows {
            return Err(Error::DimensionMismatch {
                what,
                expected: rows,
                found: self.rows,
            });
        }
        if self.cols != cols {
            return Err(Error::DimensionMismatch {
                what,
                expected: cols,
                found: self.cols,
            });
        }
        Ok(())
    }

    /// CSV with a header row of column labels and one labeled row per matrix
    /// row; cells are percentages with two decimals (`12.50%`).
    pub fn to_percent_csv(&self, row_labels: &[String], col_labels: &[String]) -> Result<String> {
        if row_labels.len() != self.rows {
            return Err(Error::DimensionMismatch {
                what: "csv row labels",
                expected: self.rows,
                found: row_labels.len(),
            });
        }
        if col_labels.len() != self.cols {
            return Err(Error::DimensionMismatch {
                what: "csv column labels",
                expected: self.cols,
                found: col_labels.len(),
            });
        }

        let mut out = String::new();
        for label in col_labels {
            out.push(',');
            out.push_str(label);
        }
        out.push('\n');

        for (r, label) in row_labels.iter().enumerate() {
            out.push_str(label);
            for v in self.row(r) {
                let _ = write!(out, ",{:.2}%", v * 100.0);
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn check_indices(&self, rows: &[usize], cols: &[usize]) -> Result<()> {
        if let Some(&r) = rows.iter().find(|&&r| r >= self.rows) {
            return Err(Error::DimensionMismatch {
                what: "row index",
                expected: self.rows,
                found: r,
            });
        }
        if let Some(&c) = cols.iter().find(|&&c| c >= self.cols) {
            return Err(Error::DimensionMismatch {
                what: "column index",
                expected: self.cols,
                found: c,
            });
        }
        Ok(())
    }
}

fn check_shape(what: &'static str, rows: usize, cols: usize, values: &[f64]) -> Result<()> {
    if values.len() != rows * cols {
        return Err(Error::DimensionMismatch {
            what,
            expected: rows * cols,
            found: values.len(),
        });
    }
    Ok(())
}
