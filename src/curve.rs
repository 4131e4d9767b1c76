//! Lag-indexed result curves.
//!
//! Every analysis produces a [`Curve`]: per-track MSD/VACF, ensemble means and
//! pooled concatenations share the same row layout, which is also the layout
//! of the CSV and JSON exports.

use serde::{Deserialize, Serialize};
use std::io::Write;

/// One row of an MSD or VACF curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveRow {
    /// Time lag
    pub lag: f64,
    /// Mean value at this lag
    pub mean: f64,
    /// Dispersion of the contributing observations
    pub std: f64,
    /// Standard error of `mean`
    pub sem: f64,
    /// Number of contributing observations (point pairs)
    pub n: usize,
}

impl CurveRow {
    /// Creates a new CurveRow.
    pub fn new(lag: f64, mean: f64, std: f64, sem: f64, n: usize) -> Self {
        CurveRow {
            lag,
            mean,
            std,
            sem,
            n,
        }
    }
}

/// Ordered sequence of curve rows.
///
/// Curves built by the engine are sorted by lag. Pooled curves are a
/// concatenation and may repeat lags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    rows: Vec<CurveRow>,
}

impl Curve {
    /// Wraps rows as given; no sorting or merging is applied.
    pub fn new(rows: Vec<CurveRow>) -> Self {
        Curve { rows }
    }

    /// Appends the rows of every curve in order, without merging equal lags.
    pub fn concat<'a, I>(curves: I) -> Self
    where
        I: IntoIterator<Item = &'a Curve>,
    {
        Curve {
            rows: curves
                .into_iter()
                .flat_map(|curve| curve.rows.iter().copied())
                .collect(),
        }
    }

    /// All rows in stored order.
    pub fn rows(&self) -> &[CurveRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the curve has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lag column.
    pub fn lags(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.lag).collect()
    }

    /// Mean column.
    pub fn means(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.mean).collect()
    }

    /// First row whose lag equals `lag` within `tolerance`.
    pub fn row_at(&self, lag: f64, tolerance: f64) -> Option<&CurveRow> {
        self.rows.iter().find(|row| (row.lag - lag).abs() <= tolerance)
    }

    /// Writes `lag,mean,std,sem,n` rows with a header line.
    ///
    /// # Arguments
    /// * `writer` - Destination, e.g. a file or an in-memory buffer
    ///
    /// # Returns
    /// `Ok(())` once every row is flushed, or the underlying `csv::Error`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Serializes the curve as `{"rows": [...]}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
