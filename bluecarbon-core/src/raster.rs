//! Aligned single-band rasters and the nodata convention shared by every output.

use crate::errors::{CarbonError, CarbonResult};
use crate::Year;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The single nodata sentinel used by every raster.
pub const NODATA: f32 = f32::MIN;

/// Value of a year-of-latest-disturbance pixel that has never been disturbed.
///
/// This is a valid value, not nodata.
pub const UNDISTURBED: f32 = -1.0;

/// True if `value` is the nodata sentinel (or NaN, which is never a valid value).
#[inline]
pub fn is_nodata(value: f32) -> bool {
    value == NODATA || value.is_nan()
}

/// Encode a year for storage in a year-of-disturbance raster.
#[inline]
pub fn year_to_pixel(year: Year) -> f32 {
    year as f32
}

/// Decode a year-of-disturbance pixel. Returns `None` for undisturbed pixels.
#[inline]
pub fn pixel_to_year(value: f32) -> Option<Year> {
    if value < 0.0 || is_nodata(value) {
        None
    } else {
        Some(value as Year)
    }
}

/// A grid of `f32` values on the shared, already-aligned landscape grid.
///
/// Landcover snapshots store their integer codes as integral floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    values: Array2<f32>,
}

impl Raster {
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// A raster with every pixel set to `value`.
    pub fn filled(shape: (usize, usize), value: f32) -> Self {
        Self::new(Array2::from_elem(shape, value))
    }

    /// Build a raster from row-major data.
    pub fn from_shape_vec(shape: (usize, usize), data: Vec<f32>) -> CarbonResult<Self> {
        let found = data.len();
        Array2::from_shape_vec(shape, data)
            .map(Self::new)
            .map_err(|_| {
                CarbonError::Codec(format!(
                    "{} values cannot fill a {}x{} raster",
                    found, shape.0, shape.1
                ))
            })
    }

    /// Build a raster from a slice of equally sized rows.
    pub fn from_rows(rows: &[&[f32]]) -> CarbonResult<Self> {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(CarbonError::ShapeMismatch {
                    expected: (rows.len(), n_cols),
                    found: (rows.len(), row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_shape_vec((rows.len(), n_cols), data)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Value at a pixel, or `None` when the pixel is nodata or out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values
            .get((row, col))
            .copied()
            .filter(|v| !is_nodata(*v))
    }

    /// Number of nodata pixels.
    pub fn nodata_count(&self) -> usize {
        self.values.iter().filter(|v| is_nodata(**v)).count()
    }

    /// The distinct integer codes held by a landcover raster, ignoring nodata.
    pub fn unique_codes(&self) -> BTreeSet<i64> {
        self.values
            .iter()
            .filter(|v| !is_nodata(**v))
            .map(|v| v.round() as i64)
            .collect()
    }

    /// Return an error unless `other` has the same shape.
    pub fn ensure_aligned(&self, other: &Raster) -> CarbonResult<()> {
        if self.shape() != other.shape() {
            return Err(CarbonError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        Ok(())
    }
}
