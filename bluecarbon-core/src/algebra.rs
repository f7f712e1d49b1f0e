//! Block-wise raster algebra.
//!
//! Applies a per-pixel function across a stack of aligned rasters, one block
//! of rows at a time, writing a single output raster. Any pixel that is nodata
//! in *any* input is nodata in the output; the function is never called for
//! such pixels.

use crate::errors::{CarbonError, CarbonResult};
use crate::raster::{is_nodata, Raster, NODATA};
use ndarray::{s, Array2};

/// Number of rows processed together.
pub const BLOCK_ROWS: usize = 256;

/// Summary of a raster algebra pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlgebraStats {
    /// Pixels where every input held data.
    pub valid_pixels: usize,
    /// Pixels where some, but not all, inputs were nodata.
    pub nodata_mismatches: usize,
}

/// Apply `op` to every pixel of the stacked `inputs`.
///
/// `op` receives the input values for one pixel in input order. Errors from
/// `op` abort the pass and are returned unchanged.
pub fn raster_map<F>(inputs: &[&Raster], op: F) -> CarbonResult<Raster>
where
    F: Fn(&[f32]) -> CarbonResult<f32>,
{
    raster_map_with_stats(inputs, op).map(|(raster, _)| raster)
}

/// [`raster_map`], also returning the nodata statistics for the pass.
pub fn raster_map_with_stats<F>(inputs: &[&Raster], op: F) -> CarbonResult<(Raster, AlgebraStats)>
where
    F: Fn(&[f32]) -> CarbonResult<f32>,
{
    let first = inputs
        .first()
        .ok_or_else(|| CarbonError::Error("raster_map requires at least one input".to_string()))?;
    for other in &inputs[1..] {
        first.ensure_aligned(other)?;
    }

    let (n_rows, n_cols) = first.shape();
    let mut output = Array2::from_elem((n_rows, n_cols), NODATA);
    let mut stats = AlgebraStats::default();
    let mut pixel = vec![0.0_f32; inputs.len()];

    let mut block_start = 0;
    while block_start < n_rows {
        let block_end = (block_start + BLOCK_ROWS).min(n_rows);
        let blocks: Vec<_> = inputs
            .iter()
            .map(|r| r.values().slice(s![block_start..block_end, ..]))
            .collect();
        let mut target = output.slice_mut(s![block_start..block_end, ..]);

        for ((row, col), out) in target.indexed_iter_mut() {
            let mut n_nodata = 0;
            for (value, block) in pixel.iter_mut().zip(&blocks) {
                *value = block[[row, col]];
                if is_nodata(*value) {
                    n_nodata += 1;
                }
            }
            if n_nodata == 0 {
                *out = op(&pixel)?;
                stats.valid_pixels += 1;
            } else if n_nodata < inputs.len() {
                stats.nodata_mismatches += 1;
            }
        }
        block_start = block_end;
    }

    Ok((Raster::new(output), stats))
}

/// Sum the stacked rasters pixel-wise.
pub fn sum_rasters(inputs: &[&Raster]) -> CarbonResult<(Raster, AlgebraStats)> {
    raster_map_with_stats(inputs, |values| Ok(values.iter().sum()))
}
