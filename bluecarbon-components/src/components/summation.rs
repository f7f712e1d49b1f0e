//! Pixel-wise sums: stock updates, summaries, projections and valuation.

use super::map_pixels;
use bluecarbon_core::errors::CarbonResult;
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::raster::Raster;
use serde::{Deserialize, Serialize};

/// Sum any number of aligned rasters, scaled by `factor`.
///
/// Used for the yearly stock update (`stock + net sequestration`), the per
/// regime summaries and the total carbon stock. Net present value rasters are
/// sums of net sequestration summaries scaled by a discounted price factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumRasters {
    pub factor: f64,
}

impl SumRasters {
    pub fn new() -> Self {
        Self { factor: 1.0 }
    }

    pub fn scaled(factor: f64) -> Self {
        Self { factor }
    }
}

impl Default for SumRasters {
    fn default() -> Self {
        Self::new()
    }
}

#[typetag::serde]
impl RasterOperation for SumRasters {
    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let output = map_pixels(self, inputs, |pixel| {
            let total: f64 = pixel.iter().map(|v| *v as f64).sum();
            Ok((total * self.factor) as f32)
        })?;
        Ok(vec![output])
    }
}

/// Project a stock forward at a constant rate: `stock + rate * years`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProjection {
    pub years: u32,
}

impl LinearProjection {
    pub fn new(years: u32) -> Self {
        Self { years }
    }
}

#[typetag::serde]
impl RasterOperation for LinearProjection {
    fn n_inputs(&self) -> Option<usize> {
        Some(2)
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let years = self.years as f32;
        let output = map_pixels(self, inputs, |pixel| {
            Ok(pixel[0] + pixel[1] * years)
        })?;
        Ok(vec![output])
    }
}
