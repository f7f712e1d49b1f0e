//! Lookups from landcover rasters to parameter rasters.

use crate::matrix::{LandcoverCode, TransitionMatrix};
use super::map_pixels;
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::raster::Raster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Landcover codes are stored as integral floats.
#[inline]
pub(crate) fn code_of(pixel: f32) -> LandcoverCode {
    pixel.round() as LandcoverCode
}

/// Map every landcover code to a value, e.g. a class's initial stock.
///
/// A code with no entry in the mapping fails the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reclassify {
    /// Name of the landcover being reclassified, used in error messages
    pub landcover: String,
    pub mapping: BTreeMap<LandcoverCode, f32>,
}

impl Reclassify {
    pub fn new(landcover: impl Into<String>, mapping: BTreeMap<LandcoverCode, f32>) -> Self {
        Self {
            landcover: landcover.into(),
            mapping,
        }
    }
}

#[typetag::serde]
impl RasterOperation for Reclassify {
    fn n_inputs(&self) -> Option<usize> {
        Some(1)
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let output = map_pixels(self, inputs, |pixel| {
            let code = code_of(pixel[0]);
            self.mapping
                .get(&code)
                .copied()
                .ok_or_else(|| CarbonError::UnknownLandcoverCode {
                    code,
                    raster: self.landcover.clone(),
                })
        })?;
        Ok(vec![output])
    }
}

/// Look up a value by the `(from, to)` landcover pair of each pixel.
///
/// Inputs are the landcover before and after a transition. Pairs missing from
/// the matrix map to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionReclassify {
    pub matrix: TransitionMatrix,
}

impl TransitionReclassify {
    pub fn new(matrix: TransitionMatrix) -> Self {
        Self { matrix }
    }
}

#[typetag::serde]
impl RasterOperation for TransitionReclassify {
    fn n_inputs(&self) -> Option<usize> {
        Some(2)
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let output = map_pixels(self, inputs, |pixel| {
            Ok(self.matrix.get(code_of(pixel[0]), code_of(pixel[1])))
        })?;
        Ok(vec![output])
    }
}
