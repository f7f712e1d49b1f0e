use crate::pool_state::{emissions, Disturbance};
use super::map_pixels;
use bluecarbon_core::errors::CarbonResult;
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::raster::Raster;
use bluecarbon_core::Year;
use serde::{Deserialize, Serialize};

/// Carbon emitted in `year` by the decay of previously disturbed carbon.
///
/// Inputs: disturbance volume, year of latest disturbance and half-life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emissions {
    pub year: Year,
}

impl Emissions {
    pub fn new(year: Year) -> Self {
        Self { year }
    }
}

#[typetag::serde]
impl RasterOperation for Emissions {
    fn n_inputs(&self) -> Option<usize> {
        Some(3)
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let output = map_pixels(self, inputs, |pixel| {
            let disturbance = Disturbance {
                volume: pixel[0],
                year: pixel[1],
            };
            emissions(disturbance, pixel[2], self.year)
        })?;
        Ok(vec![output])
    }
}
