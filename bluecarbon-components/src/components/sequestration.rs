use crate::pool_state::net_sequestration;
use super::map_pixels;
use bluecarbon_core::errors::CarbonResult;
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::raster::Raster;
use serde::{Deserialize, Serialize};

/// Accumulation minus emissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetSequestration {}

#[typetag::serde]
impl RasterOperation for NetSequestration {
    fn n_inputs(&self) -> Option<usize> {
        Some(2)
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        let output = map_pixels(self, inputs, |pixel| {
            Ok(net_sequestration(pixel[0], pixel[1]))
        })?;
        Ok(vec![output])
    }
}
