use crate::pool_state::{track_disturbance, Disturbance};
use super::map_pixels;
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::raster::Raster;
use bluecarbon_core::Year;
use serde::{Deserialize, Serialize};

/// Record the disturbance caused by the transition in `year`.
///
/// Inputs are the disturbance magnitude and the stock in the year before the
/// transition, followed by the previous disturbance volume and
/// year-of-latest-disturbance rasters when an earlier transition exists.
///
/// Outputs are the disturbance volume and year-of-latest-disturbance rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDisturbance {
    pub year: Year,
}

impl TrackDisturbance {
    pub fn new(year: Year) -> Self {
        Self { year }
    }

    fn previous(inputs: &[f32]) -> Disturbance {
        match inputs {
            [_, _, volume, year] => Disturbance {
                volume: *volume,
                year: *year,
            },
            _ => Disturbance::NONE,
        }
    }
}

#[typetag::serde]
impl RasterOperation for TrackDisturbance {
    fn n_outputs(&self) -> usize {
        2
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>> {
        if inputs.len() != 2 && inputs.len() != 4 {
            return Err(CarbonError::WrongArity {
                operation: format!("{:?}", self),
                expected: 4,
                found: inputs.len(),
            });
        }
        let volume = map_pixels(self, inputs, |pixel| {
            Ok(track_disturbance(pixel[0], pixel[1], Self::previous(pixel), self.year).volume)
        })?;
        let year = map_pixels(self, inputs, |pixel| {
            Ok(track_disturbance(pixel[0], pixel[1], Self::previous(pixel), self.year).year)
        })?;
        Ok(vec![volume, year])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluecarbon_core::raster::{NODATA, UNDISTURBED};

    #[test]
    fn first_transition() {
        let magnitude = Raster::from_rows(&[&[0.4, 0.0, 0.5]]).unwrap();
        let stock = Raster::from_rows(&[&[120.0, 80.0, NODATA]]).unwrap();

        let outputs = TrackDisturbance::new(5).apply(&[magnitude, stock]).unwrap();

        assert_eq!(outputs[0].get(0, 0), Some(48.0));
        assert_eq!(outputs[0].get(0, 1), Some(0.0));
        assert_eq!(outputs[0].get(0, 2), None);
        assert_eq!(outputs[1].get(0, 0), Some(5.0));
        assert_eq!(outputs[1].get(0, 1), Some(UNDISTURBED));
        assert_eq!(outputs[1].get(0, 2), None);
    }

    #[test]
    fn later_transition_carries_previous_disturbance() {
        let magnitude = Raster::from_rows(&[&[0.0, 0.5, 0.0]]).unwrap();
        let stock = Raster::from_rows(&[&[100.0, 100.0, 100.0]]).unwrap();
        let volume = Raster::from_rows(&[&[48.0, 48.0, 0.0]]).unwrap();
        let year = Raster::from_rows(&[&[5.0, 5.0, UNDISTURBED]]).unwrap();

        let outputs = TrackDisturbance::new(9)
            .apply(&[magnitude, stock, volume, year])
            .unwrap();

        assert_eq!(outputs[0].get(0, 0), Some(48.0));
        assert_eq!(outputs[1].get(0, 0), Some(5.0));
        assert_eq!(outputs[0].get(0, 1), Some(50.0));
        assert_eq!(outputs[1].get(0, 1), Some(9.0));
        assert_eq!(outputs[0].get(0, 2), Some(0.0));
        assert_eq!(outputs[1].get(0, 2), Some(UNDISTURBED));
    }

    #[test]
    fn rejects_three_inputs() {
        let raster = Raster::filled((1, 1), 1.0);
        let inputs = vec![raster.clone(), raster.clone(), raster];
        assert!(matches!(
            TrackDisturbance::new(1).apply(&inputs),
            Err(CarbonError::WrongArity { found: 3, .. })
        ));
    }
}
