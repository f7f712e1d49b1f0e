//! Raster operations used to advance carbon pools through time.
//!
//! - `Reclassify`: per-class parameters from a single landcover snapshot
//! - `TransitionReclassify`: per-transition parameters from two snapshots
//! - `TrackDisturbance`: disturbance volume and year at a transition
//! - `Emissions`: decay of disturbed carbon in a given year
//! - `NetSequestration`: accumulation minus emissions
//! - `SumRasters` and `LinearProjection`: stock updates, summaries and valuation

mod disturbance;
mod emissions;
mod reclassify;
mod sequestration;
mod summation;

pub use disturbance::TrackDisturbance;
pub use emissions::Emissions;
pub use reclassify::{Reclassify, TransitionReclassify};
pub use sequestration::NetSequestration;
pub use summation::{LinearProjection, SumRasters};

use bluecarbon_core::algebra::raster_map_with_stats;
use bluecarbon_core::errors::CarbonResult;
use bluecarbon_core::operation::{check_arity, RasterOperation};
use bluecarbon_core::raster::Raster;
use log::warn;

/// Apply `op` pixel-wise across `inputs`, warning about pixels where the
/// inputs disagree on nodata.
///
/// Fails before touching any pixel if `operation` takes a different number of
/// inputs.
pub(crate) fn map_pixels<F>(
    operation: &dyn RasterOperation,
    inputs: &[Raster],
    op: F,
) -> CarbonResult<Raster>
where
    F: Fn(&[f32]) -> CarbonResult<f32>,
{
    check_arity(operation, inputs.len())?;
    let inputs: Vec<_> = inputs.iter().collect();
    let (output, stats) = raster_map_with_stats(&inputs, op)?;
    if stats.nodata_mismatches > 0 {
        warn!(
            "{:?}: {} pixel(s) are nodata in some inputs but not others and were set to nodata",
            operation, stats.nodata_mismatches
        );
    }
    Ok(output)
}
