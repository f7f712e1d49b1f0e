//! Per-pixel carbon pool state.
//!
//! Each (pool, pixel) is a small state machine advanced once per simulated
//! year. A pixel starts `Stable` and becomes `Decaying` the first time a
//! transition disturbs a positive volume of its carbon. Disturbed carbon is
//! then emitted with exponential decay:
//!
//! $$ E(t) = V \cdot \left(0.5^{(\Delta t - 1)/h} - 0.5^{\Delta t / h}\right) $$
//!
//! Where:
//! - $V$ is the volume disturbed by the latest disturbance
//! - $\Delta t$ is the number of years since that disturbance
//! - $h$ is the half-life of the carbon
//!
//! Litter never disturbs, so its net sequestration is its accumulation.
//!
//! These functions operate on single valid pixels; nodata handling is left to
//! the raster algebra that calls them.

use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::raster::{pixel_to_year, year_to_pixel, UNDISTURBED};
use bluecarbon_core::Year;

/// Half-lives at or below this are treated as "no decay modelled".
pub const MIN_HALF_LIFE: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// No disturbance seen yet
    Stable,
    /// At least one disturbance seen, emissions possible
    Decaying,
}

impl PoolState {
    /// State of a pixel given its year-of-latest-disturbance value.
    pub fn from_year_of_disturbance(pixel: f32) -> Self {
        match pixel_to_year(pixel) {
            Some(_) => PoolState::Decaying,
            None => PoolState::Stable,
        }
    }
}

/// The latest disturbance recorded for a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disturbance {
    /// Disturbed carbon
    /// unit: Mg C / ha
    pub volume: f32,
    /// Year of the disturbance, or [`UNDISTURBED`]
    pub year: f32,
}

impl Disturbance {
    pub const NONE: Disturbance = Disturbance {
        volume: 0.0,
        year: UNDISTURBED,
    };

    pub fn state(&self) -> PoolState {
        PoolState::from_year_of_disturbance(self.year)
    }
}

/// Update a pixel's disturbance at a transition year.
///
/// The disturbed volume is `magnitude * prior_stock`, where `prior_stock` is
/// the stock in the year before the transition. A positive volume replaces the
/// previous disturbance and stamps `year`; otherwise the previous disturbance
/// is carried forward untouched, so the year of disturbance never decreases.
///
/// Carbon from an earlier disturbance that has not decayed by the time of a
/// new one is not emitted later; it stays in the stock.
pub fn track_disturbance(
    magnitude: f32,
    prior_stock: f32,
    previous: Disturbance,
    year: Year,
) -> Disturbance {
    let volume = magnitude * prior_stock;
    if volume > 0.0 {
        Disturbance {
            volume,
            year: year_to_pixel(year),
        }
    } else {
        previous
    }
}

/// Carbon emitted from a pixel during `year`.
///
/// Emissions are zero for undisturbed pixels, for the disturbance year itself
/// and for half-lives of (approximately) zero. Negative or non-finite
/// half-lives are an error.
pub fn emissions(
    disturbance: Disturbance,
    half_life: f32,
    year: Year,
) -> CarbonResult<f32> {
    if !half_life.is_finite() || half_life < 0.0 {
        return Err(CarbonError::InvalidHalfLife { value: half_life });
    }
    let disturbed_in = match pixel_to_year(disturbance.year) {
        Some(disturbed_in) => disturbed_in,
        None => return Ok(0.0),
    };
    if year <= disturbed_in || half_life <= MIN_HALF_LIFE {
        return Ok(0.0);
    }

    let elapsed = (year - disturbed_in) as f32;
    Ok(disturbance.volume
        * (0.5_f32.powf((elapsed - 1.0) / half_life) - 0.5_f32.powf(elapsed / half_life)))
}

/// Accumulation minus emissions. May be negative.
#[inline]
pub fn net_sequestration(accumulation: f32, emissions: f32) -> f32 {
    accumulation - emissions
}

/// Stock at the start of the next year.
#[inline]
pub fn next_stock(stock: f32, net_sequestration: f32) -> f32 {
    stock + net_sequestration
}
