//! Core types for blue carbon accounting: rasters, raster stores and the
//! content-addressed task graph that schedules raster computations.

pub mod algebra;
pub mod codec;
pub mod errors;
pub mod graph;
pub mod operation;
pub mod pool;
pub mod raster;
pub mod store;

/// A calendar year.
pub type Year = u32;
