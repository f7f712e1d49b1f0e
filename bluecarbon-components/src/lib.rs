//! Carbon parameters and raster operations for blue carbon accounting.
//!
//! # Module Organisation
//!
//! - `parameters`: biophysical and transition tables, and the Transition
//!   Parameter Store built from them
//! - `matrix`: sparse `(from, to)` transition matrices
//! - `tables`: CSV readers for the parameter tables
//! - `pool_state`: per-pixel disturbance, emissions and stock update rules
//! - `components`: raster operations scheduled on the task graph

pub mod components;
pub mod matrix;
pub mod parameters;
pub mod pool_state;
pub mod tables;
