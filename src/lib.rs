//! Blue carbon accounting
//!
//! Tracks per-pixel carbon stocks in soil, biomass and litter through a
//! sequence of landcover transitions. Transitions disturb soil and biomass
//! carbon, which is then emitted as it decays, while every pool keeps
//! accumulating at the rate of its current landcover.
//!
//! A run is described by a [`config::RunConfig`] (or assembled directly with
//! an [`orchestrator::ScenarioBuilder`]) and planned as a content-addressed
//! task graph, so rerunning an unchanged scenario reuses every raster already
//! in the workspace.

pub mod config;
pub mod horizon;
pub mod names;
pub mod orchestrator;
pub mod pipeline;
pub mod valuation;

