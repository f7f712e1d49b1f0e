//! A small landscape shared by the integration tests.
//!
//! Three pixels: the first is mangrove converted to aquaculture in 2005, the
//! second stays mangrove and the third is nodata throughout.

#![allow(dead_code)]

use bluecarbon::orchestrator::{Scenario, ScenarioBuilder};
use bluecarbon_components::parameters::{
    BiophysicalRecord, BiophysicalTable, PoolParameters, TransitionRow, TransitionTable,
};
use bluecarbon_core::raster::{Raster, NODATA};
use bluecarbon_core::store::{MemoryStore, RasterKey, RasterStore};
use std::sync::Arc;

pub const BASELINE: u32 = 2000;
pub const TRANSITION: u32 = 2005;
pub const END: u32 = 2007;

pub const MANGROVE: f32 = 1.0;
pub const AQUACULTURE: f32 = 2.0;

pub fn pool(initial: f32, accumulation: f32, half_life: f32, disturb: [f32; 3]) -> PoolParameters {
    PoolParameters {
        initial,
        yearly_accumulation: accumulation,
        half_life,
        low_impact_disturb: disturb[0],
        medium_impact_disturb: disturb[1],
        high_impact_disturb: disturb[2],
    }
}

pub fn records() -> Vec<BiophysicalRecord> {
    vec![
        BiophysicalRecord {
            code: 1,
            class: "mangrove".to_string(),
            soil: pool(100.0, 5.0, 1.0, [0.1, 0.2, 0.4]),
            biomass: pool(50.0, 2.0, 10.0, [0.3, 0.5, 0.8]),
            litter: pool(3.0, 0.5, 0.0, [0.0; 3]),
        },
        BiophysicalRecord {
            code: 2,
            class: "aquaculture".to_string(),
            soil: pool(20.0, 0.0, 5.0, [0.1, 0.2, 0.3]),
            biomass: pool(0.0, 0.0, 1.0, [0.0; 3]),
            litter: pool(0.0, 0.0, 0.0, [0.0; 3]),
        },
    ]
}

pub fn biophysical() -> BiophysicalTable {
    BiophysicalTable::new(records()).unwrap()
}

fn row(from: &str, cells: [&str; 2]) -> TransitionRow {
    TransitionRow {
        from_class: Some(from.to_string()),
        cells: cells.iter().map(|c| Some(c.to_string())).collect(),
    }
}

/// Mangrove to aquaculture is a high impact disturbance.
pub fn transitions(disturbance: &str) -> TransitionTable {
    TransitionTable {
        to_classes: vec![Some("mangrove".to_string()), Some("aquaculture".to_string())],
        rows: vec![
            row("mangrove", ["accum", disturbance]),
            row("aquaculture", ["accum", "NCC"]),
        ],
    }
}

pub fn baseline_key() -> RasterKey {
    RasterKey::new("landcover/lulc-2000.bcr")
}

pub fn transition_key() -> RasterKey {
    RasterKey::new("landcover/lulc-2005.bcr")
}

/// A store holding the two landcover snapshots.
pub fn landscape() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .write(
            &baseline_key(),
            &Raster::from_rows(&[&[MANGROVE, MANGROVE, NODATA]]).unwrap(),
        )
        .unwrap();
    store
        .write(
            &transition_key(),
            &Raster::from_rows(&[&[AQUACULTURE, MANGROVE, NODATA]]).unwrap(),
        )
        .unwrap();
    Arc::new(store)
}

/// The single-transition scenario over `2000..=2007`.
pub fn builder() -> ScenarioBuilder {
    let mut builder = ScenarioBuilder::new();
    builder
        .with_baseline(BASELINE, baseline_key())
        .with_transition(TRANSITION, transition_key())
        .with_analysis_year(END)
        .with_biophysical_table(biophysical())
        .with_transition_table(transitions("high-impact-disturb"));
    builder
}

pub fn scenario() -> Scenario {
    builder().build().unwrap()
}

pub fn read(store: &dyn RasterStore, key: &RasterKey) -> Raster {
    store
        .read(key)
        .unwrap_or_else(|e| panic!("could not read {}: {}", key, e))
}

/// Value of a pixel, `None` for nodata.
pub fn pixel(store: &dyn RasterStore, key: &RasterKey, col: usize) -> Option<f32> {
    read(store, key).get(0, col)
}
