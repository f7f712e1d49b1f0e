//! Invariants that hold for every pixel, pool and year of a run.

mod common;

use approx::assert_relative_eq;
use bluecarbon::orchestrator::{Plan, Scenario, ScenarioBuilder};
use bluecarbon::pipeline::Layer;
use bluecarbon_components::parameters::BiophysicalTable;
use bluecarbon_core::pool::CarbonPool;
use bluecarbon_core::raster::{Raster, NODATA, UNDISTURBED};
use bluecarbon_core::store::{MemoryStore, RasterKey, RasterStore};
use common::*;
use std::sync::Arc;

const SECOND_TRANSITION: u32 = 2008;
const ANALYSIS: u32 = 2012;

/// Pixel 0 is converted back to mangrove in 2008 and pixel 1 to aquaculture.
fn two_transitions(store: &MemoryStore, biophysical: BiophysicalTable, label: &str) -> Scenario {
    let key = RasterKey::new("landcover/lulc-2008.bcr");
    store
        .write(
            &key,
            &Raster::from_rows(&[&[MANGROVE, AQUACULTURE, NODATA]]).unwrap(),
        )
        .unwrap();

    let mut builder = ScenarioBuilder::new();
    builder
        .with_baseline(BASELINE, baseline_key())
        .with_transition(SECOND_TRANSITION, key)
        .with_transition(TRANSITION, transition_key())
        .with_analysis_year(ANALYSIS)
        .with_biophysical_table(biophysical)
        .with_transition_table(transitions(label));
    builder.build().unwrap()
}

fn run(scenario: &Scenario, store: Arc<MemoryStore>) -> Plan {
    let plan = scenario.plan(store, 0).unwrap();
    let report = plan.execute().unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    plan
}

fn layer(plan: &Plan, pool: CarbonPool, year: u32, layer: Layer) -> Raster {
    let key = &plan.arena.require(pool, year, layer).unwrap().key;
    read(plan.graph.store().as_ref(), key)
}

fn valid_values(raster: &Raster) -> Vec<(usize, f32)> {
    (0..raster.shape().1)
        .filter_map(|col| raster.get(0, col).map(|v| (col, v)))
        .collect()
}

#[test]
fn test_stock_accretion_law() {
    let store = landscape();
    let scenario = two_transitions(&store, biophysical(), "high-impact-disturb");
    let plan = run(&scenario, store);

    for pool in CarbonPool::ALL {
        for year in BASELINE + 1..=ANALYSIS {
            let previous = layer(&plan, pool, year - 1, Layer::Stock);
            let net = layer(&plan, pool, year - 1, Layer::NetSequestration);
            let stock = layer(&plan, pool, year, Layer::Stock);
            for (col, value) in valid_values(&stock) {
                assert_relative_eq!(
                    value,
                    previous.get(0, col).unwrap() + net.get(0, col).unwrap(),
                    epsilon = 1e-3
                );
            }
            assert_eq!(stock.get(0, 2), None);
        }
    }
}

#[test]
fn test_year_of_disturbance_never_decreases() {
    let store = landscape();
    let scenario = two_transitions(&store, biophysical(), "high-impact-disturb");
    let plan = run(&scenario, store);

    for pool in CarbonPool::DISTURBING {
        let mut latest = vec![UNDISTURBED; 2];
        for year in TRANSITION..ANALYSIS {
            let disturbed = layer(&plan, pool, year, Layer::YearOfDisturbance);
            for (col, value) in valid_values(&disturbed) {
                assert!(value >= latest[col], "{} {} {}", pool, year, col);
                latest[col] = value;
            }
        }
        // Pixel 0 was disturbed in 2005 only, pixel 1 in 2008 only
        assert_eq!(latest, vec![2005.0, 2008.0]);
    }
}

#[test]
fn test_later_disturbance_uses_stock_before_transition() {
    let store = landscape();
    let scenario = two_transitions(&store, biophysical(), "high-impact-disturb");
    let plan = run(&scenario, store);

    let prior = layer(&plan, CarbonPool::Soil, SECOND_TRANSITION - 1, Layer::Stock);
    let volume = layer(
        &plan,
        CarbonPool::Soil,
        SECOND_TRANSITION,
        Layer::DisturbanceVolume,
    );
    assert_relative_eq!(volume.get(0, 1).unwrap(), 0.4 * prior.get(0, 1).unwrap());
    // Pixel 0 carries its 2005 disturbance forward
    assert_eq!(volume.get(0, 0), Some(48.0));
}

#[test]
fn test_zero_half_life_means_zero_emissions() {
    let mut records = records();
    for record in records.iter_mut() {
        record.soil.half_life = 0.0;
    }
    let store = landscape();
    let scenario = two_transitions(
        &store,
        BiophysicalTable::new(records).unwrap(),
        "high-impact-disturb",
    );
    let plan = run(&scenario, store);

    for year in TRANSITION..ANALYSIS {
        let volume = layer(&plan, CarbonPool::Soil, year, Layer::DisturbanceVolume);
        let emissions = layer(&plan, CarbonPool::Soil, year, Layer::Emissions);
        assert!(volume.get(0, 0).unwrap() > 0.0);
        for (_, value) in valid_values(&emissions) {
            assert_eq!(value, 0.0);
        }
    }
}

#[test]
fn test_litter_is_independent_of_disturbance() {
    let disturbed_store = landscape();
    let disturbed = two_transitions(&disturbed_store, biophysical(), "high-impact-disturb");
    let disturbed = run(&disturbed, disturbed_store);

    let calm_store = landscape();
    let calm = two_transitions(&calm_store, biophysical(), "NCC");
    let calm = run(&calm, calm_store);

    for year in BASELINE..=ANALYSIS {
        assert_eq!(
            layer(&disturbed, CarbonPool::Litter, year, Layer::Stock),
            layer(&calm, CarbonPool::Litter, year, Layer::Stock)
        );
    }
    assert_ne!(
        layer(&disturbed, CarbonPool::Soil, ANALYSIS, Layer::Stock),
        layer(&calm, CarbonPool::Soil, ANALYSIS, Layer::Stock)
    );
}

#[test]
fn test_regime_summaries_add_up_to_total() {
    let store = landscape();
    let scenario = two_transitions(&store, biophysical(), "high-impact-disturb");
    let names = scenario.names().clone();
    run(&scenario, store.clone());

    let regimes = scenario.horizon().regimes();
    assert_eq!(regimes.len(), 3);
    let summaries: Vec<Raster> = regimes
        .iter()
        .map(|r| read(store.as_ref(), &names.total_net_sequestration_between(r.start, r.end)))
        .collect();
    let total = read(store.as_ref(), &names.total_net_sequestration());

    for col in 0..2 {
        let sum: f32 = summaries.iter().map(|s| s.get(0, col).unwrap()).sum();
        assert_relative_eq!(total.get(0, col).unwrap(), sum, epsilon = 1e-3);
    }
    assert_eq!(total.get(0, 2), None);
}
