//! Reruns, failures and on-disk workspaces.

mod common;

use bluecarbon::config::RunConfig;
use bluecarbon_components::parameters::BiophysicalTable;
use bluecarbon_core::errors::CarbonError;
use bluecarbon_core::pool::CarbonPool;
use bluecarbon_core::raster::{Raster, NODATA};
use bluecarbon_core::store::{DirectoryStore, RasterKey, RasterStore, MANIFEST_NAME};
use common::*;
use std::fs;

mod cache {
    use super::*;

    #[test]
    fn test_rerun_reuses_every_task() {
        let store = landscape();
        let scenario = scenario();
        let first = scenario.run(store.clone(), 0).unwrap();
        let outputs: Vec<Vec<u8>> = first
            .outputs
            .iter()
            .map(|k| store.read_bytes(k).unwrap())
            .collect();

        let second = scenario.run(store.clone(), 2).unwrap();
        assert!(second.report.executed.is_empty());
        assert_eq!(second.report.cached.len(), first.report.executed.len());
        for (key, bytes) in first.outputs.iter().zip(outputs) {
            assert_eq!(store.read_bytes(key).unwrap(), bytes);
        }
    }

    #[test]
    fn test_changed_parameters_are_recomputed() {
        let store = landscape();
        scenario().run(store.clone(), 0).unwrap();

        let mut records = records();
        records[0].biomass.half_life = 20.0;
        let scenario = builder()
            .with_biophysical_table(BiophysicalTable::new(records).unwrap())
            .build()
            .unwrap();
        let rerun = scenario.run(store.clone(), 0).unwrap();

        assert!(rerun.report.executed.iter().any(|t| t.contains("halflife-biomass")));
        assert!(rerun.report.executed.iter().all(|t| !t.contains("-soil-")));
        assert!(rerun.report.cached.iter().any(|t| t.contains("-soil-")));
    }

    #[test]
    fn test_missing_output_is_rebuilt() {
        let store = landscape();
        let scenario = scenario();
        let first = scenario.run(store.clone(), 0).unwrap();
        let key = scenario.names().total_net_sequestration();
        let bytes = store.read_bytes(&key).unwrap();
        assert!(store.remove(&key));

        let second = scenario.run(store.clone(), 0).unwrap();
        assert_eq!(second.report.executed, vec![key.to_string()]);
        assert_eq!(
            second.report.cached.len() + 1,
            first.report.executed.len()
        );
        assert_eq!(store.read_bytes(&key).unwrap(), bytes);
    }
}

mod failures {
    use super::*;

    fn broken_biomass() -> BiophysicalTable {
        let mut records = records();
        records[0].biomass.half_life = -1.0;
        BiophysicalTable::new(records).unwrap()
    }

    #[test]
    fn test_failed_pool_does_not_stop_the_others() {
        let store = landscape();
        let scenario = builder()
            .with_biophysical_table(broken_biomass())
            .build()
            .unwrap();
        let names = scenario.names().clone();
        let plan = scenario.plan(store.clone(), 0).unwrap();
        let report = plan.execute().unwrap();

        assert!(!report.is_success());
        assert!(report
            .failed
            .iter()
            .all(|(task, _)| task.contains("emissions-biomass")));
        assert!(report
            .skipped
            .contains(&names.total_net_sequestration().to_string()));

        // Soil and litter ran to the end of the horizon
        assert!(store.exists(&names.stock(CarbonPool::Soil, END)));
        assert!(store.exists(&names.stock(CarbonPool::Litter, END)));
        assert!(!store.exists(&names.stock(CarbonPool::Biomass, END)));
        assert!(!store.exists(&names.total_stock(END)));
        // The baseline summaries do not depend on biomass emissions
        assert!(store.exists(&names.carbon_stock_at(BASELINE)));
    }

    #[test]
    fn test_run_reports_the_first_failure() {
        let store = landscape();
        let err = builder()
            .with_biophysical_table(broken_biomass())
            .build()
            .unwrap()
            .run(store, 0)
            .unwrap_err();
        assert!(matches!(err, CarbonError::TaskFailed { skipped, .. } if skipped > 0));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_fixed_rerun_keeps_completed_work() {
        let store = landscape();
        let broken = builder()
            .with_biophysical_table(broken_biomass())
            .build()
            .unwrap();
        broken.plan(store.clone(), 0).unwrap().execute().unwrap();

        let rerun = scenario().run(store.clone(), 0).unwrap();
        assert!(rerun.report.executed.iter().all(|t| !t.contains("-soil-")));
        assert!(rerun.report.executed.iter().any(|t| t.contains("-biomass-")));
    }
}

mod configuration {
    use super::*;

    #[test]
    fn test_unknown_landcover_code_is_rejected_before_running() {
        let store = landscape();
        store
            .write(
                &transition_key(),
                &Raster::from_rows(&[&[AQUACULTURE, 9.0, NODATA]]).unwrap(),
            )
            .unwrap();
        let before = store.keys();

        let err = scenario().run(store.clone(), 0).unwrap_err();
        assert!(matches!(
            err,
            CarbonError::UnknownLandcoverCode { code: 9, .. }
        ));
        assert!(err.is_configuration_error());
        assert_eq!(store.keys(), before);
    }

    #[test]
    fn test_misaligned_snapshots() {
        let store = landscape();
        store
            .write(
                &transition_key(),
                &Raster::from_rows(&[&[AQUACULTURE, MANGROVE]]).unwrap(),
            )
            .unwrap();
        let err = scenario().plan(store, 0).unwrap_err();
        assert!(matches!(err, CarbonError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_missing_snapshot() {
        let store = landscape();
        let err = builder()
            .with_transition(2006, RasterKey::new("landcover/lulc-2006.bcr"))
            .build()
            .unwrap()
            .plan(store, 0)
            .unwrap_err();
        assert!(matches!(err, CarbonError::RasterNotFound(_)));
    }

    #[test]
    fn test_unknown_transition_class() {
        let mut table = transitions("high-impact-disturb");
        table.to_classes[1] = Some("seagrass".to_string());
        let err = builder().with_transition_table(table).build().unwrap_err();
        assert!(matches!(err, CarbonError::UnknownLandcoverClass { .. }));
    }
}

mod directory {
    use super::*;

    const BIOPHYSICAL: &str = "\
lucode,lulc-class,soil-initial,soil-yearly-accumulation,soil-half-life,soil-low-impact-disturb,soil-medium-impact-disturb,soil-high-impact-disturb,biomass-initial,biomass-yearly-accumulation,biomass-half-life,biomass-low-impact-disturb,biomass-medium-impact-disturb,biomass-high-impact-disturb,litter-initial,litter-yearly-accumulation
1,mangrove,100,5,1,0.1,0.2,0.4,50,2,10,0.3,0.5,0.8,3,0.5
2,aquaculture,20,0,5,0.1,0.2,0.3,0,0,1,0,0,0,0,0
";

    const TRANSITIONS: &str = "\
lulc-class,mangrove,aquaculture
mangrove,accum,high-impact-disturb
aquaculture,accum,NCC
";

    const PRICES: &str = "\
year,price
2000,10
2001,10
2002,10
2003,10
2004,10
2005,10
2006,10
";

    fn workspace(valuation: &str) -> (tempfile::TempDir, RunConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("biophysical.csv"), BIOPHYSICAL).unwrap();
        fs::write(root.join("transitions.csv"), TRANSITIONS).unwrap();
        fs::write(root.join("prices.csv"), PRICES).unwrap();

        let workspace = root.join("workspace");
        let store = DirectoryStore::open(&workspace).unwrap();
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

        let toml = format!(
            r#"
workspace_dir = "{workspace}"
results_suffix = "demo"
n_workers = 2
baseline_year = 2000
baseline_landcover = "{baseline}"
analysis_year = 2007
biophysical_table = "{root}/biophysical.csv"
transition_table = "{root}/transitions.csv"

[[transitions]]
year = 2005
landcover = "{transition}"

{valuation}
"#,
            workspace = workspace.display(),
            root = root.display(),
            baseline = baseline_key(),
            transition = transition_key(),
            valuation = valuation.replace("{root}", &root.display().to_string()),
        );
        let path = root.join("run.toml");
        fs::write(&path, toml).unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        (dir, config)
    }

    #[test]
    fn test_run_writes_outputs_to_disk() {
        let (_dir, config) = workspace("");
        let outputs = config.run().unwrap();
        let store = DirectoryStore::open(&config.workspace_dir).unwrap();

        assert!(outputs
            .outputs
            .iter()
            .all(|k| k.as_str().ends_with("_demo.bcr")));
        for key in &outputs.outputs {
            assert!(store.path_of(key).is_file(), "{} is missing", key);
        }
        assert!(config.workspace_dir.join(MANIFEST_NAME).is_file());

        let net = store
            .read(&RasterKey::new(
                "output/total-net-carbon-sequestration-between-2000-and-2005_demo.bcr",
            ))
            .unwrap();
        assert_eq!(net.get(0, 1), Some(37.5));
        assert_eq!(net.get(0, 2), None);

        let rerun = config.run().unwrap();
        assert!(rerun.report.executed.is_empty());
    }

    #[test]
    fn test_price_table_valuation() {
        let (_dir, config) = workspace(
            "[valuation]\ndiscount_rate = 0.0\nprice_table = \"{root}/prices.csv\"",
        );
        config.run().unwrap();
        let store = DirectoryStore::open(&config.workspace_dir).unwrap();

        let npv = store
            .read(&RasterKey::new("output/net-present-value-at-2005_demo.bcr"))
            .unwrap();
        assert_eq!(npv.get(0, 1), Some(37.5 * 50.0));
    }

    #[test]
    fn test_short_price_table_is_rejected() {
        let (_dir, mut config) = workspace(
            "[valuation]\ndiscount_rate = 3.0\nprice_table = \"{root}/prices.csv\"",
        );
        config.analysis_year = Some(2010);
        let err = config.run().unwrap_err();
        assert!(matches!(err, CarbonError::MissingPrice(_)));
        assert!(!config.workspace_dir.join("output").exists());
    }
}
