//! Run configuration read from TOML.
//!
//! ```toml
//! workspace_dir = "workspace"
//! results_suffix = "scenario-a"
//! n_workers = 4
//! baseline_year = 2000
//! baseline_landcover = "landcover/lulc-2000.bcr"
//! analysis_year = 2050
//! biophysical_table = "tables/biophysical.csv"
//! transition_table = "tables/transitions.csv"
//!
//! [[transitions]]
//! year = 2010
//! landcover = "landcover/lulc-2010.bcr"
//!
//! [valuation]
//! discount_rate = 3.0
//! price = 10.0
//! inflation_rate = 2.0
//! ```
//!
//! Landcover rasters are keys within the workspace store. Rates are percentages.

use crate::horizon::Horizon;
use crate::orchestrator::{RunOutputs, Scenario, ScenarioBuilder};
use crate::valuation::Valuation;
use bluecarbon_components::tables::{
    load_biophysical_table, load_price_table, load_transition_table,
};
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::store::DirectoryStore;
use bluecarbon_core::Year;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub year: Year,
    pub landcover: String,
}

/// Carbon prices, either tabulated or grown from a base price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// unit: percent per year
    pub discount_rate: f64,
    /// CSV with `year` and `price` columns
    #[serde(default)]
    pub price_table: Option<PathBuf>,
    /// Price at the baseline year
    #[serde(default)]
    pub price: Option<f64>,
    /// unit: percent per year
    #[serde(default)]
    pub inflation_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub workspace_dir: PathBuf,
    #[serde(default)]
    pub results_suffix: String,
    /// Worker threads; 0 runs every task on the calling thread
    #[serde(default)]
    pub n_workers: usize,
    pub baseline_year: Year,
    pub baseline_landcover: String,
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
    #[serde(default)]
    pub analysis_year: Option<Year>,
    pub biophysical_table: PathBuf,
    /// Only needed when there are transitions
    #[serde(default)]
    pub transition_table: Option<PathBuf>,
    #[serde(default)]
    pub valuation: Option<ValuationConfig>,
}

impl RunConfig {
    pub fn from_toml(contents: &str) -> CarbonResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CarbonResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Check the years and the valuation settings without reading any table
    /// or raster.
    pub fn validate(&self) -> CarbonResult<Horizon> {
        let years: Vec<Year> = self.transitions.iter().map(|t| t.year).collect();
        let horizon = Horizon::new(self.baseline_year, &years, self.analysis_year)?;

        if !self.transitions.is_empty() && self.transition_table.is_none() {
            return Err(CarbonError::InvalidConfiguration(
                "a transition table is required when transitions are given".to_string(),
            ));
        }
        if let Some(valuation) = &self.valuation {
            match (&valuation.price_table, valuation.price) {
                (Some(_), Some(_)) => {
                    return Err(CarbonError::InvalidConfiguration(
                        "give either a price table or a price, not both".to_string(),
                    ))
                }
                (None, None) => {
                    return Err(CarbonError::InvalidConfiguration(
                        "valuation needs a price table or a price".to_string(),
                    ))
                }
                (Some(_), None) if valuation.inflation_rate.is_some() => {
                    return Err(CarbonError::InvalidConfiguration(
                        "an inflation rate only applies to a single price".to_string(),
                    ))
                }
                _ => {}
            }
        }
        Ok(horizon)
    }

    fn valuation(&self, horizon: &Horizon) -> CarbonResult<Option<Valuation>> {
        let config = match &self.valuation {
            Some(config) => config,
            None => return Ok(None),
        };
        let discount_rate = config.discount_rate / 100.0;
        let valuation = match (&config.price_table, config.price) {
            (Some(path), _) => {
                Valuation::new(discount_rate, load_price_table(path)?)
            }
            (None, Some(price)) => Valuation::with_inflation(
                discount_rate,
                price,
                config.inflation_rate.unwrap_or(0.0) / 100.0,
                horizon.baseline(),
                horizon.end(),
            ),
            (None, None) => {
                return Err(CarbonError::InvalidConfiguration(
                    "valuation needs a price table or a price".to_string(),
                ))
            }
        };
        Ok(Some(valuation))
    }

    /// Validate the configuration and load its parameter tables.
    pub fn scenario(&self) -> CarbonResult<Scenario> {
        let horizon = self.validate()?;

        let mut builder = ScenarioBuilder::new();
        builder
            .with_baseline(self.baseline_year, self.baseline_landcover.as_str())
            .with_biophysical_table(load_biophysical_table(&self.biophysical_table)?)
            .with_results_suffix(&self.results_suffix);
        for transition in &self.transitions {
            builder.with_transition(transition.year, transition.landcover.as_str());
        }
        if let Some(year) = self.analysis_year {
            builder.with_analysis_year(year);
        }
        if let Some(path) = &self.transition_table {
            builder.with_transition_table(load_transition_table(path)?);
        }
        if let Some(valuation) = self.valuation(&horizon)? {
            builder.with_valuation(valuation);
        }
        builder.build()
    }

    /// Run the configured scenario against the workspace directory.
    pub fn run(&self) -> CarbonResult<RunOutputs> {
        let scenario = self.scenario()?;
        let store = DirectoryStore::open(&self.workspace_dir)?;
        info!("Running in workspace {}", store.root().display());
        scenario.run(Arc::new(store), self.n_workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
workspace_dir = "workspace"
results_suffix = "a"
baseline_year = 2000
baseline_landcover = "lulc-2000.bcr"
analysis_year = 2030
biophysical_table = "biophysical.csv"
transition_table = "transitions.csv"

[[transitions]]
year = 2010
landcover = "lulc-2010.bcr"

[[transitions]]
year = 2020
landcover = "lulc-2020.bcr"

[valuation]
discount_rate = 3.0
price = 10.0
inflation_rate = 2.0
"#;

    #[test]
    fn parse_config() {
        let config = RunConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.n_workers, 0);
        assert_eq!(config.transitions.len(), 2);
        assert_eq!(config.transitions[1].landcover, "lulc-2020.bcr");
        assert_eq!(config.valuation.as_ref().unwrap().price, Some(10.0));

        let horizon = config.validate().unwrap();
        assert_eq!(horizon.end(), 2030);
        assert_eq!(horizon.regimes().len(), 3);
    }

    #[test]
    fn inflation_is_a_percentage() {
        let config = RunConfig::from_toml(CONFIG).unwrap();
        let horizon = config.validate().unwrap();
        let valuation = config.valuation(&horizon).unwrap().unwrap();
        assert!((valuation.discount_rate - 0.03).abs() < 1e-12);
        assert!((valuation.price(2001).unwrap() - 10.2).abs() < 1e-9);
        assert!(valuation.check_coverage(2000, 2030).is_ok());
    }

    #[test]
    fn analysis_year_before_last_transition() {
        let mut config = RunConfig::from_toml(CONFIG).unwrap();
        config.analysis_year = Some(2015);
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration_error());
        // Rejected before any table is read
        assert!(matches!(
            config.scenario(),
            Err(CarbonError::AnalysisYearBeforeLastTransition { .. })
        ));
    }

    #[test]
    fn valuation_needs_exactly_one_price_source() {
        let mut config = RunConfig::from_toml(CONFIG).unwrap();
        if let Some(valuation) = config.valuation.as_mut() {
            valuation.price_table = Some(PathBuf::from("prices.csv"));
        }
        assert!(matches!(
            config.validate(),
            Err(CarbonError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn transitions_need_a_table() {
        let mut config = RunConfig::from_toml(CONFIG).unwrap();
        config.transition_table = None;
        assert!(config.validate().unwrap_err().is_configuration_error());
    }

    #[test]
    fn malformed_toml() {
        let err = RunConfig::from_toml("baseline_year = \"two thousand\"").unwrap_err();
        assert!(matches!(err, CarbonError::Toml(_)));
        assert!(err.is_configuration_error());
    }
}
