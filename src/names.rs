//! Raster keys for every product of a run.
//!
//! Per-pool, per-year rasters live under `intermediate/`; reported rasters
//! under `output/`. The results suffix is appended to every file name.

use bluecarbon_core::pool::CarbonPool;
use bluecarbon_core::store::RasterKey;
use bluecarbon_core::Year;

const EXTENSION: &str = "bcr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    suffix: String,
}

impl OutputNames {
    /// A non-empty suffix is separated from the file name by an underscore.
    pub fn new(results_suffix: &str) -> Self {
        let suffix = results_suffix.trim();
        let suffix = if suffix.is_empty() || suffix.starts_with('_') {
            suffix.to_string()
        } else {
            format!("_{}", suffix)
        };
        Self { suffix }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn intermediate(&self, stem: String) -> RasterKey {
        RasterKey::new(format!("intermediate/{}{}.{}", stem, self.suffix, EXTENSION))
    }

    fn output(&self, stem: String) -> RasterKey {
        RasterKey::new(format!("output/{}{}.{}", stem, self.suffix, EXTENSION))
    }

    pub fn stock(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("stocks-{}-{}", pool, year))
    }

    pub fn accumulation(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("accumulation-{}-{}", pool, year))
    }

    pub fn half_life(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("halflife-{}-{}", pool, year))
    }

    pub fn disturbance_magnitude(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("disturbance-magnitude-{}-{}", pool, year))
    }

    pub fn disturbance_volume(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("disturbance-volume-{}-{}", pool, year))
    }

    pub fn year_of_disturbance(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("year-of-latest-disturbance-{}-{}", pool, year))
    }

    pub fn emissions(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("emissions-{}-{}", pool, year))
    }

    pub fn net_sequestration(&self, pool: CarbonPool, year: Year) -> RasterKey {
        self.intermediate(format!("net-sequestration-{}-{}", pool, year))
    }

    pub fn total_stock(&self, year: Year) -> RasterKey {
        self.intermediate(format!("total-carbon-stocks-{}", year))
    }

    pub fn carbon_stock_at(&self, year: Year) -> RasterKey {
        self.output(format!("carbon-stock-at-{}", year))
    }

    pub fn total_emissions_between(&self, start: Year, end: Year) -> RasterKey {
        self.output(format!("total-emissions-between-{}-and-{}", start, end))
    }

    pub fn total_accumulation_between(&self, start: Year, end: Year) -> RasterKey {
        self.output(format!("total-accumulation-between-{}-and-{}", start, end))
    }

    pub fn total_net_sequestration_between(&self, start: Year, end: Year) -> RasterKey {
        self.output(format!(
            "total-net-carbon-sequestration-between-{}-and-{}",
            start, end
        ))
    }

    pub fn total_net_sequestration(&self) -> RasterKey {
        self.output("total-net-carbon-sequestration".to_string())
    }

    pub fn net_present_value_at(&self, year: Year) -> RasterKey {
        self.output(format!("net-present-value-at-{}", year))
    }
}
