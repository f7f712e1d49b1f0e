//! Carbon pools tracked by the model.

use crate::errors::{CarbonError, CarbonResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A carbon reservoir tracked independently for every pixel.
///
/// Soil and biomass carbon can be disturbed by a landcover transition and then
/// decays back to the atmosphere. Litter only ever accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarbonPool {
    Soil,
    Biomass,
    Litter,
}

impl CarbonPool {
    /// Every pool, in the order outputs are summed.
    pub const ALL: [CarbonPool; 3] = [CarbonPool::Soil, CarbonPool::Biomass, CarbonPool::Litter];

    /// Pools whose carbon can be disturbed and emitted.
    pub const DISTURBING: [CarbonPool; 2] = [CarbonPool::Soil, CarbonPool::Biomass];

    pub fn as_str(&self) -> &'static str {
        match self {
            CarbonPool::Soil => "soil",
            CarbonPool::Biomass => "biomass",
            CarbonPool::Litter => "litter",
        }
    }

    /// True if landcover transitions can disturb this pool.
    pub fn is_disturbing(&self) -> bool {
        !matches!(self, CarbonPool::Litter)
    }
}

impl Display for CarbonPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CarbonPool {
    type Err = CarbonError;

    fn from_str(s: &str) -> CarbonResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soil" => Ok(CarbonPool::Soil),
            "biomass" => Ok(CarbonPool::Biomass),
            "litter" => Ok(CarbonPool::Litter),
            _ => Err(CarbonError::UnknownPool(s.to_string())),
        }
    }
}
