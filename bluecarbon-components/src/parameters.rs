//! Biophysical parameters and the Transition Parameter Store.
//!
//! The biophysical table describes each landcover class: its initial carbon
//! stocks, yearly accumulation rates, carbon half-lives and the fraction of
//! carbon disturbed by low, medium and high impact transitions.
//!
//! The transition table is a grid with "from" classes as rows and "to" classes
//! as columns. Each cell names the carbon effect of that transition:
//!
//! ```text
//!   lulc-class ,  mangrove        , aquaculture         , parking-lot
//!   mangrove   ,  accum           , high-impact-disturb , high-impact-disturb
//!   aquaculture,  accum           , NCC                 , medium-impact-disturb
//! ```
//!
//! Both are folded into four sparse `(from, to)` matrices: disturbance magnitude
//! and accumulation rate, for soil and for biomass.

use crate::matrix::{LandcoverCode, TransitionMatrix};
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::pool::CarbonPool;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

/// Per-pool parameters of a landcover class.
///
/// Litter is never disturbed, so its half-life and disturbance magnitudes are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolParameters {
    /// Carbon stock at the baseline year
    /// unit: Mg C / ha
    pub initial: f32,
    /// unit: Mg C / ha / yr
    pub yearly_accumulation: f32,
    /// Half-life of disturbed carbon
    /// unit: yr
    pub half_life: f32,
    /// Fraction of stock disturbed by a low impact transition
    pub low_impact_disturb: f32,
    pub medium_impact_disturb: f32,
    pub high_impact_disturb: f32,
}

impl PoolParameters {
    pub fn disturbance(&self, level: DisturbanceLevel) -> f32 {
        match level {
            DisturbanceLevel::Low => self.low_impact_disturb,
            DisturbanceLevel::Medium => self.medium_impact_disturb,
            DisturbanceLevel::High => self.high_impact_disturb,
        }
    }
}

/// One row of the biophysical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiophysicalRecord {
    pub code: LandcoverCode,
    pub class: String,
    pub soil: PoolParameters,
    pub biomass: PoolParameters,
    pub litter: PoolParameters,
}

impl BiophysicalRecord {
    pub fn pool(&self, pool: CarbonPool) -> &PoolParameters {
        match pool {
            CarbonPool::Soil => &self.soil,
            CarbonPool::Biomass => &self.biomass,
            CarbonPool::Litter => &self.litter,
        }
    }
}

/// Per-class quantities that can be mapped directly from a landcover raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    InitialStock,
    YearlyAccumulation,
    HalfLife,
}

fn class_key(class: &str) -> String {
    class.trim().to_lowercase()
}

/// Landcover classes keyed by integer code.
#[derive(Debug, Clone, PartialEq)]
pub struct BiophysicalTable {
    records: BTreeMap<LandcoverCode, BiophysicalRecord>,
    codes_by_class: HashMap<String, LandcoverCode>,
}

impl BiophysicalTable {
    /// Build a table, rejecting duplicate codes or class names.
    pub fn new(records: Vec<BiophysicalRecord>) -> CarbonResult<Self> {
        let mut by_code = BTreeMap::new();
        let mut codes_by_class = HashMap::new();
        for record in records {
            if codes_by_class
                .insert(class_key(&record.class), record.code)
                .is_some()
            {
                return Err(CarbonError::MalformedTable {
                    table: "biophysical".to_string(),
                    reason: format!(
                        "lulc-class values must be unique, '{}' appears more than once",
                        record.class
                    ),
                });
            }
            let code = record.code;
            if by_code.insert(code, record).is_some() {
                return Err(CarbonError::MalformedTable {
                    table: "biophysical".to_string(),
                    reason: format!("lucode {} appears more than once", code),
                });
            }
        }
        Ok(Self {
            records: by_code,
            codes_by_class,
        })
    }

    pub fn get(&self, code: LandcoverCode) -> Option<&BiophysicalRecord> {
        self.records.get(&code)
    }

    /// Code of a class. Matching ignores case and surrounding space.
    pub fn code_of(&self, class: &str) -> Option<LandcoverCode> {
        self.codes_by_class.get(&class_key(class)).copied()
    }

    pub fn contains_code(&self, code: LandcoverCode) -> bool {
        self.records.contains_key(&code)
    }

    pub fn records(&self) -> impl Iterator<Item = &BiophysicalRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A `code -> value` map for reclassifying a landcover raster.
    pub fn reclassification(
        &self,
        pool: CarbonPool,
        quantity: Quantity,
    ) -> BTreeMap<LandcoverCode, f32> {
        self.records
            .iter()
            .map(|(code, record)| {
                let parameters = record.pool(pool);
                let value = match quantity {
                    Quantity::InitialStock => parameters.initial,
                    Quantity::YearlyAccumulation => parameters.yearly_accumulation,
                    Quantity::HalfLife => parameters.half_life,
                };
                (*code, value)
            })
            .collect()
    }
}

/// Severity of a disturbing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisturbanceLevel {
    Low,
    Medium,
    High,
}

/// The carbon effect of a landcover transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEffect {
    /// No change in carbon
    NoCarbonChange,
    /// The destination class accumulates carbon at its yearly rate
    Accumulate,
    /// A fraction of the source class's stock is disturbed
    Disturb(DisturbanceLevel),
}

impl TransitionEffect {
    /// Parse a transition table cell. Matching ignores case and surrounding space.
    ///
    /// Returns `None` for labels that are not recognised.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "ncc" => Some(TransitionEffect::NoCarbonChange),
            "accum" => Some(TransitionEffect::Accumulate),
            "low-impact-disturb" => Some(TransitionEffect::Disturb(DisturbanceLevel::Low)),
            "medium-impact-disturb" => Some(TransitionEffect::Disturb(DisturbanceLevel::Medium)),
            "high-impact-disturb" => Some(TransitionEffect::Disturb(DisturbanceLevel::High)),
            _ => None,
        }
    }
}

impl Display for TransitionEffect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransitionEffect::NoCarbonChange => "NCC",
            TransitionEffect::Accumulate => "accum",
            TransitionEffect::Disturb(DisturbanceLevel::Low) => "low-impact-disturb",
            TransitionEffect::Disturb(DisturbanceLevel::Medium) => "medium-impact-disturb",
            TransitionEffect::Disturb(DisturbanceLevel::High) => "high-impact-disturb",
        };
        f.write_str(label)
    }
}

/// One row of a transition table, as read from disk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionRow {
    /// The class being transitioned from; `None` for blank cells.
    pub from_class: Option<String>,
    /// Cell labels, aligned with [`TransitionTable::to_classes`]; `None` for blank cells.
    pub cells: Vec<Option<String>>,
}

impl TransitionRow {
    fn is_blank(&self) -> bool {
        self.from_class.is_none() && self.cells.iter().all(|c| c.is_none())
    }
}

/// The raw transition grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionTable {
    /// Column headers after `lulc-class`; `None` for blank headers.
    pub to_classes: Vec<Option<String>>,
    pub rows: Vec<TransitionRow>,
}

/// A transition table cell that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedLabel {
    pub from_class: String,
    pub to_class: String,
    pub label: String,
}

/// Disturbance magnitudes and accumulation rates for every modelled transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionParameterStore {
    soil_disturbance: TransitionMatrix,
    biomass_disturbance: TransitionMatrix,
    soil_accumulation: TransitionMatrix,
    biomass_accumulation: TransitionMatrix,
    unrecognized: Vec<UnrecognizedLabel>,
}

impl TransitionParameterStore {
    /// Fold a biophysical table and a transition table into sparse matrices.
    ///
    /// Disturbances use the *source* class's magnitudes; accumulation uses the
    /// *destination* class's rates. `NCC` and blank cells populate nothing.
    /// Parsing stops at the first completely blank row, and rows with a blank
    /// class cell are skipped (they hold the legend in the table template).
    ///
    /// A class missing from the biophysical table is an error. Unrecognised
    /// labels are logged, recorded and otherwise ignored.
    pub fn build(biophysical: &BiophysicalTable, table: &TransitionTable) -> CarbonResult<Self> {
        let mut to_codes = Vec::with_capacity(table.to_classes.len());
        for class in &table.to_classes {
            let code = match class {
                Some(class) => Some(biophysical.code_of(class).ok_or_else(|| {
                    CarbonError::UnknownLandcoverClass {
                        class: class.clone(),
                        location: "transition table header row".to_string(),
                    }
                })?),
                None => None,
            };
            to_codes.push(code);
        }

        let mut store = Self::default();
        for (index, row) in table.rows.iter().enumerate() {
            if row.is_blank() {
                info!(
                    "Halting transition table parsing on row {}; blank line encountered.",
                    index
                );
                break;
            }
            let from_class = match &row.from_class {
                Some(class) => class,
                None => continue,
            };
            let from_code =
                biophysical
                    .code_of(from_class)
                    .ok_or_else(|| CarbonError::UnknownLandcoverClass {
                        class: from_class.clone(),
                        location: "transition table 'lulc-class' column".to_string(),
                    })?;

            for (cell, to) in row.cells.iter().zip(table.to_classes.iter().zip(&to_codes)) {
                let (label, to_class, to_code) = match (cell, to) {
                    (Some(label), (Some(to_class), Some(to_code))) => (label, to_class, *to_code),
                    _ => continue,
                };
                match TransitionEffect::from_label(label) {
                    Some(effect) => store.record(biophysical, from_code, to_code, effect),
                    None => {
                        warn!(
                            "Ignoring unrecognised transition '{}' from '{}' to '{}'",
                            label, from_class, to_class
                        );
                        store.unrecognized.push(UnrecognizedLabel {
                            from_class: from_class.clone(),
                            to_class: to_class.clone(),
                            label: label.clone(),
                        });
                    }
                }
            }
        }

        info!(
            "Transition parameters: {} soil and {} biomass disturbances, {} soil and {} biomass accumulations",
            store.soil_disturbance.len(),
            store.biomass_disturbance.len(),
            store.soil_accumulation.len(),
            store.biomass_accumulation.len()
        );
        Ok(store)
    }

    fn record(
        &mut self,
        biophysical: &BiophysicalTable,
        from: LandcoverCode,
        to: LandcoverCode,
        effect: TransitionEffect,
    ) {
        // Both codes came from the table, so the lookups cannot miss
        let (Some(source), Some(destination)) = (biophysical.get(from), biophysical.get(to)) else {
            return;
        };
        match effect {
            TransitionEffect::NoCarbonChange => {}
            TransitionEffect::Accumulate => {
                self.soil_accumulation
                    .insert(from, to, destination.soil.yearly_accumulation);
                self.biomass_accumulation
                    .insert(from, to, destination.biomass.yearly_accumulation);
            }
            TransitionEffect::Disturb(level) => {
                self.soil_disturbance
                    .insert(from, to, source.soil.disturbance(level));
                self.biomass_disturbance
                    .insert(from, to, source.biomass.disturbance(level));
            }
        }
    }

    /// Disturbance magnitudes for a pool. `None` for litter, which never disturbs.
    pub fn disturbance(&self, pool: CarbonPool) -> Option<&TransitionMatrix> {
        match pool {
            CarbonPool::Soil => Some(&self.soil_disturbance),
            CarbonPool::Biomass => Some(&self.biomass_disturbance),
            CarbonPool::Litter => None,
        }
    }

    /// Accumulation rates for a pool. `None` for litter, whose accumulation
    /// depends only on the current landcover.
    pub fn accumulation(&self, pool: CarbonPool) -> Option<&TransitionMatrix> {
        match pool {
            CarbonPool::Soil => Some(&self.soil_accumulation),
            CarbonPool::Biomass => Some(&self.biomass_accumulation),
            CarbonPool::Litter => None,
        }
    }

    /// Cells whose labels were not recognised while building the store.
    pub fn unrecognized(&self) -> &[UnrecognizedLabel] {
        &self.unrecognized
    }
}
