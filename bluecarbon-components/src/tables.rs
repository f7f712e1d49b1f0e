//! Reading parameter tables from CSV.
//!
//! Column names are matched case-insensitively and every cell is trimmed.

use crate::parameters::{
    BiophysicalRecord, BiophysicalTable, PoolParameters, TransitionRow, TransitionTable,
};
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::Year;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One biophysical table row as it appears on disk.
///
/// Litter is never disturbed, so it has no half-life or disturbance columns.
#[derive(Debug, Deserialize)]
struct BiophysicalRow {
    lucode: i64,
    #[serde(rename = "lulc-class")]
    class: String,
    #[serde(rename = "soil-initial")]
    soil_initial: f32,
    #[serde(rename = "soil-yearly-accumulation")]
    soil_yearly_accumulation: f32,
    #[serde(rename = "soil-half-life")]
    soil_half_life: f32,
    #[serde(rename = "soil-low-impact-disturb")]
    soil_low_impact_disturb: f32,
    #[serde(rename = "soil-medium-impact-disturb")]
    soil_medium_impact_disturb: f32,
    #[serde(rename = "soil-high-impact-disturb")]
    soil_high_impact_disturb: f32,
    #[serde(rename = "biomass-initial")]
    biomass_initial: f32,
    #[serde(rename = "biomass-yearly-accumulation")]
    biomass_yearly_accumulation: f32,
    #[serde(rename = "biomass-half-life")]
    biomass_half_life: f32,
    #[serde(rename = "biomass-low-impact-disturb")]
    biomass_low_impact_disturb: f32,
    #[serde(rename = "biomass-medium-impact-disturb")]
    biomass_medium_impact_disturb: f32,
    #[serde(rename = "biomass-high-impact-disturb")]
    biomass_high_impact_disturb: f32,
    #[serde(rename = "litter-initial")]
    litter_initial: f32,
    #[serde(rename = "litter-yearly-accumulation")]
    litter_yearly_accumulation: f32,
}

impl From<BiophysicalRow> for BiophysicalRecord {
    fn from(row: BiophysicalRow) -> Self {
        BiophysicalRecord {
            code: row.lucode,
            class: row.class,
            soil: PoolParameters {
                initial: row.soil_initial,
                yearly_accumulation: row.soil_yearly_accumulation,
                half_life: row.soil_half_life,
                low_impact_disturb: row.soil_low_impact_disturb,
                medium_impact_disturb: row.soil_medium_impact_disturb,
                high_impact_disturb: row.soil_high_impact_disturb,
            },
            biomass: PoolParameters {
                initial: row.biomass_initial,
                yearly_accumulation: row.biomass_yearly_accumulation,
                half_life: row.biomass_half_life,
                low_impact_disturb: row.biomass_low_impact_disturb,
                medium_impact_disturb: row.biomass_medium_impact_disturb,
                high_impact_disturb: row.biomass_high_impact_disturb,
            },
            litter: PoolParameters {
                initial: row.litter_initial,
                yearly_accumulation: row.litter_yearly_accumulation,
                ..PoolParameters::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    year: Year,
    price: f64,
}

fn lowercase_headers(headers: &StringRecord) -> StringRecord {
    headers.iter().map(|h| h.to_ascii_lowercase()).collect()
}

fn open(path: &Path) -> CarbonResult<File> {
    File::open(path).map_err(|e| CarbonError::MalformedTable {
        table: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read a biophysical table.
pub fn read_biophysical_table<R: Read>(reader: R) -> CarbonResult<BiophysicalTable> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = lowercase_headers(reader.headers()?);
    reader.set_headers(headers);

    let records = reader
        .deserialize::<BiophysicalRow>()
        .map(|row| row.map(BiophysicalRecord::from))
        .collect::<Result<Vec<_>, _>>()?;
    BiophysicalTable::new(records)
}

pub fn load_biophysical_table(path: impl AsRef<Path>) -> CarbonResult<BiophysicalTable> {
    read_biophysical_table(open(path.as_ref())?)
}

fn cell(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Read a transition table.
///
/// The first row holds the "to" classes after a leading `lulc-class` cell;
/// every following row starts with its "from" class. Short rows are padded
/// with blank cells.
pub fn read_transition_table<R: Read>(reader: R) -> CarbonResult<TransitionTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut records = reader.records();

    let header = records.next().ok_or_else(|| CarbonError::MalformedTable {
        table: "transition".to_string(),
        reason: "table is empty".to_string(),
    })??;
    match header.get(0) {
        Some(first) if first.eq_ignore_ascii_case("lulc-class") => {}
        other => {
            return Err(CarbonError::MalformedTable {
                table: "transition".to_string(),
                reason: format!(
                    "first column must be 'lulc-class', found '{}'",
                    other.unwrap_or_default()
                ),
            })
        }
    }
    let to_classes: Vec<_> = header.iter().skip(1).map(cell).collect();

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let mut cells: Vec<_> = record.iter().skip(1).map(cell).collect();
        cells.resize(to_classes.len(), None);
        rows.push(TransitionRow {
            from_class: record.get(0).and_then(cell),
            cells,
        });
    }
    Ok(TransitionTable { to_classes, rows })
}

pub fn load_transition_table(path: impl AsRef<Path>) -> CarbonResult<TransitionTable> {
    read_transition_table(open(path.as_ref())?)
}

/// Read a `year,price` table of carbon prices.
pub fn read_price_table<R: Read>(reader: R) -> CarbonResult<BTreeMap<Year, f64>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = lowercase_headers(reader.headers()?);
    reader.set_headers(headers);

    let mut prices = BTreeMap::new();
    for row in reader.deserialize::<PriceRow>() {
        let row = row?;
        if prices.insert(row.year, row.price).is_some() {
            return Err(CarbonError::MalformedTable {
                table: "price".to_string(),
                reason: format!("year {} appears more than once", row.year),
            });
        }
    }
    Ok(prices)
}

pub fn load_price_table(path: impl AsRef<Path>) -> CarbonResult<BTreeMap<Year, f64>> {
    read_price_table(open(path.as_ref())?)
}
