//! Per-pool pipelines.
//!
//! Each pool submits its own tasks for every regime of the horizon and records
//! the rasters it plans in a [`PoolArena`] indexed by `(pool, year)`. Soil and
//! biomass share [`DisturbingPoolPipeline`]; litter, which only accumulates,
//! has [`LitterPipeline`]. The orchestrator composes them over the same years.

use crate::horizon::Regime;
use crate::names::OutputNames;
use bluecarbon_components::components::{
    Emissions, LinearProjection, NetSequestration, Reclassify, SumRasters, TrackDisturbance,
    TransitionReclassify,
};
use bluecarbon_components::parameters::{BiophysicalTable, Quantity, TransitionParameterStore};
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::graph::{TaskGraph, TaskHandle};
use bluecarbon_core::operation::RasterOperation;
use bluecarbon_core::pool::CarbonPool;
use bluecarbon_core::store::RasterKey;
use bluecarbon_core::Year;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A raster planned for a run, and the task that produces it.
///
/// Landcover snapshots already exist in the store and have no task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub key: RasterKey,
    pub task: Option<TaskHandle>,
}

impl Product {
    pub fn source(key: RasterKey) -> Self {
        Self { key, task: None }
    }
}

/// The rasters describing a pool in a single year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Stock at the start of the year
    Stock,
    Accumulation,
    HalfLife,
    DisturbanceMagnitude,
    DisturbanceVolume,
    YearOfDisturbance,
    Emissions,
    NetSequestration,
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Layer::Stock => "stock",
            Layer::Accumulation => "accumulation",
            Layer::HalfLife => "half-life",
            Layer::DisturbanceMagnitude => "disturbance magnitude",
            Layer::DisturbanceVolume => "disturbance volume",
            Layer::YearOfDisturbance => "year of latest disturbance",
            Layer::Emissions => "emissions",
            Layer::NetSequestration => "net sequestration",
        };
        f.write_str(name)
    }
}

/// Rasters planned for each `(pool, year)`.
///
/// Values that hold for a whole regime (accumulation rate, half-life) and the
/// disturbance carried since the last transition are recorded against every
/// year they apply to, so a year's state is always a single lookup.
#[derive(Debug, Default)]
pub struct PoolArena {
    years: BTreeMap<(CarbonPool, Year), HashMap<Layer, Product>>,
}

impl PoolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pool: CarbonPool, year: Year, layer: Layer) -> Option<&Product> {
        self.years.get(&(pool, year)).and_then(|y| y.get(&layer))
    }

    /// Like [`PoolArena::get`], failing if nothing was planned.
    pub fn require(&self, pool: CarbonPool, year: Year, layer: Layer) -> CarbonResult<&Product> {
        self.get(pool, year, layer).ok_or_else(|| {
            CarbonError::Error(format!(
                "No {} raster is planned for the {} pool in {}",
                layer, pool, year
            ))
        })
    }

    pub fn set(&mut self, pool: CarbonPool, year: Year, layer: Layer, product: Product) {
        self.years
            .entry((pool, year))
            .or_default()
            .insert(layer, product);
    }
}

/// Shared state while submitting the tasks of a run.
pub struct PlanContext<'a> {
    pub graph: &'a mut TaskGraph,
    pub arena: &'a mut PoolArena,
    pub names: &'a OutputNames,
    pub snapshots: &'a BTreeMap<Year, RasterKey>,
    pub biophysical: &'a BiophysicalTable,
    pub parameters: &'a TransitionParameterStore,
}

impl PlanContext<'_> {
    /// The landcover snapshot taken in `year`.
    pub fn snapshot(&self, year: Year) -> CarbonResult<Product> {
        self.snapshots
            .get(&year)
            .cloned()
            .map(Product::source)
            .ok_or_else(|| CarbonError::Error(format!("No landcover snapshot for {}", year)))
    }

    /// Submit a task named after its first output, depending on the producers
    /// of its inputs.
    pub fn submit(
        &mut self,
        operation: impl RasterOperation + 'static,
        inputs: &[&Product],
        outputs: Vec<RasterKey>,
    ) -> CarbonResult<TaskHandle> {
        let mut dependencies: Vec<TaskHandle> = Vec::new();
        for task in inputs.iter().filter_map(|p| p.task) {
            if !dependencies.contains(&task) {
                dependencies.push(task);
            }
        }
        let name = outputs
            .first()
            .map(|key| key.to_string())
            .unwrap_or_default();
        self.graph.submit(
            name,
            Arc::new(operation),
            inputs.iter().map(|p| p.key.clone()).collect(),
            outputs,
            &dependencies,
        )
    }

    /// Submit a single-output task.
    pub fn produce(
        &mut self,
        operation: impl RasterOperation + 'static,
        inputs: &[&Product],
        output: RasterKey,
    ) -> CarbonResult<Product> {
        let task = self.submit(operation, inputs, vec![output.clone()])?;
        Ok(Product {
            key: output,
            task: Some(task),
        })
    }
}

/// Submits the tasks that advance one carbon pool through every regime.
pub trait PoolPipeline: Debug {
    fn pool(&self) -> CarbonPool;

    /// Plan the years before the first transition.
    ///
    /// Stocks and accumulation rates are reclassifications of the baseline
    /// landcover and later stocks are linear projections; nothing is disturbed
    /// so net sequestration is the accumulation rate.
    fn plan_baseline(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()> {
        let pool = self.pool();
        let landcover = ctx.snapshot(regime.start)?;
        let label = landcover.key.to_string();

        let initial = ctx.produce(
            Reclassify::new(
                label.clone(),
                ctx.biophysical
                    .reclassification(pool, Quantity::InitialStock),
            ),
            &[&landcover],
            ctx.names.stock(pool, regime.start),
        )?;
        let accumulation = ctx.produce(
            Reclassify::new(
                label,
                ctx.biophysical
                    .reclassification(pool, Quantity::YearlyAccumulation),
            ),
            &[&landcover],
            ctx.names.accumulation(pool, regime.start),
        )?;

        for year in regime.years() {
            ctx.arena
                .set(pool, year, Layer::Accumulation, accumulation.clone());
            ctx.arena
                .set(pool, year, Layer::NetSequestration, accumulation.clone());
        }
        for year in regime.start + 1..=regime.end {
            let stock = ctx.produce(
                LinearProjection::new(year - regime.start),
                &[&initial, &accumulation],
                ctx.names.stock(pool, year),
            )?;
            ctx.arena.set(pool, year, Layer::Stock, stock);
        }
        ctx.arena.set(pool, regime.start, Layer::Stock, initial);
        Ok(())
    }

    /// Plan a regime that starts with a landcover transition.
    ///
    /// The regime is empty when the transition falls in the final year; only
    /// the rasters of the transition year itself are planned then.
    fn plan_transition(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()>;

    /// Plan `stock[year + 1] = stock[year] + net_sequestration[year]` for the
    /// years of `regime`.
    fn plan_stocks(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()> {
        let pool = self.pool();
        for year in regime.years() {
            let stock = ctx.arena.require(pool, year, Layer::Stock)?.clone();
            let net = ctx
                .arena
                .require(pool, year, Layer::NetSequestration)?
                .clone();
            let next = ctx.produce(
                SumRasters::new(),
                &[&stock, &net],
                ctx.names.stock(pool, year + 1),
            )?;
            ctx.arena.set(pool, year + 1, Layer::Stock, next);
        }
        Ok(())
    }

    fn plan_regime(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()> {
        if regime.is_baseline() {
            self.plan_baseline(ctx, regime)
        } else {
            self.plan_transition(ctx, regime)
        }
    }
}

fn previous_snapshot(regime: &Regime) -> CarbonResult<Year> {
    regime.previous_snapshot.ok_or_else(|| {
        CarbonError::Error(format!(
            "Regime starting in {} has no preceding landcover",
            regime.start
        ))
    })
}

/// Soil or biomass: disturbed by transitions, then emitting as it decays.
#[derive(Debug, Clone)]
pub struct DisturbingPoolPipeline {
    pool: CarbonPool,
}

impl DisturbingPoolPipeline {
    pub fn new(pool: CarbonPool) -> CarbonResult<Self> {
        if !pool.is_disturbing() {
            return Err(CarbonError::Error(format!(
                "The {} pool is never disturbed",
                pool
            )));
        }
        Ok(Self { pool })
    }
}

impl PoolPipeline for DisturbingPoolPipeline {
    fn pool(&self) -> CarbonPool {
        self.pool
    }

    /// At the transition year the disturbed volume is taken from the stock of
    /// the previous year. Half-lives come from the landcover the carbon was
    /// stored in, i.e. the snapshot before the transition.
    fn plan_transition(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()> {
        let pool = self.pool;
        let year = regime.start;
        let from = ctx.snapshot(previous_snapshot(regime)?)?;
        let to = ctx.snapshot(year)?;
        let missing = || CarbonError::Error(format!("No transition parameters for {}", pool));
        let accumulation_matrix = ctx.parameters.accumulation(pool).ok_or_else(missing)?.clone();
        let disturbance_matrix = ctx.parameters.disturbance(pool).ok_or_else(missing)?.clone();

        let accumulation = ctx.produce(
            TransitionReclassify::new(accumulation_matrix),
            &[&from, &to],
            ctx.names.accumulation(pool, year),
        )?;
        let half_life = ctx.produce(
            Reclassify::new(
                from.key.to_string(),
                ctx.biophysical.reclassification(pool, Quantity::HalfLife),
            ),
            &[&from],
            ctx.names.half_life(pool, year),
        )?;
        let magnitude = ctx.produce(
            TransitionReclassify::new(disturbance_matrix),
            &[&from, &to],
            ctx.names.disturbance_magnitude(pool, year),
        )?;

        let prior_stock = ctx.arena.require(pool, year - 1, Layer::Stock)?.clone();
        let mut inputs = vec![&magnitude, &prior_stock];
        let previous_volume = ctx
            .arena
            .get(pool, year - 1, Layer::DisturbanceVolume)
            .cloned();
        let previous_year = ctx
            .arena
            .get(pool, year - 1, Layer::YearOfDisturbance)
            .cloned();
        if let (Some(volume), Some(disturbed_in)) = (&previous_volume, &previous_year) {
            inputs.push(volume);
            inputs.push(disturbed_in);
        }
        let volume_key = ctx.names.disturbance_volume(pool, year);
        let year_key = ctx.names.year_of_disturbance(pool, year);
        let task = ctx.submit(
            TrackDisturbance::new(year),
            &inputs,
            vec![volume_key.clone(), year_key.clone()],
        )?;
        let volume = Product {
            key: volume_key,
            task: Some(task),
        };
        let disturbed_in = Product {
            key: year_key,
            task: Some(task),
        };

        ctx.arena
            .set(pool, year, Layer::DisturbanceMagnitude, magnitude);
        ctx.arena.set(pool, year, Layer::DisturbanceVolume, volume.clone());
        ctx.arena
            .set(pool, year, Layer::YearOfDisturbance, disturbed_in.clone());
        for y in regime.years() {
            let emissions = ctx.produce(
                Emissions::new(y),
                &[&volume, &disturbed_in, &half_life],
                ctx.names.emissions(pool, y),
            )?;
            let net = ctx.produce(
                NetSequestration::default(),
                &[&accumulation, &emissions],
                ctx.names.net_sequestration(pool, y),
            )?;

            ctx.arena.set(pool, y, Layer::Accumulation, accumulation.clone());
            ctx.arena.set(pool, y, Layer::HalfLife, half_life.clone());
            ctx.arena.set(pool, y, Layer::DisturbanceVolume, volume.clone());
            ctx.arena
                .set(pool, y, Layer::YearOfDisturbance, disturbed_in.clone());
            ctx.arena.set(pool, y, Layer::Emissions, emissions);
            ctx.arena.set(pool, y, Layer::NetSequestration, net);
        }
        self.plan_stocks(ctx, regime)
    }
}

/// Litter: never disturbed, accumulating at the rate of the current landcover.
#[derive(Debug, Clone, Default)]
pub struct LitterPipeline {}

impl PoolPipeline for LitterPipeline {
    fn pool(&self) -> CarbonPool {
        CarbonPool::Litter
    }

    fn plan_transition(&self, ctx: &mut PlanContext, regime: &Regime) -> CarbonResult<()> {
        let pool = CarbonPool::Litter;
        let landcover = ctx.snapshot(regime.start)?;
        let accumulation = ctx.produce(
            Reclassify::new(
                landcover.key.to_string(),
                ctx.biophysical
                    .reclassification(pool, Quantity::YearlyAccumulation),
            ),
            &[&landcover],
            ctx.names.accumulation(pool, regime.start),
        )?;
        for year in regime.years() {
            ctx.arena
                .set(pool, year, Layer::Accumulation, accumulation.clone());
            ctx.arena
                .set(pool, year, Layer::NetSequestration, accumulation.clone());
        }
        self.plan_stocks(ctx, regime)
    }
}

/// The pipelines for every pool, in summation order.
pub fn pipelines() -> CarbonResult<Vec<Box<dyn PoolPipeline>>> {
    Ok(vec![
        Box::new(DisturbingPoolPipeline::new(CarbonPool::Soil)?),
        Box::new(DisturbingPoolPipeline::new(CarbonPool::Biomass)?),
        Box::new(LitterPipeline::default()),
    ])
}
