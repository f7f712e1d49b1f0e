//! The temporal orchestrator.
//!
//! A [`Scenario`] holds everything a run needs: the validated horizon, the
//! landcover snapshots and the carbon parameters. Planning a scenario submits
//! the whole task graph up front: each pool's pipeline for every regime and for
//! a transition in the final year, then the total stocks, the per-regime
//! summaries, the all-time net sequestration and, when prices are given, the
//! net present value at the end of each regime.

use crate::horizon::{Horizon, Regime};
use crate::names::OutputNames;
use crate::pipeline::{pipelines, Layer, PlanContext, PoolArena, Product};
use crate::valuation::Valuation;
use bluecarbon_components::components::SumRasters;
use bluecarbon_components::parameters::{
    BiophysicalTable, TransitionParameterStore, TransitionTable, UnrecognizedLabel,
};
use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::graph::{RunReport, TaskGraph};
use bluecarbon_core::pool::CarbonPool;
use bluecarbon_core::store::{RasterKey, RasterStore};
use bluecarbon_core::Year;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build a [`Scenario`] from its parts.
///
/// Every configuration check happens in [`ScenarioBuilder::build`], before any
/// raster is read or computed.
#[derive(Debug, Default)]
pub struct ScenarioBuilder {
    baseline: Option<(Year, RasterKey)>,
    transitions: Vec<(Year, RasterKey)>,
    analysis_year: Option<Year>,
    biophysical: Option<BiophysicalTable>,
    transition_table: TransitionTable,
    valuation: Option<Valuation>,
    results_suffix: String,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(&mut self, year: Year, landcover: impl Into<RasterKey>) -> &mut Self {
        self.baseline = Some((year, landcover.into()));
        self
    }

    pub fn with_transition(&mut self, year: Year, landcover: impl Into<RasterKey>) -> &mut Self {
        self.transitions.push((year, landcover.into()));
        self
    }

    /// Extend the run past the last transition.
    pub fn with_analysis_year(&mut self, year: Year) -> &mut Self {
        self.analysis_year = Some(year);
        self
    }

    pub fn with_biophysical_table(&mut self, table: BiophysicalTable) -> &mut Self {
        self.biophysical = Some(table);
        self
    }

    pub fn with_transition_table(&mut self, table: TransitionTable) -> &mut Self {
        self.transition_table = table;
        self
    }

    pub fn with_valuation(&mut self, valuation: Valuation) -> &mut Self {
        self.valuation = Some(valuation);
        self
    }

    pub fn with_results_suffix(&mut self, suffix: &str) -> &mut Self {
        self.results_suffix = suffix.to_string();
        self
    }

    pub fn build(&self) -> CarbonResult<Scenario> {
        let (baseline, baseline_landcover) = self.baseline.clone().ok_or_else(|| {
            CarbonError::InvalidConfiguration("a baseline landcover is required".to_string())
        })?;
        let biophysical = self.biophysical.clone().ok_or_else(|| {
            CarbonError::InvalidConfiguration("a biophysical table is required".to_string())
        })?;

        let years: Vec<Year> = self.transitions.iter().map(|(year, _)| *year).collect();
        let horizon = Horizon::new(baseline, &years, self.analysis_year)?;
        let parameters = TransitionParameterStore::build(&biophysical, &self.transition_table)?;
        if let Some(valuation) = &self.valuation {
            valuation.check_coverage(horizon.baseline(), horizon.end())?;
        }

        let mut snapshots = BTreeMap::from([(baseline, baseline_landcover)]);
        snapshots.extend(self.transitions.iter().cloned());

        info!(
            "Scenario from {} to {} with {} transition(s)",
            horizon.baseline(),
            horizon.end(),
            horizon.transitions().len()
        );
        Ok(Scenario {
            horizon,
            snapshots,
            biophysical,
            parameters,
            valuation: self.valuation.clone(),
            names: OutputNames::new(&self.results_suffix),
        })
    }
}

/// A validated run configuration.
#[derive(Debug, Clone)]
pub struct Scenario {
    horizon: Horizon,
    snapshots: BTreeMap<Year, RasterKey>,
    biophysical: BiophysicalTable,
    parameters: TransitionParameterStore,
    valuation: Option<Valuation>,
    names: OutputNames,
}

/// A fully submitted task graph and the rasters it will produce.
#[derive(Debug)]
pub struct Plan {
    pub graph: TaskGraph,
    pub arena: PoolArena,
    /// Rasters written to the output directory
    pub outputs: Vec<RasterKey>,
}

impl Plan {
    /// Run the plan, returning a report even if some tasks fail.
    pub fn execute(&self) -> CarbonResult<RunReport> {
        self.graph.join_report()
    }
}

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub report: RunReport,
    pub outputs: Vec<RasterKey>,
}

impl Scenario {
    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn names(&self) -> &OutputNames {
        &self.names
    }

    pub fn parameters(&self) -> &TransitionParameterStore {
        &self.parameters
    }

    /// Transition table cells that were ignored.
    pub fn warnings(&self) -> &[UnrecognizedLabel] {
        self.parameters.unrecognized()
    }

    /// Check that the snapshots are aligned and only use known landcover codes.
    fn check_snapshots(&self, store: &dyn RasterStore) -> CarbonResult<()> {
        let mut shape = None;
        for key in self.snapshots.values() {
            let raster = store.read(key)?;
            if let Some(code) = raster
                .unique_codes()
                .into_iter()
                .find(|code| !self.biophysical.contains_code(*code))
            {
                return Err(CarbonError::UnknownLandcoverCode {
                    code,
                    raster: key.to_string(),
                });
            }
            match shape {
                None => shape = Some(raster.shape()),
                Some(expected) if expected != raster.shape() => {
                    return Err(CarbonError::ShapeMismatch {
                        expected,
                        found: raster.shape(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Submit every task of the run without executing anything.
    pub fn plan(&self, store: Arc<dyn RasterStore>, n_workers: usize) -> CarbonResult<Plan> {
        self.check_snapshots(store.as_ref())?;

        let mut graph = TaskGraph::new(store, n_workers);
        let mut arena = PoolArena::new();
        let mut ctx = PlanContext {
            graph: &mut graph,
            arena: &mut arena,
            names: &self.names,
            snapshots: &self.snapshots,
            biophysical: &self.biophysical,
            parameters: &self.parameters,
        };

        let regimes = self.horizon.regimes();
        let closing = self.horizon.closing_transition();
        for pipeline in pipelines()? {
            for regime in regimes.iter().chain(closing.iter()) {
                pipeline.plan_regime(&mut ctx, regime)?;
            }
        }

        let mut outputs = self.plan_total_stocks(&mut ctx)?;
        let mut net_summaries = Vec::with_capacity(regimes.len());
        for regime in &regimes {
            let (summaries, net) = self.plan_summaries(&mut ctx, regime)?;
            outputs.extend(summaries);
            net_summaries.push((regime.end, net));
        }

        let all: Vec<&Product> = net_summaries.iter().map(|(_, p)| p).collect();
        let total = ctx.produce(SumRasters::new(), &all, self.names.total_net_sequestration())?;
        outputs.push(total.key);

        if let Some(valuation) = &self.valuation {
            for (index, (year, _)) in net_summaries.iter().enumerate() {
                let factor = valuation.npv_factor(self.horizon.baseline(), *year)?;
                let summaries: Vec<&Product> =
                    net_summaries[..=index].iter().map(|(_, p)| p).collect();
                let npv = ctx.produce(
                    SumRasters::scaled(factor),
                    &summaries,
                    self.names.net_present_value_at(*year),
                )?;
                outputs.push(npv.key);
            }
        }

        info!(
            "Planned {} tasks over {} regime(s)",
            graph.len(),
            regimes.len()
        );
        Ok(Plan {
            graph,
            arena,
            outputs,
        })
    }

    /// Total stock for every year, copied to the outputs at reporting years.
    fn plan_total_stocks(&self, ctx: &mut PlanContext) -> CarbonResult<Vec<RasterKey>> {
        let mut totals = BTreeMap::new();
        for year in self.horizon.stock_years() {
            let stocks = CarbonPool::ALL
                .iter()
                .map(|pool| ctx.arena.require(*pool, year, Layer::Stock).cloned())
                .collect::<CarbonResult<Vec<_>>>()?;
            let inputs: Vec<&Product> = stocks.iter().collect();
            let total = ctx.produce(SumRasters::new(), &inputs, self.names.total_stock(year))?;
            totals.insert(year, total);
        }

        let mut outputs = Vec::new();
        for year in self.horizon.reporting_years() {
            let total = totals.get(&year).ok_or_else(|| {
                CarbonError::Error(format!("No total stock planned for {}", year))
            })?;
            let copy = ctx.produce(SumRasters::new(), &[total], self.names.carbon_stock_at(year))?;
            outputs.push(copy.key);
        }
        Ok(outputs)
    }

    /// Sum a layer over pools and the years of a regime.
    fn plan_summary(
        &self,
        ctx: &mut PlanContext,
        regime: &Regime,
        pools: &[CarbonPool],
        layer: Layer,
        output: RasterKey,
    ) -> CarbonResult<Product> {
        let mut products = Vec::new();
        for pool in pools {
            for year in regime.years() {
                products.push(ctx.arena.require(*pool, year, layer)?.clone());
            }
        }
        let inputs: Vec<&Product> = products.iter().collect();
        ctx.produce(SumRasters::new(), &inputs, output)
    }

    /// Emissions (after the baseline), accumulation and net sequestration
    /// summed over a regime. Returns the output keys and the net
    /// sequestration summary.
    fn plan_summaries(
        &self,
        ctx: &mut PlanContext,
        regime: &Regime,
    ) -> CarbonResult<(Vec<RasterKey>, Product)> {
        let (start, end) = (regime.start, regime.end);
        let mut outputs = Vec::new();
        if !regime.is_baseline() {
            let emissions = self.plan_summary(
                ctx,
                regime,
                &CarbonPool::DISTURBING,
                Layer::Emissions,
                self.names.total_emissions_between(start, end),
            )?;
            outputs.push(emissions.key);
        }
        let accumulation = self.plan_summary(
            ctx,
            regime,
            &CarbonPool::ALL,
            Layer::Accumulation,
            self.names.total_accumulation_between(start, end),
        )?;
        outputs.push(accumulation.key);
        let net = self.plan_summary(
            ctx,
            regime,
            &CarbonPool::ALL,
            Layer::NetSequestration,
            self.names.total_net_sequestration_between(start, end),
        )?;
        outputs.push(net.key.clone());
        Ok((outputs, net))
    }

    /// Plan and execute the run, failing if any task fails.
    ///
    /// Rasters written by tasks that completed stay in the store either way.
    pub fn run(&self, store: Arc<dyn RasterStore>, n_workers: usize) -> CarbonResult<RunOutputs> {
        let plan = self.plan(store, n_workers)?;
        let report = plan.graph.join()?;
        Ok(RunOutputs {
            report,
            outputs: plan.outputs,
        })
    }
}
