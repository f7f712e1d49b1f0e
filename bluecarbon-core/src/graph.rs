//! Content-addressed task graph.
//!
//! Every raster-producing step of a run is submitted as a task that declares its
//! input rasters, its output rasters and the tasks it depends on. The whole graph
//! is built before anything executes. [`TaskGraph::join`] then runs the tasks in
//! dependency order, skipping any task whose hash (operation parameters, input
//! fingerprints and output keys) matches a completed entry in the cache manifest.
//!
//! A failed task only prevents its transitive dependents from running. Tasks on
//! unrelated branches complete normally and their outputs stay in the store, so a
//! corrected rerun only repeats the work that was affected.

use crate::errors::{CarbonError, CarbonResult};
use crate::operation::{check_arity, RasterOperation};
use crate::raster::Raster;
use crate::store::{RasterKey, RasterStore};
use log::{debug, error, info, warn};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use xxhash_rust::xxh3::xxh3_64;

/// Type alias for an operation wrapped in an Arc for shared ownership.
pub type Op = Arc<dyn RasterOperation>;

/// A unit of work in the graph.
#[derive(Debug)]
pub struct Task {
    pub name: String,
    pub operation: Op,
    pub inputs: Vec<RasterKey>,
    pub outputs: Vec<RasterKey>,
}

/// Handle to a submitted task, used to declare dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(NodeIndex);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Pending,
    Executed,
    Cached,
    Failed,
    Skipped,
}

#[derive(Debug)]
enum Outcome {
    Executed,
    Cached,
    Failed(String),
}

/// What happened to each task during [`TaskGraph::join`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub executed: Vec<String>,
    pub cached: Vec<String>,
    /// Failed tasks with the reason they failed.
    pub failed: Vec<(String, String)>,
    /// Tasks that were not run because a dependency failed.
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Convert a report with failures into [`CarbonError::TaskFailed`].
    pub fn into_result(self) -> CarbonResult<RunReport> {
        match self.failed.first() {
            None => Ok(self),
            Some((task, reason)) => Err(CarbonError::TaskFailed {
                task: task.clone(),
                reason: reason.clone(),
                skipped: self.skipped.len(),
            }),
        }
    }
}

/// Record of a completed task, keyed by task name in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheEntry {
    task_hash: u64,
    outputs: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheManifest {
    entries: BTreeMap<String, CacheEntry>,
}

/// Everything that identifies the result of a task.
#[derive(Serialize)]
struct TaskFingerprint<'a> {
    operation: &'a dyn RasterOperation,
    inputs: Vec<(&'a str, u64)>,
    outputs: Vec<&'a str>,
}

/// A statically constructed DAG of raster tasks over a shared store.
#[derive(Debug)]
pub struct TaskGraph {
    graph: Graph<Task, ()>,
    producers: HashMap<RasterKey, NodeIndex>,
    names: HashSet<String>,
    store: Arc<dyn RasterStore>,
    n_workers: usize,
}

impl TaskGraph {
    /// Create an empty graph.
    ///
    /// `n_workers` bounds how many tasks run concurrently; `0` runs every task
    /// synchronously on the calling thread.
    pub fn new(store: Arc<dyn RasterStore>, n_workers: usize) -> Self {
        Self {
            graph: Graph::new(),
            producers: HashMap::new(),
            names: HashSet::new(),
            store,
            n_workers,
        }
    }

    pub fn store(&self) -> &Arc<dyn RasterStore> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The task that writes `key`, if any.
    pub fn producer_of(&self, key: &RasterKey) -> Option<TaskHandle> {
        self.producers.get(key).map(|nx| TaskHandle(*nx))
    }

    pub fn task(&self, handle: TaskHandle) -> &Task {
        &self.graph[handle.0]
    }

    /// Add a task to the graph.
    ///
    /// Returns an error if an output is already claimed by another task, if an
    /// input is produced by a task that is not reachable through `dependencies`,
    /// or if an input is neither produced by a task nor present in the store.
    pub fn submit(
        &mut self,
        name: impl Into<String>,
        operation: Op,
        inputs: Vec<RasterKey>,
        outputs: Vec<RasterKey>,
        dependencies: &[TaskHandle],
    ) -> CarbonResult<TaskHandle> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(CarbonError::Error(format!(
                "A task named '{}' has already been submitted",
                name
            )));
        }
        check_arity(operation.as_ref(), inputs.len())?;
        if outputs.len() != operation.n_outputs() {
            return Err(CarbonError::Error(format!(
                "Task '{}' declares {} outputs but its operation produces {}",
                name,
                outputs.len(),
                operation.n_outputs()
            )));
        }
        for dependency in dependencies {
            if self.graph.node_weight(dependency.0).is_none() {
                return Err(CarbonError::Error(format!(
                    "Task '{}' depends on a task from another graph",
                    name
                )));
            }
        }
        for key in &outputs {
            if let Some(existing) = self.producers.get(key) {
                return Err(CarbonError::DuplicateOutput {
                    key: key.to_string(),
                    existing: self.graph[*existing].name.clone(),
                });
            }
        }
        for key in &inputs {
            match self.producers.get(key) {
                Some(producer) => {
                    let reachable = dependencies.iter().any(|d| {
                        d.0 == *producer || has_path_connecting(&self.graph, *producer, d.0, None)
                    });
                    if !reachable {
                        return Err(CarbonError::UndeclaredDependency {
                            task: name,
                            key: key.to_string(),
                            producer: self.graph[*producer].name.clone(),
                        });
                    }
                }
                None => {
                    if !self.store.exists(key) {
                        return Err(CarbonError::RasterNotFound(key.to_string()));
                    }
                }
            }
        }

        let node = self.graph.add_node(Task {
            name: name.clone(),
            operation,
            inputs,
            outputs: outputs.clone(),
        });
        for dependency in dependencies {
            self.graph.add_edge(dependency.0, node, ());
        }
        for key in outputs {
            self.producers.insert(key, node);
        }
        self.names.insert(name);
        Ok(TaskHandle(node))
    }

    /// Create a diagram that represents the task graph
    ///
    /// Useful for debugging
    pub fn as_dot(&self) -> String {
        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::NodeNoLabel, Config::EdgeNoLabel],
                &|_, _| String::new(),
                &|_, (_, task)| format!("label = {:?}", task.name),
            )
        )
    }

    /// Tasks grouped by depth: every task's dependencies sit in earlier groups.
    fn levels(&self) -> CarbonResult<Vec<Vec<NodeIndex>>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            CarbonError::Error(format!(
                "Task graph contains a cycle through '{}'",
                self.graph[cycle.node_id()].name
            ))
        })?;
        let mut depth = vec![0usize; self.graph.node_count()];
        let mut levels: Vec<Vec<NodeIndex>> = vec![];
        for node in order {
            let d = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|p| depth[p.index()] + 1)
                .max()
                .unwrap_or(0);
            depth[node.index()] = d;
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(node);
        }
        Ok(levels)
    }

    fn load_manifest(&self) -> CacheManifest {
        match self.store.read_manifest() {
            Ok(Some(contents)) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable task cache manifest: {}", e);
                CacheManifest::default()
            }),
            Ok(None) => CacheManifest::default(),
            Err(e) => {
                warn!("Ignoring unreadable task cache manifest: {}", e);
                CacheManifest::default()
            }
        }
    }

    fn task_hash(&self, task: &Task) -> CarbonResult<u64> {
        let mut inputs = Vec::with_capacity(task.inputs.len());
        for key in &task.inputs {
            inputs.push((key.as_str(), self.store.fingerprint(key)?));
        }
        let fingerprint = TaskFingerprint {
            operation: task.operation.as_ref(),
            inputs,
            outputs: task.outputs.iter().map(|k| k.as_str()).collect(),
        };
        Ok(xxh3_64(&serde_json::to_vec(&fingerprint)?))
    }

    fn is_cached(&self, entry: &CacheEntry, task: &Task, task_hash: u64) -> bool {
        if entry.task_hash != task_hash {
            return false;
        }
        task.outputs.iter().all(|key| {
            let recorded = entry.outputs.get(key.as_str());
            match (recorded, self.store.fingerprint(key)) {
                (Some(recorded), Ok(current)) if *recorded == current => true,
                (Some(_), Ok(_)) => {
                    warn!("Cached output '{}' changed on disk; recomputing", key);
                    false
                }
                _ => false,
            }
        })
    }

    fn execute(&self, task: &Task) -> CarbonResult<BTreeMap<String, u64>> {
        let inputs = task
            .inputs
            .iter()
            .map(|key| self.store.read(key))
            .collect::<CarbonResult<Vec<Raster>>>()?;
        let outputs = task.operation.apply(&inputs)?;
        if outputs.len() != task.outputs.len() {
            return Err(CarbonError::Error(format!(
                "operation returned {} rasters for {} outputs",
                outputs.len(),
                task.outputs.len()
            )));
        }
        let mut fingerprints = BTreeMap::new();
        for (key, raster) in task.outputs.iter().zip(&outputs) {
            self.store.write(key, raster)?;
            fingerprints.insert(key.to_string(), self.store.fingerprint(key)?);
        }
        Ok(fingerprints)
    }

    fn run_task(&self, node: NodeIndex, manifest: &Mutex<CacheManifest>) -> Outcome {
        let task = &self.graph[node];
        let task_hash = match self.task_hash(task) {
            Ok(hash) => hash,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let cached = manifest
            .lock()
            .ok()
            .and_then(|m| m.entries.get(&task.name).cloned());
        if let Some(entry) = cached {
            if self.is_cached(&entry, task, task_hash) {
                debug!("Cache hit for '{}'", task.name);
                return Outcome::Cached;
            }
        }

        debug!("Running '{}'", task.name);
        let outputs = match self.execute(task) {
            Ok(outputs) => outputs,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let persisted = match manifest.lock() {
            Ok(mut m) => {
                m.entries.insert(
                    task.name.clone(),
                    CacheEntry { task_hash, outputs },
                );
                serde_json::to_string_pretty(&*m)
                    .map_err(CarbonError::from)
                    .and_then(|contents| self.store.write_manifest(&contents))
            }
            Err(_) => Err(CarbonError::Error("cache manifest lock poisoned".to_string())),
        };
        if let Err(e) = persisted {
            // The outputs are valid, they just won't be reused by the next run
            warn!("Could not record '{}' in the task cache: {}", task.name, e);
        }
        Outcome::Executed
    }

    /// Run every task, returning a report even if some tasks failed.
    pub fn join_report(&self) -> CarbonResult<RunReport> {
        let levels = self.levels()?;
        let manifest = Mutex::new(self.load_manifest());
        let pool = if self.n_workers > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.n_workers)
                    .build()
                    .map_err(|e| CarbonError::Error(format!("Could not start workers: {}", e)))?,
            )
        } else {
            None
        };

        info!(
            "Running {} tasks in {} dependency levels with {} worker(s)",
            self.graph.node_count(),
            levels.len(),
            self.n_workers
        );

        let mut status = vec![TaskStatus::Pending; self.graph.node_count()];
        let mut report = RunReport::default();

        for level in levels {
            let mut runnable = Vec::with_capacity(level.len());
            for node in level {
                let blocked = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .any(|p| matches!(status[p.index()], TaskStatus::Failed | TaskStatus::Skipped));
                if blocked {
                    status[node.index()] = TaskStatus::Skipped;
                    report.skipped.push(self.graph[node].name.clone());
                } else {
                    runnable.push(node);
                }
            }

            let outcomes: Vec<(NodeIndex, Outcome)> = match &pool {
                Some(pool) => pool.install(|| {
                    runnable
                        .par_iter()
                        .map(|node| (*node, self.run_task(*node, &manifest)))
                        .collect()
                }),
                None => runnable
                    .iter()
                    .map(|node| (*node, self.run_task(*node, &manifest)))
                    .collect(),
            };

            for (node, outcome) in outcomes {
                let name = self.graph[node].name.clone();
                match outcome {
                    Outcome::Executed => {
                        status[node.index()] = TaskStatus::Executed;
                        report.executed.push(name);
                    }
                    Outcome::Cached => {
                        status[node.index()] = TaskStatus::Cached;
                        report.cached.push(name);
                    }
                    Outcome::Failed(reason) => {
                        error!("Task '{}' failed: {}", name, reason);
                        status[node.index()] = TaskStatus::Failed;
                        report.failed.push((name, reason));
                    }
                }
            }
        }

        info!(
            "{} task(s) executed, {} cached, {} failed, {} skipped",
            report.executed.len(),
            report.cached.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Run every task, failing with the first task failure.
    ///
    /// Outputs of tasks that completed stay in the store either way.
    pub fn join(&self) -> CarbonResult<RunReport> {
        self.join_report()?.into_result()
    }
}
