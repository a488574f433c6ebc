//! Counting strategies
//!
//! Two interchangeable counters reduce a sequence source to its most frequent
//! k-mers: the exact [`partitioned::PartitionedCounter`] and the filter-gated
//! [`filtered::FilteredCounter`]. Exactly one of them runs per invocation,
//! chosen by [`CountParams::strategy`].

pub mod filtered;
pub mod partitioned;
pub mod route;


use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::io::SequenceSource;
use crate::plan::{Budget, Plan};
use crate::select::TopNSelector;
use crate::types::{KmerCount, Strategy};

/// Result type for counting operations
pub type CountResult<T> = Result<T, CountError>;

/// Errors that abort a counting run
#[derive(Debug, thiserror::Error)]
pub enum CountError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Source unavailable: {name}: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(
        "Capacity exceeded: {structure} at {} holds {measured}, planned at most {planned}",
        location(.pass, .partition)
    )]
    CapacityExceeded {
        structure: &'static str,
        pass: usize,
        partition: Option<usize>,
        measured: u64,
        planned: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled after {completed_passes} completed passes")]
    Cancelled { completed_passes: usize },
}

fn location(pass: &usize, partition: &Option<usize>) -> String {
    match partition {
        Some(partition) => format!("pass {}, partition {}", pass, partition),
        None => format!("pass {}", pass),
    }
}

/// Where a partitioned pass keeps its routed k-mers before counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionBacking {
    /// One temporary spill file per partition, counted after the scan
    #[default]
    Disk,
    /// One in-memory table per partition, filled during the scan
    Memory,
}

impl std::str::FromStr for PartitionBacking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disk" => Ok(PartitionBacking::Disk),
            "memory" | "mem" => Ok(PartitionBacking::Memory),
            _ => Err(format!("Unknown partition backing: {} (available: disk, memory)", s)),
        }
    }
}

/// Shared flag for aborting a run between records or passes
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with `Cancelled` if the flag has been raised
    pub fn check(&self, completed_passes: usize) -> CountResult<()> {
        if self.is_cancelled() {
            Err(CountError::Cancelled { completed_passes })
        } else {
            Ok(())
        }
    }
}

/// Parameters for one counting run
#[derive(Debug, Clone)]
pub struct CountParams {
    /// K-mer size
    pub k: usize,
    /// Number of most frequent k-mers to report
    pub n: usize,
    /// Items each membership filter is sized for
    pub filter_capacity: u64,
    /// Target false-positive rate of membership filters, in [0, 1)
    pub false_positive_rate: f64,
    /// Passes over the source (partitioned strategy)
    pub iterations: usize,
    /// Partitions per pass (partitioned strategy)
    pub partitions: usize,
    pub strategy: Strategy,
    pub backing: PartitionBacking,
    /// Parent directory for spill files; the system temp dir when unset
    pub spill_dir: Option<PathBuf>,
    /// Count the partitions of one pass concurrently
    pub parallel: bool,
    /// Largest frequency table allowed, in entries
    pub table_limit: Option<u64>,
    /// Largest spill volume allowed for one pass, in bits
    pub disk_budget_bits: Option<u64>,
    /// Gate new keys of each partition through a membership filter
    pub singleton_filter: bool,
    /// Re-scan the source to count the surviving k-mers exactly (filtered strategy)
    pub recount: bool,
    pub cancel: CancelToken,
}

impl Default for CountParams {
    fn default() -> Self {
        Self {
            k: 21,
            n: 10,
            filter_capacity: 1_000_000,
            false_positive_rate: 0.01,
            iterations: 1,
            partitions: 1,
            strategy: Strategy::Partitioned,
            backing: PartitionBacking::Disk,
            spill_dir: None,
            parallel: false,
            table_limit: None,
            disk_budget_bits: None,
            singleton_filter: false,
            recount: false,
            cancel: CancelToken::default(),
        }
    }
}

impl CountParams {
    /// Parameters carrying the plan's sizing and bounds
    pub fn from_plan(plan: &Plan, budget: &Budget, k: usize, n: usize, false_positive_rate: f64) -> Self {
        Self {
            k,
            n,
            filter_capacity: plan.filter_capacity,
            false_positive_rate,
            iterations: plan.iterations,
            partitions: plan.partitions,
            strategy: plan.strategy,
            table_limit: Some(plan.table_limit),
            disk_budget_bits: Some(budget.disk_bits),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CountResult<()> {
        if self.k == 0 {
            return Err(CountError::InvalidParameter("k-mer size must be positive".into()));
        }
        if self.n == 0 {
            return Err(CountError::InvalidParameter(
                "number of reported k-mers must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.false_positive_rate) {
            return Err(CountError::InvalidParameter(format!(
                "false positive rate must be in [0, 1), got {}",
                self.false_positive_rate
            )));
        }
        if self.iterations == 0 || self.partitions == 0 {
            return Err(CountError::InvalidParameter(format!(
                "iterations and partitions must be at least 1 (got {} and {})",
                self.iterations, self.partitions
            )));
        }
        if self.filter_capacity == 0 {
            return Err(CountError::InvalidParameter("filter capacity must be positive".into()));
        }
        Ok(())
    }
}

/// A counting strategy
pub trait KmerCounter {
    /// Count every k-mer of the source and offer each final count to `selector`
    fn count_into(
        &self,
        source: &dyn SequenceSource,
        params: &CountParams,
        selector: &mut TopNSelector,
    ) -> CountResult<()>;

    /// Name of the strategy, for logs
    fn name(&self) -> &'static str;

    /// Count and return the `params.n` most frequent k-mers
    fn count(&self, source: &dyn SequenceSource, params: &CountParams) -> CountResult<Vec<KmerCount>> {
        let mut selector = TopNSelector::new(params.n);
        self.count_into(source, params, &mut selector)?;
        Ok(selector.finalize())
    }
}

/// Factory for creating counters
pub struct CounterFactory;

impl CounterFactory {
    pub fn create(strategy: Strategy) -> Box<dyn KmerCounter> {
        match strategy {
            Strategy::Partitioned => Box::new(partitioned::PartitionedCounter::new()),
            Strategy::Filtered => Box::new(filtered::FilteredCounter::new()),
        }
    }

    pub fn available_strategies() -> Vec<&'static str> {
        vec!["partitioned", "filtered"]
    }
}

/// Count `source` with the strategy named in `params` and return the top `n`
/// entries, count descending and k-mer ascending on ties.
pub fn run(source: &dyn SequenceSource, params: &CountParams) -> CountResult<Vec<KmerCount>> {
    params.validate()?;
    let counter = CounterFactory::create(params.strategy);
    log::info!(
        "Counting {} with the {} strategy (k={}, n={})",
        source.name(),
        counter.name(),
        params.k,
        params.n
    );
    counter.count(source, params)
}
