//! End-to-end run: estimate, plan, count, select
//!
//! ```no_run
//! use kfreq_core::io::MemorySource;
//! use kfreq_core::pipeline::{count_most_frequent, PipelineConfig};
//!
//! let source = MemorySource::new(["ACGTACGTACGT"]);
//! let report = count_most_frequent(&source, &PipelineConfig::new(4, 3)).unwrap();
//! for entry in &report.entries {
//!     println!("{}", entry);
//! }
//! ```

use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::count::{self, CancelToken, CountParams, CountResult, PartitionBacking};
use crate::io::{summarize, SequenceSource, SourceSummary};
use crate::plan::{Budget, Plan};
use crate::types::{KmerCount, Strategy};

/// Everything a run needs besides the source
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub k: usize,
    pub n: usize,
    pub budget: Budget,
    pub false_positive_rate: f64,
    /// Run this strategy instead of the planned one
    pub strategy_override: Option<Strategy>,
    pub backing: PartitionBacking,
    pub spill_dir: Option<PathBuf>,
    pub parallel: bool,
    pub singleton_filter: bool,
    pub recount: bool,
    pub cancel: CancelToken,
}

impl PipelineConfig {
    pub fn new(k: usize, n: usize) -> Self {
        Self {
            k,
            n,
            budget: Budget::default(),
            false_positive_rate: 0.01,
            strategy_override: None,
            backing: PartitionBacking::default(),
            spill_dir: None,
            parallel: false,
            singleton_filter: false,
            recount: false,
            cancel: CancelToken::default(),
        }
    }

    /// Counting parameters for a derived plan, with this config's overrides.
    ///
    /// Memory backing keeps every partition of a pass resident, so a plan with
    /// several partitions is run as that many more passes of one partition.
    pub fn count_params(&self, plan: &Plan) -> CountParams {
        let mut params = CountParams::from_plan(plan, &self.budget, self.k, self.n, self.false_positive_rate);
        if let Some(strategy) = self.strategy_override {
            if strategy != plan.strategy {
                log::info!("Strategy overridden: {} instead of planned {}", strategy, plan.strategy);
            }
            params.strategy = strategy;
        }
        params.backing = self.backing;
        if self.backing == PartitionBacking::Memory && params.partitions > 1 {
            log::info!(
                "Memory backing: running {} partitions as separate passes ({} passes)",
                params.partitions,
                params.iterations.saturating_mul(params.partitions)
            );
            params.iterations = params.iterations.saturating_mul(params.partitions);
            params.partitions = 1;
        }
        params.spill_dir = self.spill_dir.clone();
        params.parallel = self.parallel;
        params.singleton_filter = self.singleton_filter;
        params.recount = self.recount;
        params.cancel = self.cancel.clone();
        params
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub summary: SourceSummary,
    pub total_kmers: u64,
    pub plan: Plan,
    /// Strategy that actually ran
    pub strategy: Strategy,
    pub entries: Vec<KmerCount>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Estimate the corpus, plan against the budget and count its `n` most
/// frequent k-mers.
pub fn count_most_frequent(source: &dyn SequenceSource, config: &PipelineConfig) -> CountResult<PipelineReport> {
    let started = Instant::now();

    let summary = summarize(source, config.k)?;
    let plan = Plan::for_corpus(&summary, &config.budget, config.k)?;
    plan.log_summary(&config.budget);

    let params = config.count_params(&plan);
    let entries = count::run(source, &params)?;

    let elapsed = started.elapsed();
    log::info!("Done in {:.2}s, {} k-mers reported", elapsed.as_secs_f64(), entries.len());
    Ok(PipelineReport {
        summary,
        total_kmers: summary.total_kmers,
        plan,
        strategy: params.strategy,
        entries,
        elapsed,
    })
}
