//! Capacity planning
//!
//! Maps the corpus estimate and the caller's disk/memory budgets to the
//! counting strategy and its sizing. Everything here is a pure function of its
//! inputs and uses exact integer arithmetic, so a plan is reproducible
//! bit-for-bit across runs and platforms.

use serde::Serialize;

use crate::count::{CountError, CountResult};
use crate::io::SourceSummary;
use crate::kmer::alphabet_bound;
use crate::types::Strategy;

/// Per-key bookkeeping on top of the k-mer bytes in an in-memory table:
/// boxed slice pointer and length, the `u64` count, hash-table slot overhead.
pub const KEY_OVERHEAD_BYTES: u64 = 40;

/// Share of the memory budget the tables may fill, as a fraction (7/10)
const MEMORY_FILL_NUM: u128 = 7;
const MEMORY_FILL_DEN: u128 = 10;

const BITS_PER_GIB: u64 = 1024 * 1024 * 1024 * 8;

/// Disk and memory capacities, both in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Budget {
    pub disk_bits: u64,
    pub memory_bits: u64,
}

impl Budget {
    pub fn new(disk_bits: u64, memory_bits: u64) -> Self {
        Self { disk_bits, memory_bits }
    }

    /// Budget from gibibyte figures, as taken on the command line
    pub fn from_gib(disk_gib: u64, memory_gib: u64) -> Self {
        Self {
            disk_bits: disk_gib.saturating_mul(BITS_PER_GIB),
            memory_bits: memory_gib.saturating_mul(BITS_PER_GIB),
        }
    }

    pub fn disk_gib(&self) -> f64 {
        self.disk_bits as f64 / BITS_PER_GIB as f64
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bits as f64 / BITS_PER_GIB as f64
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::from_gib(50, 4)
    }
}

/// The immutable outcome of capacity planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub iterations: usize,
    pub partitions: usize,
    pub filter_capacity: u64,
    pub strategy: Strategy,
    /// In-memory footprint of one stored key, in bits
    pub kmer_bits: u64,
    /// On-disk footprint of one spilled k-mer record, in bits
    pub kmer_disk_bits: u64,
    /// Upper bound on distinct k-mers, `min(4^k, total_kmers)`
    pub max_distinct: u64,
    /// Largest frequency table, in entries, the whole memory budget holds.
    /// Partitions are sized against 70% of it.
    pub table_limit: u64,
}

impl Plan {
    /// Derive the plan for a corpus of `total_kmers` occurrences.
    ///
    /// `k` and both budgets must be positive. An empty corpus is accepted and
    /// gets the minimal plan.
    pub fn derive(total_kmers: u64, budget: &Budget, k: usize) -> CountResult<Self> {
        if k == 0 {
            return Err(CountError::InvalidParameter("k-mer size must be positive".into()));
        }
        if budget.disk_bits == 0 || budget.memory_bits == 0 {
            return Err(CountError::InvalidParameter(format!(
                "disk and memory budgets must be positive (disk={} bits, memory={} bits)",
                budget.disk_bits, budget.memory_bits
            )));
        }

        let k = k as u64;
        let kmer_bits = (k + KEY_OVERHEAD_BYTES) * 8;
        let kmer_disk_bits = (k + 1) * 8;
        let max_distinct = alphabet_bound(k as usize).min(total_kmers);

        let total = total_kmers as u128;
        let disk = budget.disk_bits as u128;
        let memory = budget.memory_bits as u128;
        let distinct_bits = max_distinct as u128 * kmer_bits as u128;

        let iterations = ceil_div(total * kmer_disk_bits as u128, disk).max(1);
        // distinct_bits / (0.7 * memory * iterations)
        let partitions = ceil_div(
            distinct_bits * MEMORY_FILL_DEN,
            MEMORY_FILL_NUM * memory * iterations,
        )
        .max(1);
        // 0.7 * memory < kmer_bits * max_distinct
        let use_exact = MEMORY_FILL_NUM * memory < MEMORY_FILL_DEN * distinct_bits;

        let (strategy, filter_capacity) = if use_exact {
            (Strategy::Partitioned, total / (iterations * partitions))
        } else {
            (Strategy::Filtered, total)
        };
        let table_limit = memory / kmer_bits as u128;

        Ok(Self {
            iterations: saturate_usize(iterations),
            partitions: saturate_usize(partitions),
            filter_capacity: saturate_u64(filter_capacity).max(1),
            strategy,
            kmer_bits,
            kmer_disk_bits,
            max_distinct,
            table_limit: saturate_u64(table_limit).max(1),
        })
    }

    /// Plan for a summarized corpus.
    ///
    /// Strategy and layout follow [`Plan::derive`] on the corpus estimate.
    /// Filters are sized from the window count instead, one more per record
    /// than the estimate, since every window reaches a filter.
    pub fn for_corpus(summary: &SourceSummary, budget: &Budget, k: usize) -> CountResult<Self> {
        let mut plan = Self::derive(summary.total_kmers, budget, k)?;
        let windows = summary.windows as u128;
        let filter_capacity = if plan.strategy.is_exact() {
            ceil_div(windows, plan.cells() as u128)
        } else {
            windows
        };
        plan.filter_capacity = saturate_u64(filter_capacity).max(1);
        Ok(plan)
    }

    /// Number of (pass, partition) cells
    pub fn cells(&self) -> u64 {
        self.iterations as u64 * self.partitions as u64
    }

    pub fn log_summary(&self, budget: &Budget) {
        log::info!(
            "Budget: disk {:.2} GiB, memory {:.2} GiB",
            budget.disk_gib(),
            budget.memory_gib()
        );
        log::info!("Algorithm: {}", self.strategy);
        if self.strategy.is_exact() {
            log::info!("# of iterations: {}", self.iterations);
            log::info!("# of partitions: {}", self.partitions);
        }
        log::info!("Filter capacity: {}", self.filter_capacity);
        log::debug!(
            "kmer_bits={} kmer_disk_bits={} max_distinct={} table_limit={}",
            self.kmer_bits,
            self.kmer_disk_bits,
            self.max_distinct,
            self.table_limit
        );
    }
}

fn ceil_div(numerator: u128, denominator: u128) -> u128 {
    (numerator + denominator - 1) / denominator
}

fn saturate_usize(value: u128) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn saturate_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
