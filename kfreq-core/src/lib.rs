//! kfreq Core Library
//!
//! Capacity planning, partitioned and filter-gated k-mer counting, and top-N
//! selection over sequence corpora.

pub mod types;
pub mod kmer;
pub mod io;
pub mod plan;
pub mod filter;
pub mod select;
pub mod count;
pub mod pipeline;

// Re-export commonly used types and functions
pub use types::{Count, Kmer, KmerCount, Strategy};
pub use count::{
    run, CancelToken, CountError, CountParams, CountResult, CounterFactory, KmerCounter, PartitionBacking,
};
pub use filter::MembershipFilter;
pub use io::{estimate_total_kmers, MemorySource, SequenceSource};
#[cfg(feature = "io-fastx")]
pub use io::FastxSource;
pub use pipeline::{count_most_frequent, PipelineConfig, PipelineReport};
pub use plan::{Budget, Plan};
pub use select::TopNSelector;

/// Version information for the kfreq core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
