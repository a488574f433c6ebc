//! Sequence sources consumed by the counting engine
//!
//! The engine never parses record framing itself. It asks a [`SequenceSource`]
//! to stream every record's sequence bytes, once per pass, and each call
//! re-reads the underlying data from the start.

#[cfg(feature = "io-fastx")] pub mod fastx;

#[cfg(feature = "io-fastx")] pub use fastx::FastxSource;

use crate::count::CountResult;
use crate::kmer::{estimated_occurrences, window_count};

/// A re-readable stream of sequence records
pub trait SequenceSource {
    /// Visit every record's sequence from the start of the source.
    ///
    /// Any resource opened for the scan is released before this returns,
    /// whether the scan completes or `visit` fails.
    fn for_each_sequence(&self, visit: &mut dyn FnMut(&[u8]) -> CountResult<()>) -> CountResult<()>;

    /// Human-readable name used in logs and errors
    fn name(&self) -> String;
}

impl<S: SequenceSource + ?Sized> SequenceSource for &S {
    fn for_each_sequence(&self, visit: &mut dyn FnMut(&[u8]) -> CountResult<()>) -> CountResult<()> {
        (**self).for_each_sequence(visit)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// In-memory records, mostly for tests and benchmarks
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    records: Vec<Vec<u8>>,
}

impl MemorySource {
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            name: "memory".to_string(),
            records: records.into_iter().map(|r| r.as_ref().to_vec()).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.records.iter().map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SequenceSource for MemorySource {
    fn for_each_sequence(&self, visit: &mut dyn FnMut(&[u8]) -> CountResult<()>) -> CountResult<()> {
        for record in &self.records {
            visit(record)?;
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Totals gathered by the estimate pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SourceSummary {
    pub records: u64,
    pub bases: u64,
    /// Planning estimate of k-mer occurrences, Σ `max(0, len - k)`
    pub total_kmers: u64,
    /// Windows the counters actually visit, Σ `max(0, len - k + 1)`
    pub windows: u64,
}

/// Scan the source once and total its records, bases and k-mer estimate
pub fn summarize(source: &dyn SequenceSource, k: usize) -> CountResult<SourceSummary> {
    let mut summary = SourceSummary::default();
    source.for_each_sequence(&mut |sequence| {
        summary.records += 1;
        summary.bases += sequence.len() as u64;
        summary.total_kmers += estimated_occurrences(sequence.len(), k);
        summary.windows += window_count(sequence.len(), k);
        Ok(())
    })?;

    log::info!(
        "{}: {} records, {} bases, {} k-mers (k={})",
        source.name(),
        summary.records,
        summary.bases,
        summary.total_kmers,
        k
    );
    Ok(summary)
}

/// Planning estimate of total k-mer occurrences in the source
pub fn estimate_total_kmers(source: &dyn SequenceSource, k: usize) -> CountResult<u64> {
    summarize(source, k).map(|summary| summary.total_kmers)
}
