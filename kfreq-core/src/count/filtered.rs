//! Approximate counting gated by a membership filter
//!
//! The first sighting of a k-mer only marks it in the filter; later sightings
//! are counted in the table. A k-mer seen once therefore never reaches the
//! table unless the filter reports it falsely, and stored counts are one
//! below the true count. Recount mode re-scans the source to replace those
//! counts with exact ones and drops whatever was let through by a false
//! positive.

use fnv::FnvHashMap;
use std::time::Instant;

use super::{CountError, CountParams, CountResult, KmerCounter};
use crate::filter::MembershipFilter;
use crate::io::SequenceSource;
use crate::kmer::kmer_windows;
use crate::select::TopNSelector;
use crate::types::{Count, Kmer, KmerCount};

/// Filter-gated counter
pub struct FilteredCounter;

impl FilteredCounter {
    pub fn new() -> Self {
        Self
    }

    /// Pass 1: count every k-mer the filter reports as already present
    fn gated_pass(&self, source: &dyn SequenceSource, params: &CountParams) -> CountResult<FnvHashMap<Kmer, Count>> {
        let mut filter = MembershipFilter::new(params.filter_capacity, params.false_positive_rate)?;
        let mut table: FnvHashMap<Kmer, Count> = FnvHashMap::default();

        source.for_each_sequence(&mut |sequence| {
            params.cancel.check(0)?;
            for kmer in kmer_windows(sequence, params.k) {
                if !filter.test_and_insert(kmer) {
                    continue;
                }
                if let Some(count) = table.get_mut(kmer) {
                    *count += 1;
                    continue;
                }
                table.insert(Kmer::new(kmer), 1);
                check_table_limit(table.len() as u64, params)?;
            }
            Ok(())
        })?;

        if filter.is_over_capacity() {
            return Err(CountError::CapacityExceeded {
                structure: "membership filter",
                pass: 0,
                partition: None,
                measured: filter.len(),
                planned: filter.capacity(),
            });
        }
        log::debug!(
            "Filter holds {} k-mers (expected false-positive rate {:.4}); {} counted",
            filter.len(),
            filter.expected_false_positive_rate(),
            table.len()
        );
        Ok(table)
    }

    /// Pass 2: exact counts for the k-mers that survived the gated pass
    fn recount_pass(
        &self,
        source: &dyn SequenceSource,
        params: &CountParams,
        table: &mut FnvHashMap<Kmer, Count>,
    ) -> CountResult<()> {
        for count in table.values_mut() {
            *count = 0;
        }

        source.for_each_sequence(&mut |sequence| {
            params.cancel.check(1)?;
            for kmer in kmer_windows(sequence, params.k) {
                if let Some(count) = table.get_mut(kmer) {
                    *count += 1;
                }
            }
            Ok(())
        })?;

        let before = table.len();
        table.retain(|_, count| *count >= 2);
        log::debug!("Recount dropped {} singletons", before - table.len());
        Ok(())
    }
}

impl Default for FilteredCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl KmerCounter for FilteredCounter {
    fn count_into(
        &self,
        source: &dyn SequenceSource,
        params: &CountParams,
        selector: &mut TopNSelector,
    ) -> CountResult<()> {
        params.cancel.check(0)?;
        let started = Instant::now();
        let mut table = self.gated_pass(source, params)?;
        log::info!(
            "Filtered pass completed in {:.2}s ({} k-mers seen more than once)",
            started.elapsed().as_secs_f64(),
            table.len()
        );

        if params.recount {
            params.cancel.check(1)?;
            let started = Instant::now();
            self.recount_pass(source, params, &mut table)?;
            log::info!(
                "Recount pass completed in {:.2}s ({} k-mers kept)",
                started.elapsed().as_secs_f64(),
                table.len()
            );
        }

        for (kmer, count) in table {
            selector.offer_entry(KmerCount { count, kmer });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filtered"
    }
}

fn check_table_limit(measured: u64, params: &CountParams) -> CountResult<()> {
    match params.table_limit {
        Some(limit) if measured > limit => Err(CountError::CapacityExceeded {
            structure: "frequency table",
            pass: 0,
            partition: None,
            measured,
            planned: limit,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;
    use crate::types::Strategy;

    fn params(k: usize, n: usize) -> CountParams {
        CountParams {
            k,
            n,
            strategy: Strategy::Filtered,
            false_positive_rate: 0.0,
            filter_capacity: 1_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_counts_after_first_sighting() {
        // AAA x3, AAC x2, ACA once
        let source = MemorySource::new(["AAAAAC", "AACA"]);
        let top = FilteredCounter::new().count(&source, &params(3, 10)).unwrap();
        assert_eq!(top, vec![KmerCount::new(2, "AAA"), KmerCount::new(1, "AAC")]);
    }

    #[test]
    fn test_recount_restores_true_counts() {
        let source = MemorySource::new(["AAAAAC", "AACA"]);
        let p = CountParams {
            recount: true,
            ..params(3, 10)
        };
        let top = FilteredCounter::new().count(&source, &p).unwrap();
        assert_eq!(top, vec![KmerCount::new(3, "AAA"), KmerCount::new(2, "AAC")]);
    }

    #[test]
    fn test_recount_drops_false_positives() {
        // One bit, one hash: everything after the first k-mer reads as present
        let source = MemorySource::new(["ACGTTT"]);
        let gated = CountParams {
            false_positive_rate: 0.9,
            filter_capacity: 1,
            ..params(2, 10)
        };

        let top = FilteredCounter::new().count(&source, &gated).unwrap();
        assert_eq!(
            top,
            vec![
                KmerCount::new(2, "TT"),
                KmerCount::new(1, "CG"),
                KmerCount::new(1, "GT"),
            ]
        );

        let recounted = CountParams { recount: true, ..gated };
        let top = FilteredCounter::new().count(&source, &recounted).unwrap();
        assert_eq!(top, vec![KmerCount::new(2, "TT")]);
    }

    #[test]
    fn test_filter_capacity_exceeded() {
        let source = MemorySource::new(["ACGTACGGTTCA"]);
        let p = CountParams {
            filter_capacity: 3,
            ..params(3, 10)
        };

        let err = FilteredCounter::new().count(&source, &p).unwrap_err();
        match err {
            CountError::CapacityExceeded {
                structure,
                pass,
                partition,
                planned,
                ..
            } => {
                assert_eq!(structure, "membership filter");
                assert_eq!(pass, 0);
                assert_eq!(partition, None);
                assert_eq!(planned, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_table_limit() {
        // AC, CG, GT each repeat
        let source = MemorySource::new(["ACGT", "ACGT"]);
        let p = CountParams {
            table_limit: Some(2),
            ..params(2, 10)
        };

        let err = FilteredCounter::new().count(&source, &p).unwrap_err();
        assert!(matches!(
            err,
            CountError::CapacityExceeded {
                structure: "frequency table",
                measured: 3,
                planned: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled() {
        let source = MemorySource::new(["ACGT"]);
        let p = params(2, 5);
        p.cancel.cancel();

        let err = FilteredCounter::new().count(&source, &p).unwrap_err();
        assert!(matches!(err, CountError::Cancelled { completed_passes: 0 }));
    }
}
