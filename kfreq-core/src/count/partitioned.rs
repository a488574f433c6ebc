//! Exact multi-pass counting over hash partitions
//!
//! Pass `i` re-reads the whole source and keeps only the k-mers whose pass
//! hash is `i`, routing each into one of `partitions` cells by a second hash.
//! Every occurrence of a k-mer lands in the same cell, so a cell's table holds
//! the complete count of each of its keys and is drained into the selector
//! exactly once. Tables live only for their pass.
//!
//! With disk backing the routed k-mers are spilled to one temporary file per
//! partition (`k` bytes plus a newline per record) and each file is counted
//! after the scan; with memory backing the partition tables are filled during
//! the scan itself.

use fnv::FnvHashMap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

use super::route::KmerRouter;
use super::{CountError, CountParams, CountResult, KmerCounter, PartitionBacking};
use crate::filter::MembershipFilter;
use crate::io::SequenceSource;
use crate::kmer::kmer_windows;
use crate::select::TopNSelector;
use crate::types::{Count, Kmer, KmerCount};

const SPILL_BUFFER_BYTES: usize = 64 * 1024;
const RECORD_TERMINATOR: u8 = b'\n';

/// Exact partitioned counter
pub struct PartitionedCounter;

impl PartitionedCounter {
    pub fn new() -> Self {
        Self
    }

    fn disk_pass(
        &self,
        pass: usize,
        source: &dyn SequenceSource,
        params: &CountParams,
        router: &KmerRouter,
    ) -> CountResult<TopNSelector> {
        let mut spill = SpillSet::create(params.spill_dir.as_deref(), pass, params.partitions, params.k)?;

        source.for_each_sequence(&mut |sequence| {
            params.cancel.check(pass)?;
            for kmer in kmer_windows(sequence, params.k) {
                if router.pass_of(kmer) != pass {
                    continue;
                }
                spill.write(router.partition_of(kmer), kmer)?;
            }
            if let Some(budget) = params.disk_budget_bits {
                let spilled = spill.spilled_bits();
                if spilled > budget {
                    return Err(CountError::CapacityExceeded {
                        structure: "spill files",
                        pass,
                        partition: None,
                        measured: spilled,
                        planned: budget,
                    });
                }
            }
            Ok(())
        })?;

        let spilled = spill.finish()?;
        log::debug!(
            "Pass {}: spilled {} k-mers into {} partitions",
            pass,
            spilled.total_records(),
            spilled.files.len()
        );

        let count_file = |(partition, file): (usize, &SpillFile)| -> CountResult<TopNSelector> {
            let mut table = CellTable::new(params)?;
            file.for_each_record(params.k, |kmer| {
                if table.add(kmer) {
                    check_table_limit(&table, params, pass, Some(partition), table.len())?;
                }
                Ok(())
            })?;
            let mut partial = TopNSelector::new(params.n);
            table.drain_into(&mut partial, pass, Some(partition));
            Ok(partial)
        };

        let partials: Vec<TopNSelector> = if params.parallel {
            spilled
                .files
                .par_iter()
                .enumerate()
                .map(count_file)
                .collect::<CountResult<_>>()?
        } else {
            spilled
                .files
                .iter()
                .enumerate()
                .map(count_file)
                .collect::<CountResult<_>>()?
        };

        Ok(merge_partials(params.n, partials))
    }

    fn memory_pass(
        &self,
        pass: usize,
        source: &dyn SequenceSource,
        params: &CountParams,
        router: &KmerRouter,
    ) -> CountResult<TopNSelector> {
        let mut tables = (0..params.partitions)
            .map(|_| CellTable::new(params))
            .collect::<CountResult<Vec<_>>>()?;
        // Every table of the pass is resident at once, so the bound applies
        // to their combined size.
        let mut resident: u64 = 0;

        source.for_each_sequence(&mut |sequence| {
            params.cancel.check(pass)?;
            for kmer in kmer_windows(sequence, params.k) {
                if router.pass_of(kmer) != pass {
                    continue;
                }
                let partition = router.partition_of(kmer);
                if tables[partition].add(kmer) {
                    resident += 1;
                    check_table_limit(&tables[partition], params, pass, None, resident)?;
                }
            }
            Ok(())
        })?;

        let drain = |(partition, table): (usize, CellTable)| -> TopNSelector {
            let mut partial = TopNSelector::new(params.n);
            table.drain_into(&mut partial, pass, Some(partition));
            partial
        };

        let partials: Vec<TopNSelector> = if params.parallel {
            tables.into_par_iter().enumerate().map(drain).collect()
        } else {
            tables.into_iter().enumerate().map(drain).collect()
        };

        Ok(merge_partials(params.n, partials))
    }
}

impl Default for PartitionedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl KmerCounter for PartitionedCounter {
    fn count_into(
        &self,
        source: &dyn SequenceSource,
        params: &CountParams,
        selector: &mut TopNSelector,
    ) -> CountResult<()> {
        let router = KmerRouter::new(params.iterations, params.partitions);

        for pass in 0..params.iterations {
            params.cancel.check(pass)?;
            let started = Instant::now();

            let pass_top = match params.backing {
                PartitionBacking::Disk => self.disk_pass(pass, source, params, &router)?,
                PartitionBacking::Memory => self.memory_pass(pass, source, params, &router)?,
            };

            log::info!(
                "Pass {}/{} completed in {:.2}s ({} candidates)",
                pass + 1,
                params.iterations,
                started.elapsed().as_secs_f64(),
                pass_top.len()
            );
            // Merged only once the whole pass has succeeded
            selector.merge(pass_top);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "partitioned"
    }
}

/// Frequency table of one (pass, partition) cell
struct CellTable {
    counts: FnvHashMap<Kmer, Count>,
    /// Holds back each key until its second sighting when singleton filtering is on
    gate: Option<MembershipFilter>,
}

impl CellTable {
    fn new(params: &CountParams) -> CountResult<Self> {
        let gate = if params.singleton_filter {
            Some(MembershipFilter::new(params.filter_capacity, params.false_positive_rate)?)
        } else {
            None
        };
        Ok(Self {
            counts: FnvHashMap::default(),
            gate,
        })
    }

    /// Record one occurrence, returning whether a new key was stored
    #[inline]
    fn add(&mut self, kmer: &[u8]) -> bool {
        if let Some(count) = self.counts.get_mut(kmer) {
            *count += 1;
            return false;
        }
        if let Some(gate) = self.gate.as_mut() {
            if !gate.test_and_insert(kmer) {
                return false;
            }
        }
        self.counts.insert(Kmer::new(kmer), 1);
        true
    }

    fn len(&self) -> u64 {
        self.counts.len() as u64
    }

    fn drain_into(self, selector: &mut TopNSelector, pass: usize, partition: Option<usize>) {
        // Cells are sized by their average share; an uneven one only raises
        // the false-positive rate of its gate
        if let Some(gate) = self.gate.as_ref().filter(|gate| gate.is_over_capacity()) {
            log::warn!(
                "Pass {} partition {:?}: singleton filter holds {} k-mers, sized for {} (expected false-positive rate {:.4})",
                pass,
                partition,
                gate.len(),
                gate.capacity(),
                gate.expected_false_positive_rate()
            );
        }
        log::debug!(
            "Pass {} partition {:?}: {} distinct k-mers",
            pass,
            partition,
            self.counts.len()
        );
        for (kmer, count) in self.counts {
            selector.offer_entry(KmerCount { count, kmer });
        }
    }
}

fn check_table_limit(
    table: &CellTable,
    params: &CountParams,
    pass: usize,
    partition: Option<usize>,
    measured: u64,
) -> CountResult<()> {
    match params.table_limit {
        Some(limit) if measured > limit => {
            log::warn!(
                "Pass {} table grew past {} entries ({} in the current partition)",
                pass,
                limit,
                table.len()
            );
            Err(CountError::CapacityExceeded {
                structure: "partition table",
                pass,
                partition,
                measured,
                planned: limit,
            })
        }
        _ => Ok(()),
    }
}

fn merge_partials(n: usize, partials: Vec<TopNSelector>) -> TopNSelector {
    let mut pass_top = TopNSelector::new(n);
    for partial in partials {
        pass_top.merge(partial);
    }
    pass_top
}

/// Open spill files for one pass
struct SpillSet {
    dir: TempDir,
    writers: Vec<BufWriter<File>>,
    paths: Vec<PathBuf>,
    records: Vec<u64>,
    record_bits: u64,
}

impl SpillSet {
    fn create(parent: Option<&Path>, pass: usize, partitions: usize, k: usize) -> CountResult<Self> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("kfreq-pass{}-", pass);
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        let mut writers = Vec::with_capacity(partitions);
        let mut paths = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let path = dir.path().join(format!("partition_{:05}.kmers", partition));
            let file = File::create(&path)?;
            writers.push(BufWriter::with_capacity(SPILL_BUFFER_BYTES, file));
            paths.push(path);
        }

        Ok(Self {
            dir,
            writers,
            paths,
            records: vec![0; partitions],
            record_bits: (k as u64 + 1) * 8,
        })
    }

    #[inline]
    fn write(&mut self, partition: usize, kmer: &[u8]) -> io::Result<()> {
        let writer = &mut self.writers[partition];
        writer.write_all(kmer)?;
        writer.write_all(&[RECORD_TERMINATOR])?;
        self.records[partition] += 1;
        Ok(())
    }

    fn spilled_bits(&self) -> u64 {
        self.records.iter().sum::<u64>() * self.record_bits
    }

    fn finish(self) -> CountResult<SpilledPass> {
        for writer in self.writers {
            writer.into_inner().map_err(|e| e.into_error())?;
        }
        let files = self
            .paths
            .into_iter()
            .zip(self.records)
            .map(|(path, records)| SpillFile { path, records })
            .collect();
        Ok(SpilledPass { _dir: self.dir, files })
    }
}

/// Closed spill files of one pass; removed from disk when dropped
struct SpilledPass {
    _dir: TempDir,
    files: Vec<SpillFile>,
}

impl SpilledPass {
    fn total_records(&self) -> u64 {
        self.files.iter().map(|f| f.records).sum()
    }
}

struct SpillFile {
    path: PathBuf,
    records: u64,
}

impl SpillFile {
    fn for_each_record<F>(&self, k: usize, mut visit: F) -> CountResult<()>
    where
        F: FnMut(&[u8]) -> CountResult<()>,
    {
        let mut reader = BufReader::with_capacity(SPILL_BUFFER_BYTES, File::open(&self.path)?);
        let mut record = vec![0u8; k + 1];
        for _ in 0..self.records {
            reader.read_exact(&mut record)?;
            if record[k] != RECORD_TERMINATOR {
                return Err(CountError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("corrupt spill record in {}", self.path.display()),
                )));
            }
            visit(&record[..k])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;
    use crate::types::Strategy;

    fn params(k: usize, n: usize, iterations: usize, partitions: usize) -> CountParams {
        CountParams {
            k,
            n,
            iterations,
            partitions,
            strategy: Strategy::Partitioned,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_cell_counts() {
        let source = MemorySource::new(["ACGTACGT"]);
        let top = PartitionedCounter::new().count(&source, &params(4, 3, 1, 1)).unwrap();
        assert_eq!(
            top,
            vec![
                KmerCount::new(2, "ACGT"),
                KmerCount::new(1, "CGTA"),
                KmerCount::new(1, "GTAC"),
            ]
        );
    }

    #[test]
    fn test_spill_files_removed_after_pass() {
        let spill_root = tempfile::tempdir().unwrap();
        let source = MemorySource::new(["ACGTACGTTT", "GGGACGT"]);
        let p = CountParams {
            spill_dir: Some(spill_root.path().to_path_buf()),
            ..params(3, 5, 2, 3)
        };

        PartitionedCounter::new().count(&source, &p).unwrap();
        assert_eq!(std::fs::read_dir(spill_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_partition_table_limit() {
        let source = MemorySource::new(["ACGTTGCAAGGCTTAC"]);
        let p = CountParams {
            table_limit: Some(2),
            ..params(4, 5, 1, 1)
        };

        match PartitionedCounter::new().count(&source, &p) {
            Err(CountError::CapacityExceeded {
                structure,
                pass,
                partition,
                measured,
                planned,
            }) => {
                assert_eq!(structure, "partition table");
                assert_eq!(pass, 0);
                assert_eq!(partition, Some(0));
                assert_eq!(measured, 3);
                assert_eq!(planned, 2);
            }
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_backing_bounds_whole_pass() {
        let source = MemorySource::new(["ACGTTGCAAGGCTTAC"]);
        let p = CountParams {
            backing: PartitionBacking::Memory,
            table_limit: Some(4),
            ..params(4, 5, 1, 4)
        };

        let err = PartitionedCounter::new().count(&source, &p).unwrap_err();
        assert!(matches!(
            err,
            CountError::CapacityExceeded { partition: None, measured: 5, .. }
        ));
    }

    #[test]
    fn test_disk_budget() {
        let source = MemorySource::new(["ACGTACGTACGT"]);
        // Nine 4-mers at 40 bits each overflow a 100 bit budget
        let p = CountParams {
            disk_budget_bits: Some(100),
            ..params(4, 5, 1, 2)
        };

        let err = PartitionedCounter::new().count(&source, &p).unwrap_err();
        assert!(matches!(
            err,
            CountError::CapacityExceeded { structure: "spill files", .. }
        ));
    }

    #[test]
    fn test_singleton_filter_skips_first_sighting() {
        let source = MemorySource::new(["AAAAA", "CCGT"]);
        let p = CountParams {
            singleton_filter: true,
            false_positive_rate: 0.0,
            filter_capacity: 16,
            ..params(2, 10, 2, 2)
        };

        // AA occurs 4 times, CC/CG/GT once each
        let top = PartitionedCounter::new().count(&source, &p).unwrap();
        assert_eq!(top, vec![KmerCount::new(3, "AA")]);
    }

    #[test]
    fn test_overfilled_singleton_filter_still_counts() {
        // Four distinct 2-mers pass through a gate sized for one
        let source = MemorySource::new(["AAAAA", "CCGT"]);
        let p = CountParams {
            singleton_filter: true,
            false_positive_rate: 0.0,
            filter_capacity: 1,
            ..params(2, 10, 1, 1)
        };

        let top = PartitionedCounter::new().count(&source, &p).unwrap();
        assert_eq!(top, vec![KmerCount::new(3, "AA")]);
    }

    #[test]
    fn test_cancelled_before_first_pass() {
        let source = MemorySource::new(["ACGT"]);
        let p = params(2, 5, 3, 2);
        p.cancel.cancel();

        let err = PartitionedCounter::new().count(&source, &p).unwrap_err();
        assert!(matches!(err, CountError::Cancelled { completed_passes: 0 }));
    }

    #[test]
    fn test_corrupt_spill_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition.kmers");
        std::fs::write(&path, b"ACGTx").unwrap();

        let file = SpillFile { path, records: 1 };
        let err = file.for_each_record(4, |_| Ok(())).unwrap_err();
        assert!(matches!(err, CountError::Io(_)));
    }

    #[test]
    fn test_truncated_spill_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition.kmers");
        std::fs::write(&path, b"ACGT\nAC").unwrap();

        let file = SpillFile { path, records: 2 };
        let mut seen = 0;
        let err = file
            .for_each_record(4, |_| {
                seen += 1;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(seen, 1);
        assert!(matches!(err, CountError::Io(_)));
    }
}
