//! Hash routing of k-mers to (pass, partition) cells.
//!
//! Both coordinates come from seeded xxh64 digests of the k-mer bytes alone,
//! so every occurrence of a k-mer lands in the same cell on every scan.

use xxhash_rust::xxh64::xxh64;

const PASS_SEED: u64 = 0x2545_f491_4f6c_dd1d;
const PARTITION_SEED: u64 = 0x6a09_e667_f3bc_c908;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerRouter {
    iterations: u64,
    partitions: u64,
}

impl KmerRouter {
    pub fn new(iterations: usize, partitions: usize) -> Self {
        debug_assert!(iterations > 0 && partitions > 0);
        Self {
            iterations: iterations as u64,
            partitions: partitions as u64,
        }
    }

    #[inline]
    pub fn pass_of(&self, kmer: &[u8]) -> usize {
        if self.iterations == 1 {
            return 0;
        }
        (xxh64(kmer, PASS_SEED) % self.iterations) as usize
    }

    #[inline]
    pub fn partition_of(&self, kmer: &[u8]) -> usize {
        if self.partitions == 1 {
            return 0;
        }
        (xxh64(kmer, PARTITION_SEED) % self.partitions) as usize
    }

    pub fn cell_of(&self, kmer: &[u8]) -> (usize, usize) {
        (self.pass_of(kmer), self.partition_of(kmer))
    }

    pub fn iterations(&self) -> usize {
        self.iterations as usize
    }

    pub fn partitions(&self) -> usize {
        self.partitions as usize
    }
}
