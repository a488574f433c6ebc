//! Probabilistic membership filter
//!
//! A Bloom filter over k-mer bytes: no false negatives, a false-positive rate
//! fixed at construction from the target capacity. The bit buffer is sized and
//! allocated once and never grows. Items cannot be removed.

use bitvec::prelude::*;
use fnv::FnvHashSet;
use std::f64::consts::LN_2;
use xxhash_rust::xxh64::xxh64;

use crate::count::{CountError, CountResult};
use crate::types::Kmer;

const PRIMARY_SEED: u64 = 0x9e37_79b9_7f4a_7c15;
const STEP_SEED: u64 = 0x517c_c1b7_2722_0a95;

/// Largest bit array we are willing to allocate (bitvec's own limit)
const MAX_FILTER_BITS: f64 = (usize::MAX >> 3) as f64;

enum Storage {
    Bits { bits: BitVec<u64, Lsb0>, num_hashes: u32 },
    /// A rate of zero has no finite bit array, so keys are kept verbatim
    Exact(FnvHashSet<Kmer>),
}

pub struct MembershipFilter {
    storage: Storage,
    capacity: u64,
    false_positive_rate: f64,
    /// Items that were reported absent on insertion
    inserted: u64,
}

impl MembershipFilter {
    /// Size a filter for `capacity` items at `false_positive_rate`.
    ///
    /// m = -n·ln(p) / ln(2)², h = (m/n)·ln(2)
    pub fn new(capacity: u64, false_positive_rate: f64) -> CountResult<Self> {
        if capacity == 0 {
            return Err(CountError::InvalidParameter("filter capacity must be positive".into()));
        }
        if !(0.0..1.0).contains(&false_positive_rate) {
            return Err(CountError::InvalidParameter(format!(
                "false positive rate must be in [0, 1), got {}",
                false_positive_rate
            )));
        }

        let storage = if false_positive_rate == 0.0 {
            Storage::Exact(FnvHashSet::default())
        } else {
            let n = capacity as f64;
            let m = (-n * false_positive_rate.ln() / (LN_2 * LN_2)).ceil().max(1.0);
            if m > MAX_FILTER_BITS {
                return Err(CountError::InvalidParameter(format!(
                    "a filter for {} items at rate {} needs {:.0} bits",
                    capacity, false_positive_rate, m
                )));
            }
            let num_bits = m as usize;
            let num_hashes = ((m / n) * LN_2).round().max(1.0) as u32;
            Storage::Bits {
                bits: bitvec![u64, Lsb0; 0; num_bits],
                num_hashes,
            }
        };

        let filter = Self {
            storage,
            capacity,
            false_positive_rate,
            inserted: 0,
        };
        log::debug!(
            "Membership filter: capacity={} rate={} bits={} hashes={}",
            capacity,
            false_positive_rate,
            filter.num_bits(),
            filter.num_hashes()
        );
        Ok(filter)
    }

    /// Report whether `item` was (possibly falsely) present, marking it present.
    pub fn test_and_insert(&mut self, item: &[u8]) -> bool {
        let present = match &mut self.storage {
            Storage::Bits { bits, num_hashes } => {
                let (h1, h2) = digests(item);
                let len = bits.len() as u64;
                let mut present = true;
                for i in 0..*num_hashes as u64 {
                    let idx = (h1.wrapping_add(i.wrapping_mul(h2)) % len) as usize;
                    if !bits.replace(idx, true) {
                        present = false;
                    }
                }
                present
            }
            Storage::Exact(set) => {
                if set.contains(item) {
                    true
                } else {
                    set.insert(Kmer::new(item));
                    false
                }
            }
        };
        if !present {
            self.inserted += 1;
        }
        present
    }

    pub fn contains(&self, item: &[u8]) -> bool {
        match &self.storage {
            Storage::Bits { bits, num_hashes } => {
                let (h1, h2) = digests(item);
                let len = bits.len() as u64;
                (0..*num_hashes as u64)
                    .all(|i| bits[(h1.wrapping_add(i.wrapping_mul(h2)) % len) as usize])
            }
            Storage::Exact(set) => set.contains(item),
        }
    }

    /// Items believed distinct so far
    pub fn len(&self) -> u64 {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_over_capacity(&self) -> bool {
        self.inserted > self.capacity
    }

    pub fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }

    /// Bit array length; zero for the exact backend
    pub fn num_bits(&self) -> usize {
        match &self.storage {
            Storage::Bits { bits, .. } => bits.len(),
            Storage::Exact(_) => 0,
        }
    }

    pub fn num_hashes(&self) -> u32 {
        match &self.storage {
            Storage::Bits { num_hashes, .. } => *num_hashes,
            Storage::Exact(_) => 0,
        }
    }

    /// False-positive probability at the current fill, (1 - e^{-h·n/m})^h
    pub fn expected_false_positive_rate(&self) -> f64 {
        match &self.storage {
            Storage::Bits { bits, num_hashes } => {
                let h = *num_hashes as f64;
                let fill = -(h * self.inserted as f64) / bits.len() as f64;
                (1.0 - fill.exp()).powf(h)
            }
            Storage::Exact(_) => 0.0,
        }
    }
}

fn digests(item: &[u8]) -> (u64, u64) {
    (xxh64(item, PRIMARY_SEED), xxh64(item, STEP_SEED))
}
