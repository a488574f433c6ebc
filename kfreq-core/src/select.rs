//! Bounded top-N selection over (count, k-mer) entries.
//!
//! Keeps the N best entries seen so far in a size-N min-heap keyed on the
//! ranking order of [`KmerCount`]: higher count first, lexicographically
//! smaller k-mer first on equal counts. Memory is O(N) however many entries
//! are offered.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::{Count, Kmer, KmerCount};

#[derive(Debug, Clone)]
pub struct TopNSelector {
    /// Min-heap on rank; the root is the entry to evict next
    heap: BinaryHeap<Reverse<KmerCount>>,
    limit: usize,
}

impl TopNSelector {
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.min(1 << 16)),
            limit,
        }
    }

    /// Whether an entry with this count and k-mer would currently be kept
    #[inline]
    pub fn admits(&self, count: Count, kmer: &[u8]) -> bool {
        if self.heap.len() < self.limit {
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(lowest)) => lowest.is_outranked_by(count, kmer),
            None => false,
        }
    }

    /// Offer a borrowed k-mer; it is copied only if admitted.
    #[inline]
    pub fn offer(&mut self, kmer: &[u8], count: Count) {
        if self.admits(count, kmer) {
            self.push(KmerCount {
                count,
                kmer: Kmer::new(kmer),
            });
        }
    }

    /// Offer an owned entry, avoiding a copy when a table is drained
    #[inline]
    pub fn offer_entry(&mut self, entry: KmerCount) {
        if self.admits(entry.count, entry.kmer.as_bytes()) {
            self.push(entry);
        }
    }

    fn push(&mut self, entry: KmerCount) {
        if self.heap.len() >= self.limit {
            self.heap.pop();
        }
        self.heap.push(Reverse(entry));
    }

    /// Fold another selector's entries into this one.
    ///
    /// Both selectors must have seen disjoint k-mers; the result is then the
    /// same as if every entry had been offered here directly.
    pub fn merge(&mut self, other: TopNSelector) {
        for Reverse(entry) in other.heap {
            self.offer_entry(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The kept entries, count descending, k-mer ascending on ties
    pub fn finalize(self) -> Vec<KmerCount> {
        let mut entries: Vec<KmerCount> = self.heap.into_iter().map(|Reverse(e)| e).collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries
    }
}
