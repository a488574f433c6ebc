//! Sliding-window k-mer extraction shared by both counting strategies

use fnv::FnvHashMap;
use std::slice::Windows;

use crate::types::{Count, Kmer};

/// Iterate every overlapping window of width `k` in `sequence`.
///
/// Records shorter than `k` yield nothing. `k` must be positive.
#[inline]
pub fn kmer_windows(sequence: &[u8], k: usize) -> Windows<'_, u8> {
    debug_assert!(k > 0, "k-mer size must be positive");
    sequence.windows(k)
}

/// Planning estimate of the k-mer occurrences in one record: `max(0, len - k)`
#[inline]
pub fn estimated_occurrences(len: usize, k: usize) -> u64 {
    len.saturating_sub(k) as u64
}

/// Windows of width `k` in a record of length `len`: `max(0, len - k + 1)`
#[inline]
pub fn window_count(len: usize, k: usize) -> u64 {
    (len + 1).saturating_sub(k) as u64
}

/// Upper bound on distinct k-mers over a 4-letter alphabet, saturating at `u64::MAX`
pub fn alphabet_bound(k: usize) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        1u64 << (2 * k)
    }
}

/// Count every k-mer of every sequence in one in-memory table.
///
/// No bound is applied to the table; this is the brute-force reference the
/// bounded strategies are checked against.
pub fn count_kmer_frequencies<'a, I>(sequences: I, k: usize) -> FnvHashMap<Kmer, Count>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut counts: FnvHashMap<Kmer, Count> = FnvHashMap::default();
    for sequence in sequences {
        for window in kmer_windows(sequence, k) {
            if let Some(count) = counts.get_mut(window) {
                *count += 1;
            } else {
                counts.insert(Kmer::new(window), 1);
            }
        }
    }
    counts
}
