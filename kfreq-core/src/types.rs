use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

/// Occurrence count of a single k-mer
pub type Count = u64;

/// A fixed-length window of sequence bytes, taken verbatim from the read.
///
/// Ordering is byte-lexicographic, which is what the top-N tie-break uses.
/// `Kmer` borrows as `[u8]`, so frequency tables keyed by `Kmer` can be probed
/// with a slice straight out of the sequence buffer without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kmer(Box<[u8]>);

impl Kmer {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[u8]> for Kmer {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Kmer {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Kmer {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for Kmer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A (count, k-mer) result entry.
///
/// `Ord` is the ranking order: a greater entry has a higher count, or the same
/// count and a lexicographically smaller k-mer. Sorting descending by this
/// order gives the reported output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KmerCount {
    pub count: Count,
    pub kmer: Kmer,
}

impl KmerCount {
    pub fn new(count: Count, kmer: impl Into<Kmer>) -> Self {
        Self {
            count,
            kmer: kmer.into(),
        }
    }

    /// Whether an entry with `count` and `kmer` would rank strictly above `self`
    pub fn is_outranked_by(&self, count: Count, kmer: &[u8]) -> bool {
        match count.cmp(&self.count) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => kmer < self.kmer.as_bytes(),
        }
    }
}

impl Ord for KmerCount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| other.kmer.cmp(&self.kmer))
    }
}

impl PartialOrd for KmerCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KmerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kmer, self.count)
    }
}

/// Counting strategy selected by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Exact multi-pass counting over hash partitions
    Partitioned,
    /// Filter-gated counting that never materializes singletons
    Filtered,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Partitioned => "partitioned",
            Strategy::Filtered => "filtered",
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Strategy::Partitioned)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "partitioned" | "dsk" | "exact" => Ok(Strategy::Partitioned),
            "filtered" | "bfcounter" | "approximate" => Ok(Strategy::Filtered),
            _ => Err(format!("Unknown strategy: {} (available: partitioned, filtered)", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_order() {
        let a = KmerCount::new(5, "AAA");
        let c = KmerCount::new(5, "AAC");
        let t = KmerCount::new(3, "TTT");

        assert!(a > c, "equal counts rank the smaller k-mer higher");
        assert!(c > t);

        let mut entries = vec![t.clone(), c.clone(), a.clone()];
        entries.sort_by(|x, y| y.cmp(x));
        assert_eq!(entries, vec![a, c, t]);
    }

    #[test]
    fn test_is_outranked_by() {
        let entry = KmerCount::new(4, "CCC");
        assert!(entry.is_outranked_by(5, b"TTT"));
        assert!(entry.is_outranked_by(4, b"AAA"));
        assert!(!entry.is_outranked_by(4, b"CCC"));
        assert!(!entry.is_outranked_by(4, b"GGG"));
        assert!(!entry.is_outranked_by(3, b"AAA"));
    }

    #[test]
    fn test_kmer_borrow_and_display() {
        use std::collections::HashMap;

        let mut table: HashMap<Kmer, u64> = HashMap::new();
        table.insert(Kmer::from("ACGT"), 3);
        assert_eq!(table.get(&b"ACGT"[..]), Some(&3));
        assert_eq!(Kmer::from("ACGT").to_string(), "ACGT");
        assert_eq!(KmerCount::new(7, "GATC").to_string(), "GATC: 7");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("partitioned".parse::<Strategy>(), Ok(Strategy::Partitioned));
        assert_eq!("BFCounter".parse::<Strategy>(), Ok(Strategy::Filtered));
        assert!("bogus".parse::<Strategy>().is_err());
        assert!(Strategy::Partitioned.is_exact());
    }
}
