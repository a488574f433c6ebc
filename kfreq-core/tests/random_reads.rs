//! Planned runs over reads whose k-mers are almost all distinct, the usual
//! shape of sequencing data.

use kfreq_core::kmer::count_kmer_frequencies;
use kfreq_core::{count_most_frequent, Budget, KmerCount, MemorySource, PartitionBacking, PipelineConfig, Strategy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_reads(count: usize, length: usize, seed: u64) -> MemorySource {
    let mut rng = StdRng::seed_from_u64(seed);
    let reads: Vec<Vec<u8>> = (0..count)
        .map(|_| (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect())
        .collect();
    MemorySource::new(reads)
}

/// Top `n` of the exact counts, each shifted by `offset` and kept when above zero
fn expected_top(source: &MemorySource, k: usize, n: usize, offset: u64) -> Vec<KmerCount> {
    let mut entries: Vec<KmerCount> = count_kmer_frequencies(source.records(), k)
        .into_iter()
        .filter(|(_, count)| *count > offset)
        .map(|(kmer, count)| KmerCount { count: count - offset, kmer })
        .collect();
    entries.sort_unstable_by(|a, b| b.cmp(a));
    entries.truncate(n);
    entries
}

#[test]
fn filtered_plan_holds_every_window() {
    let source = random_reads(2000, 50, 7);
    let report = count_most_frequent(&source, &PipelineConfig::new(21, 5)).unwrap();

    assert_eq!(report.total_kmers, 2000 * 29);
    assert_eq!(report.summary.windows, 2000 * 30);
    assert_eq!(report.plan.strategy, Strategy::Filtered);
    assert_eq!(report.plan.filter_capacity, 2000 * 30);
    assert!(report.entries.len() <= 5);
}

#[test]
fn filtered_plan_without_false_positives() {
    let source = random_reads(2000, 100, 11);
    let config = PipelineConfig {
        false_positive_rate: 0.0,
        ..PipelineConfig::new(21, 5)
    };
    let report = count_most_frequent(&source, &config).unwrap();

    assert_eq!(report.strategy, Strategy::Filtered);
    assert_eq!(report.entries, expected_top(&source, 21, 5, 1));

    let recounted = PipelineConfig { recount: true, ..config };
    let report = count_most_frequent(&source, &recounted).unwrap();
    let exact: Vec<KmerCount> = expected_top(&source, 21, usize::MAX, 0)
        .into_iter()
        .filter(|entry| entry.count >= 2)
        .take(5)
        .collect();
    assert_eq!(report.entries, exact);
}

#[test]
fn partitioned_plan_absorbs_uneven_partitions() {
    let source = random_reads(2000, 100, 13);
    // Just enough memory for 20 partitions of the 158_000 estimated k-mers
    let budget = Budget::new(1 << 40, 5_508_428);
    let expected = expected_top(&source, 21, 5, 0);

    for (backing, parallel) in [
        (PartitionBacking::Disk, false),
        (PartitionBacking::Disk, true),
        (PartitionBacking::Memory, false),
    ] {
        let config = PipelineConfig {
            budget,
            backing,
            parallel,
            ..PipelineConfig::new(21, 5)
        };
        let report = count_most_frequent(&source, &config).unwrap();

        assert_eq!(report.plan.strategy, Strategy::Partitioned);
        assert_eq!(report.plan.partitions, 20);
        assert_eq!(report.plan.table_limit, 11_287);
        assert_eq!(report.entries, expected, "{:?} parallel={}", backing, parallel);
    }
}

#[test]
fn partitioned_plan_with_singleton_filter() {
    let source = random_reads(2000, 100, 17);
    let config = PipelineConfig {
        budget: Budget::new(1 << 40, 5_508_428),
        singleton_filter: true,
        false_positive_rate: 0.0,
        ..PipelineConfig::new(21, 5)
    };
    let report = count_most_frequent(&source, &config).unwrap();

    assert_eq!(report.strategy, Strategy::Partitioned);
    assert_eq!(report.plan.filter_capacity, (2000 * 80 + 19) / 20);
    assert_eq!(report.entries, expected_top(&source, 21, 5, 1));
}
