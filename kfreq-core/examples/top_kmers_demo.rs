//! kfreq Counting Demo
//!
//! Plans and counts the same small corpus with both strategies and prints
//! what each reports.

use kfreq_core::{
    count_most_frequent, Budget, CountResult, MemorySource, PartitionBacking, PipelineConfig, PipelineReport, Strategy,
};

fn main() -> CountResult<()> {
    println!("kfreq Counting Demo");
    println!("===================\n");

    let source = MemorySource::new([
        "ACGTACGTGGATCCAAGTTTGACCA",
        "GGATCCAAGTACGTACGTTTTGACC",
        "TTGACCAGGATCCAAGTACGTAAAA",
    ])
    .with_name("demo reads");

    // Plenty of memory: the planner picks filter-gated counting
    let relaxed = PipelineConfig::new(6, 5);
    show("Relaxed budget", &count_most_frequent(&source, &relaxed)?);

    // Same corpus, recounted so the filtered counts are exact
    let recounted = PipelineConfig {
        recount: true,
        ..PipelineConfig::new(6, 5)
    };
    show("Relaxed budget, recount", &count_most_frequent(&source, &recounted)?);

    // A few kilobits of memory: exact partitioned counting
    let tight = PipelineConfig {
        budget: Budget::new(1 << 20, 20_000),
        backing: PartitionBacking::Disk,
        ..PipelineConfig::new(6, 5)
    };
    show("Tight memory", &count_most_frequent(&source, &tight)?);

    let forced = PipelineConfig {
        strategy_override: Some(Strategy::Partitioned),
        backing: PartitionBacking::Memory,
        parallel: true,
        ..PipelineConfig::new(6, 5)
    };
    show("Forced partitioned, in memory", &count_most_frequent(&source, &forced)?);

    Ok(())
}

fn show(title: &str, report: &PipelineReport) {
    println!("{}", title);
    println!("{}", "-".repeat(title.len()));
    println!(
        "plan: {} ({} iterations x {} partitions, filter capacity {})",
        report.plan.strategy, report.plan.iterations, report.plan.partitions, report.plan.filter_capacity
    );
    println!("ran:  {}", report.strategy);
    for entry in &report.entries {
        println!("  {}", entry);
    }
    println!();
}
