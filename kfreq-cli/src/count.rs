//! Count command implementation - most frequent k-mers of one file

use kfreq_core::{count_most_frequent, Budget, FastxSource, PipelineConfig, PipelineReport};
use std::path::Path;

use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::Cli;

/// Merge the config file and command line into pipeline settings; flags win.
pub fn pipeline_config(cli: &Cli, config: &Config) -> CliResult<PipelineConfig> {
    let k = cli.k.ok_or_else(|| CliError::validation("--kmer-size is required"))?;
    let n = cli.n.ok_or_else(|| CliError::validation("--most-frequent is required"))?;

    let disk_gb = cli.target_disk.unwrap_or(config.budget.target_disk_gb);
    let memory_gb = cli.target_memory.unwrap_or(config.budget.target_memory_gb);

    let mut pipeline = PipelineConfig::new(k, n);
    pipeline.budget = Budget::from_gib(disk_gb, memory_gb);
    pipeline.false_positive_rate = cli.error_rate.unwrap_or(config.filter.error_rate);
    pipeline.strategy_override = cli.strategy.strategy();
    pipeline.backing = cli.backing.map(Into::into).unwrap_or(config.partition.backing);
    pipeline.spill_dir = cli.spill_dir.clone().or_else(|| config.partition.spill_dir.clone());
    pipeline.parallel = cli.parallel || config.partition.parallel;
    pipeline.singleton_filter = config.partition.singleton_filter;
    pipeline.recount = cli.recount || config.filter.recount;
    Ok(pipeline)
}

pub fn execute(cli: &Cli, config: &Config) -> CliResult<PipelineReport> {
    let file = cli
        .file
        .as_deref()
        .ok_or_else(|| CliError::validation("--file-name is required"))?;
    let pipeline = pipeline_config(cli, config)?;

    log::info!("Counting {}-mers in {}", pipeline.k, file.display());
    if let Some(dir) = &pipeline.spill_dir {
        log::info!("Spill directory: {}", dir.display());
    }

    run_file(file, &pipeline)
}

fn run_file(file: &Path, pipeline: &PipelineConfig) -> CliResult<PipelineReport> {
    let source = FastxSource::new(file).map_err(|err| CliError::from_count(file, err))?;
    count_most_frequent(&source, pipeline).map_err(|err| CliError::from_count(file, err))
}
