use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

mod config;
mod count;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError};
use kfreq_core::{PartitionBacking, PipelineReport, Strategy};

#[derive(Parser, Debug)]
#[command(name = "kfreq")]
#[command(about = "kfreq - Most frequent k-mers in FASTA/FASTQ files")]
#[command(version)]
#[command(long_about = "
kfreq reports the n most frequent k-mers of a sequence file within a disk and
memory budget. It picks exact partitioned counting when the distinct k-mers
cannot fit in memory and filter-gated counting otherwise.

Examples:
  kfreq -f reads.fastq -k 21 -n 25
  kfreq -f reads.fastq.gz -k 31 -n 10 -m 2 -d 20 --strategy partitioned
  kfreq -f reads.fastq -k 21 -n 5 --json
  kfreq --print-config > kfreq.toml
")]
pub struct Cli {
    /// FASTA/FASTQ file to be processed (.gz accepted)
    #[arg(short = 'f', long = "file-name", required_unless_present = "print_config")]
    pub file: Option<PathBuf>,

    /// Length of k-mers
    #[arg(short = 'k', long = "kmer-size", value_parser = check_positive::<usize>, required_unless_present = "print_config")]
    pub k: Option<usize>,

    /// Number of most frequent k-mers to output
    #[arg(short = 'n', long = "most-frequent", value_parser = check_positive::<usize>, required_unless_present = "print_config")]
    pub n: Option<usize>,

    /// Membership filter error rate, in [0, 1)
    #[arg(short = 'e', long = "error-rate", value_parser = check_between_zero_one)]
    pub error_rate: Option<f64>,

    /// Target disk space in GB
    #[arg(short = 'd', long = "target-disk", value_parser = check_positive::<u64>)]
    pub target_disk: Option<u64>,

    /// Target memory in GB
    #[arg(short = 'm', long = "target-memory", value_parser = check_positive::<u64>)]
    pub target_memory: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Counting strategy; auto follows the capacity plan
    #[arg(long, value_enum, default_value = "auto")]
    pub strategy: StrategyChoice,

    /// Where partitioned passes keep routed k-mers. Memory holds a whole pass
    /// at once, so planned partitions become extra passes over the input
    #[arg(long, value_enum)]
    pub backing: Option<BackingChoice>,

    /// Parent directory for spill files
    #[arg(long)]
    pub spill_dir: Option<PathBuf>,

    /// Count the partitions of a pass in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Re-scan to report exact counts with the filtered strategy
    #[arg(long)]
    pub recount: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print the default configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyChoice {
    Auto,
    Partitioned,
    Filtered,
}

impl StrategyChoice {
    pub fn strategy(self) -> Option<Strategy> {
        match self {
            StrategyChoice::Auto => None,
            StrategyChoice::Partitioned => Some(Strategy::Partitioned),
            StrategyChoice::Filtered => Some(Strategy::Filtered),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackingChoice {
    Disk,
    Memory,
}

impl From<BackingChoice> for PartitionBacking {
    fn from(choice: BackingChoice) -> Self {
        match choice {
            BackingChoice::Disk => PartitionBacking::Disk,
            BackingChoice::Memory => PartitionBacking::Memory,
        }
    }
}

fn check_positive<T>(value: &str) -> Result<T, String>
where
    T: FromStr + PartialEq + Default,
{
    let parsed: T = value
        .parse()
        .map_err(|_| format!("{} is not a positive integer", value))?;
    if parsed == T::default() {
        return Err(format!("{} is an invalid positive integer value", value));
    }
    Ok(parsed)
}

fn check_between_zero_one(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("{} is not a floating point number", value))?;
    if (0.0..1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("{} should be between 0 and 1", value))
    }
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn print_report(report: &PipelineReport) {
    for entry in &report.entries {
        println!("{}", entry);
    }
    println!("Duration: {:.2} seconds", report.elapsed.as_secs_f64());
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if cli.print_config {
        print!("{}", Config::example_toml()?);
        return Ok(());
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => print_error_and_exit(&CliError::config(format!("{:#}", err))),
    };

    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }

    let report = match count::execute(&cli, &config) {
        Ok(report) => report,
        Err(err) => print_error_and_exit(&err),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    } else {
        print_report(&report);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_integers() {
        assert_eq!(check_positive::<usize>("21"), Ok(21));
        assert!(check_positive::<usize>("0").is_err());
        assert!(check_positive::<usize>("-3").is_err());
        assert!(check_positive::<u64>("abc").is_err());
    }

    #[test]
    fn test_rate_range() {
        assert_eq!(check_between_zero_one("0"), Ok(0.0));
        assert_eq!(check_between_zero_one("0.25"), Ok(0.25));
        assert!(check_between_zero_one("1").is_err());
        assert!(check_between_zero_one("-0.1").is_err());
        assert!(check_between_zero_one("often").is_err());
    }

    #[test]
    fn test_required_arguments() {
        assert!(Cli::try_parse_from(["kfreq", "-f", "reads.fq", "-k", "21"]).is_err());
        assert!(Cli::try_parse_from(["kfreq", "-f", "reads.fq", "-k", "0", "-n", "5"]).is_err());
        assert!(Cli::try_parse_from(["kfreq", "--print-config"]).is_ok());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "kfreq", "-f", "reads.fq", "-k", "21", "-n", "5", "-e", "0.001", "-d", "20", "-m", "2", "-v",
        ])
        .unwrap();
        assert_eq!(cli.k, Some(21));
        assert_eq!(cli.n, Some(5));
        assert_eq!(cli.error_rate, Some(0.001));
        assert_eq!(cli.target_disk, Some(20));
        assert_eq!(cli.target_memory, Some(2));
        assert!(cli.verbose);
        assert_eq!(cli.strategy, StrategyChoice::Auto);
    }
}
