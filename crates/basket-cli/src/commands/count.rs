//! Count command - Count product pairs across baskets
//!
//! Runs either the sharded external-memory pipeline (`task`) or the SQLite
//! reference pipeline (`baseline`) and writes the pair table atomically.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use basket_config::{Approach, BasketConfig, ConfigOverrides};
use basket_core::{
    BaselineCounter, BaselineStats, FsShardStore, PairCounter, PairTableWriter, RecordReader,
    RunStats,
};
use serde::Serialize;
use tracing::{debug, info};

use super::{base_dir, load_config, print_info};
use crate::progress::Progress;
use crate::GlobalOptions;

/// Default output table path
const DEFAULT_OUTPUT: &str = "output.csv";

/// Arguments for the count command
#[derive(clap::Args, Debug)]
pub struct CountArgs {
    /// Input file of `basket_id,product_id` records
    pub input: PathBuf,

    /// Output table path
    #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Pairs held in memory at once
    #[arg(long, short = 'c')]
    pub cache_size: Option<usize>,

    /// Estimated bytes per persisted row
    #[arg(long)]
    pub row_bytes: Option<u64>,

    /// Counting pipeline (task, baseline)
    #[arg(long, short = 'a', value_parser = parse_approach)]
    pub approach: Option<Approach>,

    /// Directory for intermediate shard files
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Shard files kept open at once
    #[arg(long)]
    pub max_open_shards: Option<usize>,

    /// Print run statistics as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Parse approach from string
fn parse_approach(s: &str) -> Result<Approach, String> {
    s.parse()
        .map_err(|e: basket_config::ConfigError| e.to_string())
}

impl CountArgs {
    /// Convert command arguments to config overrides
    fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache_capacity: self.cache_size,
            row_bytes: self.row_bytes,
            approach: self.approach,
            work_dir: self.work_dir.clone(),
            max_open_shards: self.max_open_shards,
            ..Default::default()
        }
    }
}

/// Statistics of whichever pipeline ran
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PipelineStats {
    Task(RunStats),
    Baseline(BaselineStats),
}

/// Summary of one count run
#[derive(Debug, Serialize)]
struct CountReport {
    approach: Approach,
    input: PathBuf,
    output: PathBuf,
    rows: u64,
    stats: PipelineStats,
}

/// Execute the count command
pub fn execute(args: CountArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global, Some(&args.to_config_overrides()))?;
    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);

    let quiet = global.quiet || args.json;
    let approach = config.aggregation.approach;
    let progress = Progress::start(
        format!("Counting pairs in {} ({})", args.input.display(), approach),
        quiet,
    );

    let result = match approach {
        Approach::Task => run_task(&args, &config),
        Approach::Baseline => run_baseline(&args, &config),
    };

    let (rows, stats) = match result {
        Ok(done) => done,
        Err(e) => {
            progress.fail("Counting failed");
            return Err(e);
        }
    };
    progress.succeed(format!("Wrote {} pairs to {}", rows, args.output.display()));

    let report = CountReport {
        approach,
        input: args.input,
        output: args.output,
        rows,
        stats,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, global.quiet);
    }

    Ok(())
}

fn run_task(args: &CountArgs, config: &BasketConfig) -> Result<(u64, PipelineStats)> {
    let counter = PairCounter::new(
        config.aggregation.cache_capacity,
        config.aggregation.row_bytes,
    )?;
    let records = open_records(&args.input)?;
    let work_dir = config.work_dir(&base_dir()?);
    let mut store = FsShardStore::create_in(&work_dir, config.storage.max_open_shards)
        .with_context(|| format!("Failed to create shard directory in {}", work_dir.display()))?;
    info!(
        "Counting with cache capacity {}, shard budget {} bytes, shards in {}",
        counter.cache_capacity(),
        counter.split_threshold(),
        store.root().display()
    );

    let mut table = PairTableWriter::create(&args.output)?;
    let stats = counter
        .run(records, &mut store, |key, count| table.write_row(key, count))
        .context("Pair counting failed")?;
    let rows = table.commit()?;

    Ok((rows, PipelineStats::Task(stats)))
}

fn run_baseline(args: &CountArgs, config: &BasketConfig) -> Result<(u64, PipelineStats)> {
    let records = open_records(&args.input)?;
    let work_dir = config.work_dir(&base_dir()?);
    std::fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;
    let db_dir = tempfile::Builder::new()
        .prefix("basket-baseline-")
        .tempdir_in(&work_dir)
        .with_context(|| format!("Failed to create database directory in {}", work_dir.display()))?;

    let counter = BaselineCounter::open(
        &db_dir.path().join("baskets.db"),
        config.aggregation.cache_capacity,
        config.aggregation.row_bytes,
    )?;
    let mut table = PairTableWriter::create(&args.output)?;
    let stats = counter
        .run(records, |key, count| table.write_row(key, count))
        .context("Baseline query failed")?;
    let rows = table.commit()?;

    Ok((rows, PipelineStats::Baseline(stats)))
}

fn open_records(path: &Path) -> Result<RecordReader<std::io::BufReader<std::fs::File>>> {
    RecordReader::open(path).with_context(|| format!("Failed to open input {}", path.display()))
}

fn print_summary(report: &CountReport, quiet: bool) {
    match report.stats {
        PipelineStats::Task(ref stats) => {
            print_info(
                &format!(
                    "{} records, {} baskets, {} pair updates",
                    stats.records, stats.baskets, stats.pair_updates
                ),
                quiet,
            );
            print_info(
                &format!(
                    "Cache hit rate {:.1}%, {} evictions, {} shards ({} split, {} oversized)",
                    stats.cache_hit_rate() * 100.0,
                    stats.cache_evictions,
                    stats.shards_written,
                    stats.shards_split,
                    stats.oversized_shards
                ),
                quiet,
            );
            print_info(&format!("Finished in {} ms", stats.elapsed_ms), quiet);
        }
        PipelineStats::Baseline(ref stats) => {
            print_info(
                &format!(
                    "{} records loaded in {} batches",
                    stats.records, stats.batches
                ),
                quiet,
            );
            print_info(&format!("Finished in {} ms", stats.elapsed_ms), quiet);
        }
    }
}
