//! basket-pairs: count how many shopping baskets contain each product pair
//!
//! Reads `basket_id,product_id` records and writes one
//! `product_1,product_2,# baskets` row per co-occurring pair, holding only a
//! bounded number of pairs in memory.
//!
//! ```bash
//! basket-pairs count data/data_1.csv -o output.csv --cache-size 10000
//! basket-pairs count data/data_1.csv -o baseline.csv --approach baseline
//! basket-pairs config show
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` takes precedence over `-v`/`-q` and
//! the configured `logging.level`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// External-memory product pair counting
#[derive(Parser, Debug)]
#[command(name = "basket-pairs", author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Options accepted before or after any subcommand
#[derive(Args, Debug, Clone, Default)]
struct GlobalOptions {
    /// Use only this config file (skips global and local config files)
    #[arg(long, global = true, env = "BASKET_PAIRS_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Errors only, no progress spinner
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    /// Level directive from the flags, else the configured level, else info.
    fn log_directive(&self, configured: Option<&str>) -> String {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => configured
                .filter(|level| level.parse::<tracing::Level>().is_ok())
                .unwrap_or("info"),
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        level.to_lowercase()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count how many baskets contain each product pair
    Count(commands::count::CountArgs),

    /// Show, create or locate configuration files
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config errors surface from the command itself; here they only cost
    // the configured log level
    let configured = commands::load_config(&cli.global, None)
        .ok()
        .map(|config| config.logging.level);
    init_logging(&cli.global.log_directive(configured.as_deref()));

    match cli.command {
        Commands::Count(args) => commands::count::execute(args, cli.global),
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(verbose: u8, quiet: bool) -> GlobalOptions {
        GlobalOptions {
            verbose,
            quiet,
            ..Default::default()
        }
    }

    #[test]
    fn test_flags_beat_configured_level() {
        assert_eq!(flags(0, true).log_directive(Some("trace")), "error");
        assert_eq!(flags(1, false).log_directive(Some("warn")), "debug");
        assert_eq!(flags(3, false).log_directive(None), "trace");
        assert_eq!(flags(2, true).log_directive(None), "error");
    }

    #[test]
    fn test_configured_level_used_without_flags() {
        assert_eq!(flags(0, false).log_directive(Some("WARN")), "warn");
        assert_eq!(flags(0, false).log_directive(Some("loud")), "info");
        assert_eq!(flags(0, false).log_directive(None), "info");
    }

    #[test]
    fn test_verbose_counts_occurrences() {
        let cli = Cli::try_parse_from(["basket-pairs", "-vv", "config", "path"]).unwrap();
        assert_eq!(cli.global.verbose, 2);

        let cli = Cli::try_parse_from(["basket-pairs", "config", "show", "-v"]).unwrap();
        assert_eq!(cli.global.verbose, 1);
    }

    #[test]
    fn test_count_arguments_parse() {
        let cli = Cli::try_parse_from([
            "basket-pairs",
            "count",
            "in.csv",
            "-o",
            "out.csv",
            "--cache-size",
            "50",
            "--approach",
            "Baseline",
        ])
        .unwrap();
        let Commands::Count(args) = cli.command else {
            panic!("expected count");
        };
        assert_eq!(args.cache_size, Some(50));
        assert_eq!(args.approach, Some(basket_config::Approach::Baseline));
    }
}
