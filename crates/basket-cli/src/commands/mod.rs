//! CLI command implementations
//!
//! This module contains all basket-pairs command implementations.

pub mod config;
pub mod count;

use std::path::PathBuf;

use anyhow::{Context, Result};
use basket_config::{BasketConfig, ConfigLoader, ConfigOverrides};

use crate::GlobalOptions;

/// Directory that relative config paths and the local config resolve against.
pub fn base_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration with optional config file override.
pub fn load_config(
    global: &GlobalOptions,
    overrides: Option<&ConfigOverrides>,
) -> Result<BasketConfig> {
    let loader = ConfigLoader::new();

    // An explicit file replaces the global -> local merge
    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path, overrides)
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    loader
        .load(&base_dir()?, overrides)
        .context("Failed to load configuration")
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
