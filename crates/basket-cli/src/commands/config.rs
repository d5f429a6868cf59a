//! `config` command: inspect and create basket-pairs configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use basket_config::ConfigLoader;
use clap::Subcommand;
use serde::Serialize;

use super::{base_dir, load_config, print_info};
use crate::GlobalOptions;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration after all layers are merged
    Show(FormatArgs),

    /// Write a config file with default values, keeping an existing one
    Init {
        /// Create ~/.basket-pairs/config.toml instead of the local file
        #[arg(long)]
        global: bool,
    },

    /// Print where config files are looked up
    Path(FormatArgs),
}

/// Output format selection shared by read-only subcommands
#[derive(clap::Args, Debug)]
pub struct FormatArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// One config file location
#[derive(Debug, Serialize)]
struct ConfigFile {
    path: PathBuf,
    exists: bool,
}

impl ConfigFile {
    fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            exists: path.is_file(),
        }
    }
}

/// Lookup locations in merge order
#[derive(Debug, Serialize)]
struct ConfigLocations {
    global: Option<ConfigFile>,
    local: ConfigFile,
    /// Set when `--config` replaces the lookup
    explicit: Option<ConfigFile>,
}

pub fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(format) => show(format, &global),
        ConfigCommand::Init { global: in_home } => init(in_home, &global),
        ConfigCommand::Path(format) => locations(format, &global),
    }
}

fn show(format: FormatArgs, global: &GlobalOptions) -> Result<()> {
    let config = load_config(global, None)?;
    let rendered = if format.json {
        serde_json::to_string_pretty(&config)? + "\n"
    } else {
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    };
    print!("{}", rendered);
    Ok(())
}

fn init(in_home: bool, global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if in_home {
        loader.init_global()
    } else {
        loader.init_local(&base_dir()?)
    }
    .context("Failed to create config file")?;

    print_info(&format!("Config file: {}", path.display()), global.quiet);
    Ok(())
}

fn locations(format: FormatArgs, global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let found = ConfigLocations {
        global: loader.global_config_path().as_deref().map(ConfigFile::at),
        local: ConfigFile::at(&loader.local_config_path(&base_dir()?)),
        explicit: global.config.as_deref().map(ConfigFile::at),
    };

    if format.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    match found.global {
        Some(ref file) => println!("global:   {}", describe(file)),
        None => println!("global:   unavailable (no home directory)"),
    }
    println!("local:    {}", describe(&found.local));
    if let Some(ref file) = found.explicit {
        println!("explicit: {} (global and local are skipped)", describe(file));
    }
    Ok(())
}

fn describe(file: &ConfigFile) -> String {
    let state = if file.exists { "found" } else { "missing" };
    format!("{} [{}]", file.path.display(), state)
}
