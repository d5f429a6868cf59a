//! Layered configuration loading.
//!
//! A config file is read as a sparse layer: only the keys it spells out take
//! effect. Layers are folded over the defaults in order
//!
//! 1. global `~/.basket-pairs/config.toml`
//! 2. local `.basket-pairs/config.toml` under the working directory
//! 3. command-line overrides
//!
//! so a later layer wins for every key it sets, even when it sets a key back
//! to its default value. Unknown keys are rejected.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{Approach, BasketConfig, ConfigOverrides};

const CONFIG_DIR: &str = ".basket-pairs";
const CONFIG_FILE: &str = "config.toml";

/// Keys set by one config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Layer {
    aggregation: AggregationLayer,
    storage: StorageLayer,
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AggregationLayer {
    cache_capacity: Option<usize>,
    row_bytes: Option<u64>,
    approach: Option<Approach>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StorageLayer {
    work_dir: Option<PathBuf>,
    max_open_shards: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingLayer {
    level: Option<String>,
}

impl From<Layer> for ConfigOverrides {
    fn from(layer: Layer) -> Self {
        ConfigOverrides {
            cache_capacity: layer.aggregation.cache_capacity,
            row_bytes: layer.aggregation.row_bytes,
            approach: layer.aggregation.approach,
            work_dir: layer.storage.work_dir,
            max_open_shards: layer.storage.max_open_shards,
            log_level: layer.logging.level,
        }
    }
}

/// Resolves config file locations and folds them into a [`BasketConfig`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader whose global config lives in `~/.basket-pairs`.
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|home| home.join(CONFIG_DIR)),
        }
    }

    /// Loader with the global config directory at `dir` (for tests).
    pub fn with_global_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(dir.into()),
        }
    }

    /// Global config file, if a home directory is known.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Local config file under `base_dir`.
    pub fn local_config_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Fold defaults, the global file, the local file under `base_dir`, and
    /// `overrides`.
    pub fn load(
        &self,
        base_dir: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<BasketConfig, ConfigError> {
        let mut config = BasketConfig::default();

        let files = self
            .global_config_path()
            .into_iter()
            .chain(std::iter::once(self.local_config_path(base_dir)));
        for path in files {
            if let Some(layer) = read_layer(&path)? {
                config.apply_overrides(&layer.into());
            }
        }

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Fold defaults, exactly one file at `path`, and `overrides`.
    ///
    /// Unlike [`ConfigLoader::load`], a missing file is an error.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<BasketConfig, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;
        let mut config = BasketConfig::default();
        config.apply_overrides(&parse_layer(&text, path)?.into());
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Create the global config file with defaults unless it exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let path = self.global_config_path().ok_or(ConfigError::NoHomeDir)?;
        init_file(path)
    }

    /// Create the local config file with defaults unless it exists.
    pub fn init_local(&self, base_dir: &Path) -> Result<PathBuf, ConfigError> {
        init_file(self.local_config_path(base_dir))
    }
}

fn read_layer(path: &Path) -> Result<Option<Layer>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            trace!("No config at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::io("read", path, e)),
    };
    debug!("Loading config from {}", path.display());
    parse_layer(&text, path).map(Some)
}

fn parse_layer(text: &str, path: &Path) -> Result<Layer, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn init_file(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        write_config(&path, &BasketConfig::default())?;
    }
    Ok(path)
}

fn write_config(path: &Path, config: &BasketConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::io("create", dir, e))?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|e| ConfigError::io("write", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_CACHE_CAPACITY, DEFAULT_ROW_BYTES};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        loader: ConfigLoader,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let loader = ConfigLoader::with_global_dir(temp.path().join("home").join(CONFIG_DIR));
            Self { temp, loader }
        }

        fn base(&self) -> &Path {
            self.temp.path()
        }

        fn write(&self, path: PathBuf, text: &str) -> PathBuf {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, text).unwrap();
            path
        }

        fn write_global(&self, text: &str) -> PathBuf {
            self.write(self.loader.global_config_path().unwrap(), text)
        }

        fn write_local(&self, text: &str) -> PathBuf {
            self.write(self.loader.local_config_path(self.base()), text)
        }

        fn load(&self, overrides: Option<&ConfigOverrides>) -> BasketConfig {
            self.loader.load(self.base(), overrides).unwrap()
        }
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let fx = Fixture::new();
        assert_eq!(fx.load(None), BasketConfig::default());
    }

    #[test]
    fn test_local_file_sets_only_its_keys() {
        let fx = Fixture::new();
        fx.write_local("[aggregation]\ncache_capacity = 500\n\n[storage]\nwork_dir = \"spill\"\n");

        let config = fx.load(None);
        assert_eq!(config.aggregation.cache_capacity, 500);
        assert_eq!(config.storage.work_dir, PathBuf::from("spill"));
        assert_eq!(config.aggregation.row_bytes, DEFAULT_ROW_BYTES);
    }

    #[test]
    fn test_local_wins_over_global() {
        let fx = Fixture::new();
        fx.write_global(
            "[logging]\nlevel = \"debug\"\n\n[aggregation]\ncache_capacity = 2000\napproach = \"baseline\"\n",
        );
        fx.write_local("[aggregation]\ncache_capacity = 300\n");

        let config = fx.load(None);
        assert_eq!(config.aggregation.cache_capacity, 300);
        assert_eq!(config.aggregation.approach, Approach::Baseline);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_explicit_default_value_still_overrides() {
        let fx = Fixture::new();
        fx.write_global("[aggregation]\ncache_capacity = 2000\napproach = \"baseline\"\n");
        fx.write_local(&format!(
            "[aggregation]\ncache_capacity = {}\napproach = \"task\"\n",
            DEFAULT_CACHE_CAPACITY
        ));

        let config = fx.load(None);
        assert_eq!(config.aggregation.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.aggregation.approach, Approach::Task);
    }

    #[test]
    fn test_overrides_win_over_files() {
        let fx = Fixture::new();
        fx.write_local("[aggregation]\ncache_capacity = 300\n");

        let overrides = ConfigOverrides {
            cache_capacity: Some(7),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        let config = fx.load(Some(&overrides));
        assert_eq!(config.aggregation.cache_capacity, 7);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_load_file_ignores_global_and_local() {
        let fx = Fixture::new();
        fx.write_global("[logging]\nlevel = \"debug\"\n");
        fx.write_local("[aggregation]\ncache_capacity = 300\n");
        let path = fx.write(fx.base().join("custom.toml"), "[storage]\nmax_open_shards = 8\n");

        let config = fx.loader.load_file(&path, None).unwrap();
        assert_eq!(config.storage.max_open_shards, 8);
        assert_eq!(config.aggregation.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.logging.level, "info");

        let missing = fx.loader.load_file(&fx.base().join("nope.toml"), None);
        assert!(matches!(missing, Err(ConfigError::Io { action: "read", .. })));
    }

    #[test]
    fn test_bad_files_name_the_path() {
        let fx = Fixture::new();
        let path = fx.write_local("[aggregation\n");
        let err = fx.loader.load(fx.base(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));

        fx.write_local("[aggregation]\ncache_size = 5\n");
        let err = fx.loader.load(fx.base(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_init_writes_defaults_once() {
        let fx = Fixture::new();
        let path = fx.loader.init_local(fx.base()).unwrap();
        assert!(path.ends_with(".basket-pairs/config.toml"));

        let text = std::fs::read_to_string(&path).unwrap();
        let written: BasketConfig = toml::from_str(&text).unwrap();
        assert_eq!(written, BasketConfig::default());

        fx.write_local("[logging]\nlevel = \"warn\"\n");
        assert_eq!(fx.loader.init_local(fx.base()).unwrap(), path);
        assert_eq!(fx.load(None).logging.level, "warn");
    }

    #[test]
    fn test_init_global() {
        let fx = Fixture::new();
        let path = fx.loader.init_global().unwrap();
        assert_eq!(path, fx.loader.global_config_path().unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_init_global_without_home() {
        let loader = ConfigLoader { global_dir: None };
        assert!(loader.global_config_path().is_none());
        assert!(matches!(loader.init_global(), Err(ConfigError::NoHomeDir)));
    }
}
