//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file or directory could not be accessed
    #[error("failed to {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML or has unknown keys
    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("could not determine home directory")]
    NoHomeDir,

    /// A setting is out of range
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("unknown approach '{0}' (expected task or baseline)")]
    UnknownApproach(String),
}

impl ConfigError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_action_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::io("write", "/etc/basket-pairs/config.toml", io);
        assert_eq!(
            err.to_string(),
            "failed to write '/etc/basket-pairs/config.toml': denied"
        );
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::invalid_value("aggregation.row_bytes", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for 'aggregation.row_bytes': must be at least 1"
        );
        assert!(ConfigError::UnknownApproach("magic".into())
            .to_string()
            .contains("'magic'"));
    }
}
