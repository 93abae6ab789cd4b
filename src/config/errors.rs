use std::path::PathBuf;

use thiserror::Error;

/// Errors that may occur while loading or validating trainer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// A required setting is empty.
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    /// The store URL is not an absolute http(s) URL.
    #[error("Invalid store url {url}: {reason}")]
    InvalidUrl {
        /// Offending value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A numeric setting is out of range.
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}
