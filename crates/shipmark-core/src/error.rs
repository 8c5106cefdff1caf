//! Error types for shipmark-core

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A configuration file is already present where one would be written.
    #[error("configuration file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(Utf8PathBuf),

    /// Serializing the configuration failed.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Writing the configuration file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination file.
        path: Utf8PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
