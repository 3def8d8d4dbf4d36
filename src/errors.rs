use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepriseError {
    #[error("Reprise error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] RepriseExpectedError),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that are expected in normal operation and are presented to the user as a single
/// human-readable line. Everything else is a bug or an environment failure.
#[derive(Error, Debug)]
pub enum RepriseExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("Configuration file not found ({path})")]
    ConfigNotFound { path: PathBuf },
    #[error("Failed to decode configuration file: invalid TOML: {message}")]
    ConfigDecode { message: String },
    #[error("Missing key {key} in configuration file ({path})")]
    MissingConfigKey { key: String, path: PathBuf },
    #[error("Invalid value for {key} in configuration file ({path}): {message}")]
    InvalidConfigValue { key: String, path: PathBuf, message: String },
    #[error("Invalid query in alternative {collection}: {message}")]
    InvalidQuery { collection: String, message: String },
    #[error("Alternative collection '{name}' not found.")]
    CollectionNotFound { name: String },
    #[error("Collection directory is not available ({path})")]
    RootUnavailable { path: PathBuf },
    #[error("Conversion failed for {path}: {message}")]
    Conversion { path: PathBuf, message: String },
    #[error("Failed to write tags to {path}: {message}")]
    TagWrite { path: PathBuf, message: String },
    #[error("Failed to embed artwork into {path}: {message}")]
    ArtEmbed { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, RepriseError>;
