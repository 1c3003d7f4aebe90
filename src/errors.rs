/// Error types with stable error codes.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, AllocError>;

/// Top-level error type for the allocation simulator.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("[ALLOC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ALLOC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ALLOC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ALLOC-1101] inconsistent dataset: {details}")]
    InvalidDataset { details: String },

    #[error("[ALLOC-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AllocError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ALLOC-1001",
            Self::MissingConfig { .. } => "ALLOC-1002",
            Self::ConfigParse { .. } => "ALLOC-1003",
            Self::InvalidDataset { .. } => "ALLOC-1101",
            Self::Io { .. } => "ALLOC-3002",
        }
    }

    /// Convenience constructor for configuration validation failures.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<toml::de::Error> for AllocError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
