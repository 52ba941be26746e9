use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read seen-set {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seen-set {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write seen-set {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize seen-set: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures that end a run. Dispatch failures are not here: they are
/// recorded in the run report and never abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("listing acquisition failed: {0:#}")]
    Acquisition(anyhow::Error),

    #[error("listing acquisition timed out after {minutes} minute(s)")]
    Timeout { minutes: u64 },

    #[error("could not load seen-set: {0}")]
    Load(#[source] StoreError),

    #[error("could not persist seen-set: {0}")]
    Persistence(#[source] StoreError),
}
