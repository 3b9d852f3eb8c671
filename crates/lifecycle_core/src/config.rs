//! Runtime configuration for lifecycle operations.
//!
//! # Invariants
//! - A validated config always has a positive batch size and a non-empty
//!   tombstone email domain.
//! - Missing JSON fields fall back to defaults.

use crate::logging::{default_log_level, normalize_level};
use crate::model::account::DEFAULT_DELETED_EMAIL_DOMAIN;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Page size for destructive iteration over potentially large result sets.
pub const DEFAULT_DELETION_BATCH_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Rows fetched per page when destroying inbound edges and visibility grants.
    pub deletion_batch_size: u32,
    /// Domain of the placeholder email written over closed accounts.
    pub deleted_email_domain: String,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            deletion_batch_size: DEFAULT_DELETION_BATCH_SIZE,
            deleted_email_domain: DEFAULT_DELETED_EMAIL_DOMAIN.to_string(),
            log_level: default_log_level().to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deletion_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.deletion_batch_size));
        }
        if self.deleted_email_domain.trim().is_empty() {
            return Err(ConfigError::EmptyEmailDomain);
        }
        normalize_level(&self.log_level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidBatchSize(u32),
    EmptyEmailDomain,
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid lifecycle config: {err}"),
            Self::InvalidBatchSize(value) => {
                write!(f, "deletion_batch_size must be positive, got {value}")
            }
            Self::EmptyEmailDomain => write!(f, "deleted_email_domain cannot be empty"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
