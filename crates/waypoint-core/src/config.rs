//! Store configuration.
//!
//! Defaults are usable as-is; `from_env` lets a host process override them
//! without a config file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const ROOT_ENV: &str = "WAYPOINT_ROOT";
pub const BATCH_SIZE_ENV: &str = "WAYPOINT_BATCH_SIZE";

/// Batch size used when neither the caller nor the workflow sets one.
pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Storage root directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from(".waypoint")
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_batch_size: default_batch_size(),
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `WAYPOINT_ROOT` / `WAYPOINT_BATCH_SIZE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ROOT_ENV).filter(|v| !v.trim().is_empty()) {
            config.root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(BATCH_SIZE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.default_batch_size = size,
                _ => tracing::warn!(value = %raw, "ignoring invalid {BATCH_SIZE_ENV}"),
            }
        }
        config
    }
}
