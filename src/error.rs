//! Error types for the miner

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the mining library
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Invalid intensity: {0} (must be within 0.0..=1.0)")]
    InvalidIntensity(f64),

    #[error("Invalid pool choice: {0} (must be 0, 1 or 2)")]
    InvalidPool(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config from {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigSource,
    },

    #[error("Mining is already running")]
    AlreadyRunning,

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Underlying cause of a config loading failure
#[derive(Debug, Error)]
pub enum ConfigSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MinerError>;
