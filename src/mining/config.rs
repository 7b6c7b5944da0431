//! Mining configuration

use crate::error::{MinerError, Result};
use crate::mining::mode::ChainMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration shared by the environment, agent and controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Number of evaluation threads (0 = auto-detect)
    pub threads: usize,
    /// Steps per training episode
    pub horizon: u32,
    /// Leading zero characters required by live mining
    pub controller_difficulty: usize,
    /// Chaining behaviour of the training environment
    pub chain_mode: ChainMode,
    /// Keep the environment's difficulty walk inside its nominal bounds
    pub clamp_difficulty: bool,
    /// Environment interactions run before live mining starts
    pub train_timesteps: u64,
    pub learning_rate: f64,
    /// Discount factor for returns
    pub gamma: f64,
    /// Seed for the environment and policy RNGs (random when unset)
    pub seed: Option<u64>,
    /// Use the policy mode instead of sampling when proposing parameters
    pub deterministic_inference: bool,
    /// Pause between live mining rounds
    pub round_interval_ms: u64,
    /// How often the monitor reports status
    pub monitor_interval_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            horizon: 100,
            controller_difficulty: 4,
            chain_mode: ChainMode::Genesis,
            clamp_difficulty: false,
            train_timesteps: 2_000,
            learning_rate: 0.01,
            gamma: 0.99,
            seed: None,
            deterministic_inference: false,
            round_interval_ms: 1_000,
            monitor_interval_ms: 5_000,
        }
    }
}

impl MinerConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MinerError::Config {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| MinerError::Config {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_chain_mode(mut self, mode: ChainMode) -> Self {
        self.chain_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(MinerError::InvalidConfig("horizon must be positive".into()));
        }
        if self.monitor_interval_ms == 0 {
            return Err(MinerError::InvalidConfig(
                "monitor_interval_ms must be positive".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MinerError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(MinerError::InvalidConfig(format!(
                "gamma must be within 0.0..=1.0, got {}",
                self.gamma
            )));
        }
        if self.controller_difficulty > crate::target::MAX_LEADING {
            return Err(MinerError::InvalidConfig(format!(
                "controller_difficulty {} exceeds {}",
                self.controller_difficulty,
                crate::target::MAX_LEADING
            )));
        }
        Ok(())
    }

    /// Resolved worker thread count
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.horizon, 100);
        assert_eq!(config.chain_mode, ChainMode::Genesis);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chain_mode": "strict", "seed": 7}}"#).unwrap();

        let config = MinerConfig::load(file.path()).unwrap();
        assert_eq!(config.chain_mode, ChainMode::Strict);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.horizon, MinerConfig::default().horizon);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            MinerConfig::load(file.path()),
            Err(MinerError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let result = MinerConfig::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(MinerError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MinerConfig {
            horizon: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MinerConfig {
            gamma: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MinerConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MinerConfig {
            monitor_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MinerError::InvalidConfig(_))
        ));
    }
}
