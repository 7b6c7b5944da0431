// Core simulation library
pub mod agent;
pub mod block;
pub mod common;
pub mod controller;
pub mod env;
pub mod error;
pub mod ledger;
pub mod mining;
pub mod policy;
pub mod progress;
pub mod target;
pub mod telemetry;

// Re-export for convenience
pub use agent::{Agent, EvaluationReport, TrainingProgress, TrainingReport};
pub use block::{Block, GENESIS_HASH};
pub use controller::{Controller, MiningEvent, MiningRound};
pub use env::{Action, Environment, MiningEnv, Observation, PoolChoice, Step, StepInfo};
pub use error::MinerError;
pub use ledger::{Ledger, LedgerSnapshot};
pub use mining::{ChainMode, CpuExecutor, MinerConfig, MinerExecutor, SearchOutcome};
pub use target::Target;
