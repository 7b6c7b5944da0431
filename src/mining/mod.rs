//! Mining module - Core abstractions for the simulated proof of work
//!
//! This module separates:
//! - Chaining behaviour of simulated blocks via `ChainMode`
//! - The bounded nonce search backend via the `MinerExecutor` trait

pub mod config;
pub mod executor;
pub mod mode;

pub use config::MinerConfig;
pub use executor::{nonce_budget, CpuExecutor, MinerExecutor, SearchOutcome, NONCE_BUDGET_SCALE};
pub use mode::ChainMode;
