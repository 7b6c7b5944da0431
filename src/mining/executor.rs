//! Mining executors - Backend implementations for the nonce search

use crate::block::Block;
use crate::target::Target;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Hash computations granted per unit of intensity
pub const NONCE_BUDGET_SCALE: f64 = 1000.0;

/// Nonce increments allowed for a given intensity: `floor(1000 * intensity)`
pub fn nonce_budget(intensity: f64) -> u64 {
    if !intensity.is_finite() || intensity <= 0.0 {
        return 0;
    }
    (NONCE_BUDGET_SCALE * intensity).floor() as u64
}

/// Outcome of one bounded search
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOutcome {
    pub mined: bool,
    /// Hash computations performed, never more than the budget
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Trait for nonce search backends
pub trait MinerExecutor: Send + Sync {
    /// Increment the block's nonce up to `budget` times, stopping on the first
    /// hash accepted by `target`.
    fn search(
        &self,
        block: &mut Block,
        target: &Target,
        budget: u64,
        cancel: &AtomicBool,
    ) -> SearchOutcome;
}

/// Single-threaded CPU executor
#[derive(Clone, Copy, Debug)]
pub struct CpuExecutor;

impl CpuExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MinerExecutor for CpuExecutor {
    fn search(
        &self,
        block: &mut Block,
        target: &Target,
        budget: u64,
        cancel: &AtomicBool,
    ) -> SearchOutcome {
        let start = Instant::now();
        let mut attempts = 0u64;

        while attempts < budget {
            // Cheap enough to poll every 64 hashes
            if attempts % 64 == 0 && cancel.load(Ordering::Relaxed) {
                break;
            }

            block.increment_nonce();
            attempts += 1;

            if target.matches(block.hash()) {
                return SearchOutcome {
                    mined: true,
                    attempts,
                    elapsed: start.elapsed(),
                };
            }
        }

        SearchOutcome {
            mined: false,
            attempts,
            elapsed: start.elapsed(),
        }
    }
}
