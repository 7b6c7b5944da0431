//! Balance bookkeeping for mined blocks.
//!
//! The training environment and the live controller each own a separate
//! `Ledger`; training statistics never leak into live balances.

use crate::block::{Block, GENESIS_HASH};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    blocks_mined: u64,
    balance: f64,
    last_block: Option<Block>,
}

/// Read-only copy of a ledger, cheap to pass between threads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub blocks_mined: u64,
    pub balance: f64,
    pub last_hash: Option<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mined block. Negative or non-finite rewards credit nothing.
    pub fn record(&mut self, block: Block, reward: f64) {
        if reward.is_finite() && reward > 0.0 {
            self.balance += reward;
        }
        self.blocks_mined += 1;
        self.last_block = Some(block);
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.last_block.as_ref()
    }

    /// Hash the next block should chain to
    pub fn tip_hash(&self) -> &str {
        self.last_block
            .as_ref()
            .map(|b| b.hash())
            .unwrap_or(GENESIS_HASH)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            blocks_mined: self.blocks_mined,
            balance: self.balance,
            last_hash: self.last_block.as_ref().map(|b| b.hash().to_string()),
        }
    }
}
