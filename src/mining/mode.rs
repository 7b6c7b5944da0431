//! Chaining modes - Define which hash a new simulated block links to

use crate::block::GENESIS_HASH;
use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the training environment picks a new block's previous hash.
///
/// Live mining always chains to the last mined block. The environment defaults
/// to `Genesis`, where every simulated block links to the genesis hash no
/// matter how many blocks were mined before it. `Strict` makes the
/// environment chain the same way live mining does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainMode {
    #[default]
    Genesis,
    Strict,
}

impl ChainMode {
    /// Previous hash for the next block given the ledger the block will land in
    pub fn previous_hash<'a>(&self, ledger: &'a Ledger) -> &'a str {
        match self {
            ChainMode::Genesis => GENESIS_HASH,
            ChainMode::Strict => ledger.tip_hash(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChainMode::Genesis => "always-genesis",
            ChainMode::Strict => "strict",
        }
    }
}

impl fmt::Display for ChainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for ChainMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "genesis" | "always-genesis" => Ok(ChainMode::Genesis),
            "strict" => Ok(ChainMode::Strict),
            other => Err(format!("unknown chain mode '{other}' (expected genesis or strict)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;

    #[test]
    fn test_genesis_mode_ignores_ledger() {
        let mut ledger = Ledger::new();
        ledger.record(Block::new(1, GENESIS_HASH, "a", "T0"), 0.0);
        assert_eq!(ChainMode::Genesis.previous_hash(&ledger), GENESIS_HASH);
    }

    #[test]
    fn test_strict_mode_follows_tip() {
        let mut ledger = Ledger::new();
        assert_eq!(ChainMode::Strict.previous_hash(&ledger), GENESIS_HASH);

        let block = Block::new(1, GENESIS_HASH, "a", "T0");
        let hash = block.hash().to_string();
        ledger.record(block, 0.0);
        assert_eq!(ChainMode::Strict.previous_hash(&ledger), hash);
    }

    #[test]
    fn test_parse() {
        assert_eq!("strict".parse::<ChainMode>(), Ok(ChainMode::Strict));
        assert_eq!("Genesis".parse::<ChainMode>(), Ok(ChainMode::Genesis));
        assert!("sideways".parse::<ChainMode>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ChainMode::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
    }
}
