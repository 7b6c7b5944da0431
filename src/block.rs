//! Block model used by both the training environment and live mining.

use sha2::{Digest, Sha256};

/// Previous hash used by the first block of a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A unit of simulated work.
///
/// The stored hash always equals the digest of the current fields: every
/// mutator re-hashes before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    index: u64,
    previous_hash: String,
    transactions: String,
    timestamp: String,
    nonce: u64,
    hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        transactions: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            previous_hash: previous_hash.into(),
            transactions: transactions.into(),
            timestamp: timestamp.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.recompute_hash();
        block
    }

    /// Build a block stamped with the current UTC time
    pub fn now(index: u64, previous_hash: impl Into<String>, transactions: impl Into<String>) -> Self {
        Self::new(
            index,
            previous_hash,
            transactions,
            chrono::Utc::now().to_rfc3339(),
        )
    }

    /// Digest of (index, previous_hash, transactions, nonce, timestamp) as lowercase hex
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.transactions.as_bytes());
        hasher.update(self.nonce.to_string().as_bytes());
        hasher.update(self.timestamp.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn recompute_hash(&mut self) {
        self.hash = self.compute_hash();
    }

    #[inline]
    pub fn increment_nonce(&mut self) {
        self.nonce = self.nonce.wrapping_add(1);
        self.recompute_hash();
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.recompute_hash();
    }

    pub fn is_hash_valid(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &str {
        &self.transactions
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}
