//! Weak winner-selection entropy.
//!
//! The lottery deliberately picks winners from a value anyone can predict:
//! a SHA-256 hash chain over the ledger's own committed history, mixed with
//! the close timestamp. Whoever chooses when to call close, or can observe
//! the history, can steer or foresee the result. A hardened variant would
//! implement `EntropySource` with a verifiable source under its own name.

use sha2::{Digest, Sha256};

use crate::types::Timestamp;

const GENESIS_SEED: &str = "LOTTERY_LEDGER_HISTORY_GENESIS";

/// State visible to the entropy source when a round closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropySeed {
    /// Hex digest of the history chain at close time.
    pub history_digest: String,
    pub closed_at: Timestamp,
    pub slot_count: usize,
}

/// Supplies the value a round's winner index is derived from.
#[cfg_attr(test, mockall::automock)]
pub trait EntropySource: Send {
    fn weak_random(&self, seed: &EntropySeed) -> u64;

    /// Identifier for logs.
    fn name(&self) -> &'static str;
}

/// Hash of the empty history.
pub fn genesis_digest() -> String {
    let mut hasher = Sha256::new();
    hasher.update(GENESIS_SEED.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Mix one committed event into the history chain.
pub fn roll_history(digest: &str, event: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(digest.as_bytes());
    hasher.update(event.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Production source: the "recent history hash" of the ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecentHistoryEntropy;

impl EntropySource for RecentHistoryEntropy {
    fn weak_random(&self, seed: &EntropySeed) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(seed.history_digest.as_bytes());
        hasher.update(seed.closed_at.to_be_bytes());
        hasher.update((seed.slot_count as u64).to_be_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash[..8]);
        u64::from_be_bytes(head)
    }

    fn name(&self) -> &'static str {
        "recent-history"
    }
}

/// Always returns the same value. Makes winner selection reproducible in tests
/// and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u64);

impl EntropySource for FixedEntropy {
    fn weak_random(&self, _seed: &EntropySeed) -> u64 {
        self.0
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
