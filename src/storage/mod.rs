//! Persistence layer.
//!
//! Saves and loads the lottery (controller state, credit ledger and native
//! vault) to/from a JSON file. The hosting service writes a snapshot after
//! every mutating request, so a restart resumes from the last committed call.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::engine::{LotteryService, LotteryState};
use crate::entropy::EntropySource;
use crate::funding::NativeVault;
use crate::ledger::CreditToken;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "lottery_state.json";

/// Everything needed to rebuild a `LotteryService`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: LotteryState,
    pub ledger: CreditToken,
    pub vault: NativeVault,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn capture(lottery: &LotteryService) -> Self {
        Self {
            state: lottery.state().clone(),
            ledger: lottery.ledger().clone(),
            vault: lottery.funding().clone(),
            saved_at: Utc::now(),
        }
    }

    /// Rebuild the controller with fresh entropy and clock handles.
    pub fn restore(
        self,
        entropy: Box<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> Result<LotteryService> {
        LotteryService::restore(self.state, self.ledger, self.vault, entropy, clock)
            .context("Saved state failed validation")
    }
}

/// Save a snapshot to a JSON file.
pub fn save_state(snapshot: &Snapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise lottery state")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        prize_pool = snapshot.state.prize_pool,
        owner_pool = snapshot.state.owner_pool,
        "State saved"
    );
    Ok(())
}

/// Load a snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<Snapshot>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let snapshot: Snapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        bets_open = snapshot.state.bets_open,
        slots = snapshot.state.slots.len(),
        rounds_closed = snapshot.state.rounds_closed,
        saved_at = %snapshot.saved_at,
        "State loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
