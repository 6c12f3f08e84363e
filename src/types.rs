//! Shared types for the lottery ledger.
//!
//! These types form the data model used across all modules, so the
//! controller, the collaborators and the HTTP layer can depend on them
//! without circular references.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount of the fungible credit unit.
pub type Credits = u64;

/// Amount of native currency (the unit credits are bought with).
pub type NativeAmount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Opaque account identity. Bet slots hold these by value; they carry no
/// ownership of anything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Round status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Closed,
    Open,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Closed => write!(f, "CLOSED"),
            RoundStatus::Open => write!(f, "OPEN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Round outcome
// ---------------------------------------------------------------------------

/// Result of a successful `close_lottery` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Sequence number of the round that was just closed (1-based).
    pub round: u64,
    /// `None` when the round closed with no bets.
    pub winner: Option<AccountId>,
    /// Slot index the weak random value selected.
    pub winner_index: Option<usize>,
    pub prize: Credits,
    pub slot_count: usize,
    pub closed_at: Timestamp,
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.winner, self.winner_index) {
            (Some(winner), Some(index)) => write!(
                f,
                "Round #{}: winner={} (slot {} of {}) prize={} closed_at={}",
                self.round,
                winner,
                index,
                self.slot_count,
                self.prize,
                format_timestamp(self.closed_at),
            ),
            _ => write!(
                f,
                "Round #{}: no bets, closed_at={}",
                self.round,
                format_timestamp(self.closed_at),
            ),
        }
    }
}

/// Render a unix timestamp as RFC 3339, falling back to the raw number when
/// it is out of chrono's range.
pub fn format_timestamp(ts: Timestamp) -> String {
    match Utc.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => ts.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by every lottery operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotteryError {
    #[error("State error: {0}")]
    State(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Too soon: round closes at {closing_time}, now {now}")]
    TooSoon { closing_time: Timestamp, now: Timestamp },

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[error("Insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: u64, available: u64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl LotteryError {
    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LotteryError::State(_) => "state_error",
            LotteryError::InvalidArgument(_) => "invalid_argument",
            LotteryError::TooSoon { .. } => "too_soon",
            LotteryError::InsufficientBalance { .. } => "insufficient_balance",
            LotteryError::InsufficientAllowance { .. } => "insufficient_allowance",
            LotteryError::Unauthorized(_) => "unauthorized",
            LotteryError::Overflow(_) => "overflow",
        }
    }
}

pub type LotteryResult<T> = Result<T, LotteryError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        let id = AccountId::from("alice");
        assert_eq!(format!("{id}"), "alice");
        assert_eq!(id.as_str(), "alice");
        assert!(!id.is_empty());
        assert!(AccountId::new("  ").is_empty());
    }

    #[test]
    fn test_account_id_serializes_as_string() {
        let json = serde_json::to_string(&AccountId::from("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
        let parsed: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AccountId::from("bob"));
    }

    #[test]
    fn test_round_status_display() {
        assert_eq!(format!("{}", RoundStatus::Open), "OPEN");
        assert_eq!(format!("{}", RoundStatus::Closed), "CLOSED");
    }

    #[test]
    fn test_round_outcome_display() {
        let outcome = RoundOutcome {
            round: 3,
            winner: Some(AccountId::from("carol")),
            winner_index: Some(1),
            prize: 30,
            slot_count: 3,
            closed_at: 0,
        };
        let display = format!("{outcome}");
        assert!(display.contains("#3"));
        assert!(display.contains("carol"));
        assert!(display.contains("prize=30"));

        let empty = RoundOutcome {
            winner: None,
            winner_index: None,
            prize: 0,
            slot_count: 0,
            ..outcome
        };
        assert!(format!("{empty}").contains("no bets"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_lottery_error_display() {
        let e = LotteryError::InsufficientBalance { needed: 11, available: 5 };
        assert_eq!(format!("{e}"), "Insufficient balance: need 11, have 5");
        assert_eq!(e.kind(), "insufficient_balance");

        let e = LotteryError::TooSoon { closing_time: 100, now: 50 };
        assert!(format!("{e}").contains("100"));
        assert_eq!(e.kind(), "too_soon");
    }
}
