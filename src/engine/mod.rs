//! Core engine: the round controller plus the bookkeeping around it.

pub mod lottery;
pub mod accountant;
pub mod keeper;

use crate::funding::NativeVault;
use crate::ledger::CreditToken;

pub use lottery::{Lottery, LotterySettings, LotteryState, LotteryStatus};

/// The controller wired to the in-memory collaborators, as hosted by the
/// service binary.
pub type LotteryService = Lottery<CreditToken, NativeVault>;
