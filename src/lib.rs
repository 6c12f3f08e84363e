//! LOTTERY: round-based lottery ledger.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod clock;
pub mod entropy;
pub mod ledger;
pub mod funding;
pub mod engine;
pub mod storage;
pub mod api;
