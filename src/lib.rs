//! Matchbook Backend Library
//!
//! Peer-to-peer wager lifecycle and settlement engine: proposing a wager,
//! matching it with atomic fund reservation, oracle-driven settlement with
//! commission, and the human dispute override that can never race with
//! automatic settlement.
//!
//! Exposes the core modules for use by the binary and integration tests.

pub mod adapters;
pub mod api;
pub mod compliance;
pub mod engine;
pub mod errors;
pub mod models;
pub mod store;
