//! Wager State Machine and settlement engine
//!
//! A set of stateless operations over the ledger store plus one periodic
//! settlement scan. Every balance-affecting operation runs in one storage
//! transaction with optimistic concurrency; escrow and oracle calls happen
//! strictly after commit.

mod disputes;
pub mod payout;
mod settlement;
mod wagers;

pub use settlement::{settlement_loop, WinnerSide};
pub use wagers::{AcceptOutcome, CreateWagerRequest, FundsOutcome};

use rusqlite::Transaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::adapters::{EscrowAdapter, OracleAdapter};
use crate::errors::{EngineError, EngineResult};
use crate::models::Config;
use crate::store::{self, Store};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub commission_rate_bps: u32,
    pub conflict_retry_attempts: u32,
    pub escrow_retry_attempts: u32,
    pub escrow_backoff_base_ms: u64,
    pub adapter_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate_bps: 500,
            conflict_retry_attempts: 5,
            escrow_retry_attempts: 3,
            escrow_backoff_base_ms: 250,
            adapter_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            commission_rate_bps: config.commission_rate_bps,
            conflict_retry_attempts: config.conflict_retry_attempts,
            escrow_retry_attempts: config.escrow_retry_attempts,
            escrow_backoff_base_ms: config.escrow_backoff_base_ms,
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
        }
    }
}

/// The engine owns no global state: store and adapter handles are injected
/// at construction and shared via `Arc`.
pub struct WagerEngine {
    store: Store,
    escrow: Arc<dyn EscrowAdapter>,
    oracle: Arc<dyn OracleAdapter>,
    config: EngineConfig,
}

impl WagerEngine {
    pub fn new(
        store: Store,
        escrow: Arc<dyn EscrowAdapter>,
        oracle: Arc<dyn OracleAdapter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            escrow,
            oracle,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-run a transactional closure on optimistic-concurrency loss, up to
    /// the configured bound, then surface `Conflict` to the caller.
    pub(crate) async fn with_conflict_retry<T>(
        &self,
        f: impl Fn() -> EngineResult<T>,
    ) -> EngineResult<T> {
        let attempts = self.config.conflict_retry_attempts.max(1);
        for attempt in 0..attempts {
            match f() {
                Err(EngineError::Conflict) if attempt + 1 < attempts => {
                    debug!(attempt = attempt + 1, "Lost optimistic-concurrency race, retrying");
                    sleep(Duration::from_millis(5 * (attempt as u64 + 1))).await;
                }
                other => return other,
            }
        }
        Err(EngineError::Conflict)
    }
}

/// Run `f` once per idempotency key. A replay returns the recorded outcome
/// without re-applying any financial effect; reusing a key across different
/// operations is rejected.
pub(crate) fn idempotent_tx<T>(
    tx: &Transaction<'_>,
    key: &str,
    operation: &str,
    f: impl FnOnce(&Transaction<'_>) -> EngineResult<T>,
) -> EngineResult<T>
where
    T: Serialize + DeserializeOwned,
{
    if key.trim().is_empty() {
        return Err(EngineError::Validation("idempotency key is empty".into()));
    }
    if let Some((recorded_op, json)) = store::get_idempotency_tx(tx, key)? {
        if recorded_op != operation {
            return Err(EngineError::Validation(format!(
                "idempotency key {} was already used for {}",
                key, recorded_op
            )));
        }
        debug!(key, operation, "Replaying recorded idempotent outcome");
        return serde_json::from_str(&json).map_err(|e| EngineError::Internal(e.into()));
    }

    let outcome = f(tx)?;
    let json = serde_json::to_string(&outcome).map_err(|e| EngineError::Internal(e.into()))?;
    store::record_idempotency_tx(tx, key, operation, &json, chrono::Utc::now())?;
    Ok(outcome)
}
