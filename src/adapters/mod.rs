//! External adapter boundary: escrow and results oracle
//!
//! Adapter calls happen strictly after the storage transaction commits,
//! with their own timeout and bounded-retry policy. A committed ledger
//! posting is never silently reverted on adapter failure; reversal is
//! always an explicit compensating entry made by the engine.

pub mod escrow;
pub mod oracle;

pub use escrow::{EscrowAdapter, PaperEscrowAdapter};
pub use oracle::{HttpOracleAdapter, OracleAdapter, OracleResult, OracleStatus, StaticOracleAdapter};

use anyhow::{anyhow, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry an adapter call with bounded exponential backoff and jitter.
/// Each attempt runs under its own timeout.
pub async fn with_backoff<T, F, Fut>(
    op_name: &str,
    attempts: u32,
    base_ms: u64,
    timeout: Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = anyhow!("{}: no attempts made", op_name);
    for attempt in 0..attempts.max(1) {
        match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = anyhow!("{}: timed out after {:?}", op_name, timeout),
        }

        if attempt + 1 < attempts {
            let delay = backoff_delay(base_ms, attempt);
            warn!(
                op = op_name,
                attempt = attempt + 1,
                delay_ms = delay,
                error = %last_err,
                "Adapter call failed, backing off"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
    Err(last_err)
}

/// Exponential delay with jitter. The shift is clamped and the arithmetic
/// saturates so a large configured attempt count cannot overflow.
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    let jitter = rand::thread_rng().gen_range(0..base_ms.max(1));
    base_ms
        .saturating_mul(1u64 << attempt.min(16))
        .saturating_add(jitter)
}
