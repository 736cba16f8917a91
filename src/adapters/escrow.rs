//! Escrow Adapter
//!
//! Third-party hold of matched funds pending settlement. All operations are
//! idempotent and keyed by wager/escrow id, so platform-level retries of a
//! request can never double-lock or double-release a pot.

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

/// Namespace for deriving deterministic escrow ids from wager ids.
const ESCROW_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

#[async_trait::async_trait]
pub trait EscrowAdapter: Send + Sync {
    /// Place the total pot under escrow. Keyed by wager id: calling twice for
    /// the same wager returns the same escrow id without locking twice.
    async fn lock(&self, wager_id: Uuid, amount: i64) -> Result<String>;

    /// Release the pot to the winner. Idempotent per escrow id.
    async fn release(&self, escrow_id: &str, winner_id: Uuid) -> Result<()>;

    /// Return the locked funds to the listed parties. Idempotent.
    async fn refund(&self, escrow_id: &str, party_ids: &[Uuid]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EscrowState {
    Locked,
    Released { winner_id: Uuid },
    Refunded,
}

#[derive(Debug, Clone)]
struct EscrowRecord {
    wager_id: Uuid,
    amount: i64,
    state: EscrowState,
}

/// In-memory escrow for paper runs and tests. Deterministic ids (UUIDv5 of
/// the wager id) make the idempotency observable; failure injection lets
/// tests drive the compensation path.
#[derive(Default)]
pub struct PaperEscrowAdapter {
    records: Mutex<HashMap<String, EscrowRecord>>,
    fail_next_locks: AtomicU32,
    release_calls: AtomicU32,
    refund_calls: AtomicU32,
}

impl PaperEscrowAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` lock calls fail, to exercise backoff/compensation.
    pub fn fail_next_locks(&self, n: u32) {
        self.fail_next_locks.store(n, Ordering::SeqCst);
    }

    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> u32 {
        self.refund_calls.load(Ordering::SeqCst)
    }

    /// Locked amount for a wager, if any (test observability).
    pub fn locked_amount(&self, wager_id: Uuid) -> Option<i64> {
        let records = self.records.lock();
        records
            .values()
            .find(|r| r.wager_id == wager_id && r.state == EscrowState::Locked)
            .map(|r| r.amount)
    }
}

#[async_trait::async_trait]
impl EscrowAdapter for PaperEscrowAdapter {
    async fn lock(&self, wager_id: Uuid, amount: i64) -> Result<String> {
        if self
            .fail_next_locks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("escrow service unavailable (injected)");
        }

        let escrow_id = Uuid::new_v5(&ESCROW_NAMESPACE, wager_id.as_bytes()).to_string();
        let mut records = self.records.lock();
        match records.get(&escrow_id) {
            // Idempotent replay of a lock we already hold
            Some(existing) if existing.amount == amount => Ok(escrow_id),
            Some(existing) => Err(anyhow!(
                "escrow {} already locked for a different amount ({} != {})",
                escrow_id,
                existing.amount,
                amount
            )),
            None => {
                records.insert(
                    escrow_id.clone(),
                    EscrowRecord {
                        wager_id,
                        amount,
                        state: EscrowState::Locked,
                    },
                );
                Ok(escrow_id)
            }
        }
    }

    async fn release(&self, escrow_id: &str, winner_id: Uuid) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock();
        let record = records
            .get_mut(escrow_id)
            .ok_or_else(|| anyhow!("unknown escrow id {}", escrow_id))?;
        match &record.state {
            EscrowState::Locked => {
                record.state = EscrowState::Released { winner_id };
                Ok(())
            }
            // Releasing twice to the same winner is a no-op
            EscrowState::Released { winner_id: w } if *w == winner_id => Ok(()),
            other => Err(anyhow!(
                "escrow {} cannot be released from state {:?}",
                escrow_id,
                other
            )),
        }
    }

    async fn refund(&self, escrow_id: &str, _party_ids: &[Uuid]) -> Result<()> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock();
        let record = records
            .get_mut(escrow_id)
            .ok_or_else(|| anyhow!("unknown escrow id {}", escrow_id))?;
        match &record.state {
            EscrowState::Locked | EscrowState::Refunded => {
                record.state = EscrowState::Refunded;
                Ok(())
            }
            other => Err(anyhow!(
                "escrow {} cannot be refunded from state {:?}",
                escrow_id,
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_idempotent_per_wager() {
        let escrow = PaperEscrowAdapter::new();
        let wager_id = Uuid::new_v4();

        let first = escrow.lock(wager_id, 4000).await.unwrap();
        let second = escrow.lock(wager_id, 4000).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(escrow.locked_amount(wager_id), Some(4000));

        // Same key, different amount is a real error, not a silent overwrite
        assert!(escrow.lock(wager_id, 9999).await.is_err());
    }

    #[tokio::test]
    async fn test_double_release_same_winner_is_noop() {
        let escrow = PaperEscrowAdapter::new();
        let wager_id = Uuid::new_v4();
        let winner = Uuid::new_v4();

        let escrow_id = escrow.lock(wager_id, 4000).await.unwrap();
        escrow.release(&escrow_id, winner).await.unwrap();
        escrow.release(&escrow_id, winner).await.unwrap();

        // A conflicting second release is rejected
        assert!(escrow.release(&escrow_id, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_lock_failures() {
        let escrow = PaperEscrowAdapter::new();
        escrow.fail_next_locks(2);
        let wager_id = Uuid::new_v4();

        assert!(escrow.lock(wager_id, 100).await.is_err());
        assert!(escrow.lock(wager_id, 100).await.is_err());
        assert!(escrow.lock(wager_id, 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_refund_after_release_rejected() {
        let escrow = PaperEscrowAdapter::new();
        let wager_id = Uuid::new_v4();
        let escrow_id = escrow.lock(wager_id, 100).await.unwrap();

        escrow.release(&escrow_id, Uuid::new_v4()).await.unwrap();
        assert!(escrow.refund(&escrow_id, &[]).await.is_err());
    }
}
