//! Automatic settlement: escrow coordination, the periodic oracle scan,
//! and the shared settlement/void transaction bodies.
//!
//! The scan is safe to run concurrently with itself: every per-wager
//! transition re-verifies the expected status at the current version inside
//! its own transaction, so overlapping runs cannot double-settle.

use chrono::Utc;
use rusqlite::Transaction;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{self, OracleStatus};
use crate::errors::{EngineError, EngineResult, PreconditionKind};
use crate::models::{LedgerEntryType, Wager, WagerStatus};
use crate::store::{self, PLATFORM_ACCOUNT};

use super::payout::compute_payout;
use super::WagerEngine;

/// Which side of a wager won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerSide {
    Creator,
    Accepters,
}

impl WagerEngine {
    /// Lock the total pot with the escrow service, strictly after the
    /// matching transaction committed. On retry exhaustion this is the
    /// engine's designated partial-failure path: the wager is flagged
    /// escrow-failed (status stays MATCHED), both sides receive
    /// compensating ledger entries, and an operational alert is raised.
    pub async fn lock_escrow(&self, wager_id: Uuid) -> EngineResult<()> {
        let wager = self.store().get_wager(wager_id)?;
        if wager.status != WagerStatus::Matched || wager.escrow_id.is_some() || wager.escrow_failed
        {
            return Ok(());
        }

        let pot = wager.total_pot();
        let lock_result = adapters::with_backoff(
            "escrow_lock",
            self.config().escrow_retry_attempts,
            self.config().escrow_backoff_base_ms,
            self.config().adapter_timeout,
            || self.escrow.lock(wager_id, pot),
        )
        .await;

        match lock_result {
            Ok(escrow_id) => {
                self.with_conflict_retry(|| {
                    self.store().transaction(|tx| {
                        let mut wager = store::get_wager_tx(tx, wager_id)?;
                        if wager.escrow_id.is_some() || wager.escrow_failed {
                            return Ok(());
                        }
                        wager.escrow_id = Some(escrow_id.clone());
                        store::update_wager_guarded_tx(tx, &wager)?;
                        Ok(())
                    })
                })
                .await?;
                info!(wager_id = %wager_id, pot, "Escrow locked");
                Ok(())
            }
            Err(e) => {
                error!(
                    wager_id = %wager_id,
                    pot,
                    error = %e,
                    "ALERT: escrow lock exhausted retries, compensating both parties"
                );
                self.with_conflict_retry(|| {
                    let now = Utc::now();
                    self.store().transaction(|tx| {
                        let mut wager = store::get_wager_tx(tx, wager_id)?;
                        if wager.escrow_id.is_some() || wager.escrow_failed {
                            return Ok(());
                        }
                        // Explicit compensating entries, never a silent revert
                        store::append_entry_tx(
                            tx,
                            wager.creator_id,
                            LedgerEntryType::WagerStake,
                            wager.matched_amount,
                            Some(wager.id),
                            now,
                        )?;
                        for acceptance in store::acceptances_for_wager_tx(tx, wager.id)? {
                            store::append_entry_tx(
                                tx,
                                acceptance.accepter_id,
                                LedgerEntryType::WagerStake,
                                acceptance.amount,
                                Some(wager.id),
                                now,
                            )?;
                        }
                        wager.escrow_failed = true;
                        store::update_wager_guarded_tx(tx, &wager)?;
                        Ok(())
                    })
                })
                .await
            }
        }
    }

    /// One pass of the periodic scan: every MATCHED, non-disputed wager past
    /// its event end is checked against the oracle. Oracle failures and
    /// InProgress results defer the wager to the next cycle, unbounded.
    pub async fn run_settlement_scan(&self) -> EngineResult<usize> {
        let due = self.store().list_due_for_settlement(Utc::now())?;
        if due.is_empty() {
            return Ok(0);
        }
        info!(count = due.len(), "Settlement scan found due wagers");

        let mut settled = 0;
        for wager_id in due {
            match self.resolve_wager(wager_id).await {
                Ok(Some(wager)) => {
                    settled += 1;
                    info!(
                        wager_id = %wager_id,
                        status = wager.status.as_str(),
                        "Wager resolved"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(wager_id = %wager_id, error = %e, "Resolution deferred to next cycle");
                }
            }
        }
        Ok(settled)
    }

    /// Resolve a single wager against the oracle. Returns `None` when the
    /// event is not Final yet or the wager is no longer eligible.
    pub async fn resolve_wager(&self, wager_id: Uuid) -> EngineResult<Option<Wager>> {
        let wager = self.store().get_wager(wager_id)?;
        if wager.status != WagerStatus::Matched || wager.escrow_failed {
            return Ok(None);
        }

        let result = adapters::with_backoff(
            "oracle_get_result",
            self.config().escrow_retry_attempts,
            self.config().escrow_backoff_base_ms,
            self.config().adapter_timeout,
            || self.oracle.get_result(&wager.event_ref),
        )
        .await
        .map_err(|e| EngineError::Adapter(e.to_string()))?;

        if result.status == OracleStatus::InProgress {
            return Ok(None);
        }

        match result.winning_selection.as_deref() {
            // Deterministic winner relative to this wager's selection
            Some(sel) if sel == wager.market.selection() => self
                .settle_wager(wager_id, WinnerSide::Creator, WagerStatus::Matched)
                .await
                .map(Some),
            Some(_) => self
                .settle_wager(wager_id, WinnerSide::Accepters, WagerStatus::Matched)
                .await
                .map(Some),
            // Push: no winner, refund both sides at zero commission
            None => self
                .void_wager(wager_id, WagerStatus::Matched)
                .await
                .map(Some),
        }
    }

    /// Commit a settlement, then release escrow post-commit.
    pub(crate) async fn settle_wager(
        &self,
        wager_id: Uuid,
        side: WinnerSide,
        expect_status: WagerStatus,
    ) -> EngineResult<Wager> {
        let commission_rate_bps = self.config().commission_rate_bps;
        let wager = self
            .with_conflict_retry(|| {
                self.store().transaction(|tx| {
                    apply_settlement_tx(tx, wager_id, side, expect_status, commission_rate_bps)
                })
            })
            .await?;

        self.disburse_escrow(&wager, side).await;
        Ok(wager)
    }

    /// Commit a void (push or void ruling): both stakes back, no commission.
    pub(crate) async fn void_wager(
        &self,
        wager_id: Uuid,
        expect_status: WagerStatus,
    ) -> EngineResult<Wager> {
        let wager = self
            .with_conflict_retry(|| {
                self.store()
                    .transaction(|tx| apply_void_tx(tx, wager_id, expect_status))
            })
            .await?;

        self.disburse_void(&wager).await;
        Ok(wager)
    }

    /// Post-commit escrow refund to every party of a voided wager.
    pub(crate) async fn disburse_void(&self, wager: &Wager) {
        let Some(escrow_id) = wager.escrow_id.clone() else {
            return;
        };
        let mut parties = vec![wager.creator_id];
        if let Ok(acceptances) = self.store().acceptances_for_wager(wager.id) {
            parties.extend(acceptances.iter().map(|a| a.accepter_id));
        }
        let refund = adapters::with_backoff(
            "escrow_refund",
            self.config().escrow_retry_attempts,
            self.config().escrow_backoff_base_ms,
            self.config().adapter_timeout,
            || self.escrow.refund(&escrow_id, &parties),
        )
        .await;
        if let Err(e) = refund {
            // The ledger postings stand; disbursement needs operator action.
            error!(
                wager_id = %wager.id,
                escrow_id,
                error = %e,
                "ALERT: escrow refund exhausted retries after void"
            );
        }
    }

    /// Post-commit escrow disbursement for a settled wager. Idempotent on
    /// the adapter side; exhaustion raises an alert but never reverts the
    /// committed ledger postings.
    pub(crate) async fn disburse_escrow(&self, wager: &Wager, side: WinnerSide) {
        let Some(escrow_id) = wager.escrow_id.clone() else {
            return;
        };

        let result = match (side, wager.winner_id) {
            (_, Some(winner_id)) => {
                adapters::with_backoff(
                    "escrow_release",
                    self.config().escrow_retry_attempts,
                    self.config().escrow_backoff_base_ms,
                    self.config().adapter_timeout,
                    || self.escrow.release(&escrow_id, winner_id),
                )
                .await
            }
            // Multiple winning accepters: disburse to all of them
            (WinnerSide::Accepters, None) => {
                let parties: Vec<Uuid> = self
                    .store()
                    .acceptances_for_wager(wager.id)
                    .map(|acceptances| acceptances.iter().map(|a| a.accepter_id).collect())
                    .unwrap_or_default();
                adapters::with_backoff(
                    "escrow_release_split",
                    self.config().escrow_retry_attempts,
                    self.config().escrow_backoff_base_ms,
                    self.config().adapter_timeout,
                    || self.escrow.refund(&escrow_id, &parties),
                )
                .await
            }
            (WinnerSide::Creator, None) => {
                adapters::with_backoff(
                    "escrow_release",
                    self.config().escrow_retry_attempts,
                    self.config().escrow_backoff_base_ms,
                    self.config().adapter_timeout,
                    || self.escrow.release(&escrow_id, wager.creator_id),
                )
                .await
            }
        };

        if let Err(e) = result {
            error!(
                wager_id = %wager.id,
                escrow_id,
                error = %e,
                "ALERT: escrow disbursement exhausted retries after settlement"
            );
        }
    }
}

/// The settlement transaction body, shared by the oracle path and a win
/// ruling from the dispute resolver. Re-verifies the expected status at the
/// current version before moving any money.
pub(crate) fn apply_settlement_tx(
    tx: &Transaction<'_>,
    wager_id: Uuid,
    side: WinnerSide,
    expect_status: WagerStatus,
    commission_rate_bps: u32,
) -> EngineResult<Wager> {
    let now = Utc::now();
    let mut wager = store::get_wager_tx(tx, wager_id)?;
    if wager.status != expect_status {
        return Err(EngineError::Precondition(PreconditionKind::WrongState));
    }
    if wager.escrow_failed {
        return Err(EngineError::Precondition(PreconditionKind::WrongState));
    }

    let acceptances = store::acceptances_for_wager_tx(tx, wager_id)?;
    if acceptances.is_empty() {
        return Err(EngineError::Internal(anyhow::anyhow!(
            "matched wager {} has no acceptances",
            wager_id
        )));
    }

    // Fractional wagers settle acceptance-by-acceptance; the single binary
    // acceptance is the degenerate case of this loop.
    let mut total_commission = 0i64;
    match side {
        WinnerSide::Creator => {
            let mut creator_credit = 0i64;
            for acceptance in &acceptances {
                let breakdown = compute_payout(
                    acceptance.amount,
                    acceptance.amount,
                    wager.odds_milli,
                    commission_rate_bps,
                );
                creator_credit += breakdown.winner_payout;
                total_commission += breakdown.commission;
                if breakdown.loser_refund > 0 {
                    store::append_entry_tx(
                        tx,
                        acceptance.accepter_id,
                        LedgerEntryType::WagerPayout,
                        breakdown.loser_refund,
                        Some(wager.id),
                        now,
                    )?;
                }
                store::bump_win_loss_tx(tx, acceptance.accepter_id, false)?;
            }
            store::append_entry_tx(
                tx,
                wager.creator_id,
                LedgerEntryType::WagerPayout,
                creator_credit,
                Some(wager.id),
                now,
            )?;
            store::bump_win_loss_tx(tx, wager.creator_id, true)?;

            wager.winner_id = Some(wager.creator_id);
            wager.loser_id = match acceptances.as_slice() {
                [only] => Some(only.accepter_id),
                _ => None,
            };
        }
        WinnerSide::Accepters => {
            let mut creator_refund = 0i64;
            for acceptance in &acceptances {
                let breakdown = compute_payout(
                    acceptance.amount,
                    acceptance.amount,
                    wager.odds_milli,
                    commission_rate_bps,
                );
                store::append_entry_tx(
                    tx,
                    acceptance.accepter_id,
                    LedgerEntryType::WagerPayout,
                    breakdown.winner_payout,
                    Some(wager.id),
                    now,
                )?;
                total_commission += breakdown.commission;
                creator_refund += breakdown.loser_refund;
                store::bump_win_loss_tx(tx, acceptance.accepter_id, true)?;
            }
            if creator_refund > 0 {
                store::append_entry_tx(
                    tx,
                    wager.creator_id,
                    LedgerEntryType::WagerPayout,
                    creator_refund,
                    Some(wager.id),
                    now,
                )?;
            }
            store::bump_win_loss_tx(tx, wager.creator_id, false)?;

            wager.winner_id = match acceptances.as_slice() {
                [only] => Some(only.accepter_id),
                _ => None,
            };
            wager.loser_id = Some(wager.creator_id);
        }
    }

    if total_commission > 0 {
        store::append_entry_tx(
            tx,
            PLATFORM_ACCOUNT,
            LedgerEntryType::Commission,
            total_commission,
            Some(wager.id),
            now,
        )?;
    }

    wager.status = WagerStatus::Settled;
    wager.settled_at = Some(now);
    store::update_wager_guarded_tx(tx, &wager)
}

/// The void transaction body: refund each side's locked stake at zero
/// commission. Shared by the push path and a void ruling.
pub(crate) fn apply_void_tx(
    tx: &Transaction<'_>,
    wager_id: Uuid,
    expect_status: WagerStatus,
) -> EngineResult<Wager> {
    let now = Utc::now();
    let mut wager = store::get_wager_tx(tx, wager_id)?;
    if wager.status != expect_status {
        return Err(EngineError::Precondition(PreconditionKind::WrongState));
    }
    if wager.escrow_failed {
        return Err(EngineError::Precondition(PreconditionKind::WrongState));
    }

    store::append_entry_tx(
        tx,
        wager.creator_id,
        LedgerEntryType::WagerPayout,
        wager.matched_amount,
        Some(wager.id),
        now,
    )?;
    for acceptance in store::acceptances_for_wager_tx(tx, wager_id)? {
        store::append_entry_tx(
            tx,
            acceptance.accepter_id,
            LedgerEntryType::WagerPayout,
            acceptance.amount,
            Some(wager.id),
            now,
        )?;
    }

    wager.status = WagerStatus::Void;
    wager.settled_at = Some(now);
    store::update_wager_guarded_tx(tx, &wager)
}

/// Periodic scan task, spawned from main alongside the API server.
pub async fn settlement_loop(engine: Arc<WagerEngine>, scan_secs: u64) {
    info!(scan_secs, "Starting settlement scan loop");
    let mut ticker = interval(std::time::Duration::from_secs(scan_secs.max(1)));
    loop {
        ticker.tick().await;
        match engine.run_settlement_scan().await {
            Ok(0) => {}
            Ok(settled) => info!(settled, "Settlement scan pass complete"),
            Err(e) => warn!(error = %e, "Settlement scan pass failed"),
        }
    }
}
