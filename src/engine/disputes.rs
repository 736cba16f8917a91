//! Dispute Resolver
//!
//! The human-ruling override path. Opening a dispute removes the wager from
//! the automatic-settlement scan; resolution is guarded so it happens
//! exactly once, and a win ruling runs the identical payout path as
//! automatic settlement.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, PreconditionKind};
use crate::models::{Dispute, DisputeRuling, DisputeStatus, WagerStatus};
use crate::store;

use super::settlement::WinnerSide;
use super::{idempotent_tx, WagerEngine};

impl WagerEngine {
    /// Open a dispute on a MATCHED wager. The DISPUTED status excludes the
    /// wager from the settlement scan unconditionally.
    pub async fn open_dispute(
        &self,
        wager_id: Uuid,
        disputing_user_id: Uuid,
        reason: &str,
        idempotency_key: &str,
    ) -> EngineResult<Dispute> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation("dispute reason is empty".into()));
        }

        let dispute = self
            .with_conflict_retry(|| {
                let now = Utc::now();
                self.store().transaction(|tx| {
                    idempotent_tx(tx, idempotency_key, "open_dispute", |tx| {
                        let mut wager = store::get_wager_tx(tx, wager_id)?;
                        // DISPUTED is only reachable from MATCHED; this also
                        // rejects disputes on SETTLED and VOID wagers.
                        if wager.status != WagerStatus::Matched {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }

                        let is_party = wager.creator_id == disputing_user_id
                            || store::acceptances_for_wager_tx(tx, wager_id)?
                                .iter()
                                .any(|a| a.accepter_id == disputing_user_id);
                        if !is_party {
                            return Err(EngineError::Validation(
                                "only a party to the wager can dispute it".into(),
                            ));
                        }

                        wager.status = WagerStatus::Disputed;
                        store::update_wager_guarded_tx(tx, &wager)?;

                        let dispute = Dispute {
                            id: Uuid::new_v4(),
                            wager_id,
                            disputing_user_id,
                            reason: reason.trim().to_string(),
                            status: DisputeStatus::Open,
                            resolution: None,
                            created_at: now,
                        };
                        store::insert_dispute_tx(tx, &dispute)?;
                        Ok(dispute)
                    })
                })
            })
            .await?;

        info!(
            dispute_id = %dispute.id,
            wager_id = %wager_id,
            "Dispute opened, wager withdrawn from settlement scan"
        );
        Ok(dispute)
    }

    /// Privileged: apply a human ruling. The conditional write on the
    /// dispute row guarantees open -> resolved happens exactly once; the
    /// financial effect uses the same settlement/void bodies as the
    /// automatic path, so the two can never both fire.
    pub async fn resolve_dispute(
        &self,
        dispute_id: Uuid,
        ruling: DisputeRuling,
        notes: &str,
        idempotency_key: &str,
    ) -> EngineResult<Dispute> {
        let (dispute, wager_id, escrow_settled) = self
            .with_conflict_retry(|| {
                let now = Utc::now();
                self.store().transaction(|tx| {
                    idempotent_tx(tx, idempotency_key, "resolve_dispute", |tx| {
                        let dispute = store::get_dispute_tx(tx, dispute_id)?;
                        store::resolve_dispute_guarded_tx(tx, dispute_id, ruling, notes, now)?;

                        let wager = store::get_wager_tx(tx, dispute.wager_id)?;
                        if wager.status != WagerStatus::Disputed {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }

                        let escrow_settled = !wager.escrow_failed;

                        // Escrow-failed wagers were already compensated at
                        // lock time; any ruling is financially a void.
                        if wager.escrow_failed {
                            let mut wager = wager;
                            wager.status = WagerStatus::Void;
                            wager.settled_at = Some(now);
                            store::update_wager_guarded_tx(tx, &wager)?;
                        } else {
                            match ruling {
                                DisputeRuling::Void => {
                                    super::settlement::apply_void_tx(
                                        tx,
                                        dispute.wager_id,
                                        WagerStatus::Disputed,
                                    )?;
                                }
                                DisputeRuling::CreatorWins => {
                                    super::settlement::apply_settlement_tx(
                                        tx,
                                        dispute.wager_id,
                                        WinnerSide::Creator,
                                        WagerStatus::Disputed,
                                        self.config().commission_rate_bps,
                                    )?;
                                }
                                DisputeRuling::AccepterWins => {
                                    super::settlement::apply_settlement_tx(
                                        tx,
                                        dispute.wager_id,
                                        WinnerSide::Accepters,
                                        WagerStatus::Disputed,
                                        self.config().commission_rate_bps,
                                    )?;
                                }
                            }
                        }

                        let resolved = store::get_dispute_tx(tx, dispute_id)?;
                        Ok((resolved, dispute.wager_id, escrow_settled))
                    })
                })
            })
            .await?;

        info!(
            dispute_id = %dispute_id,
            wager_id = %wager_id,
            ruling = ruling.as_str(),
            "Dispute resolved"
        );

        // Post-commit escrow disbursement, same policy as automatic settlement
        if escrow_settled {
            let wager = self.store().get_wager(wager_id)?;
            match ruling {
                DisputeRuling::Void => self.disburse_void(&wager).await,
                DisputeRuling::CreatorWins => {
                    self.disburse_escrow(&wager, WinnerSide::Creator).await
                }
                DisputeRuling::AccepterWins => {
                    self.disburse_escrow(&wager, WinnerSide::Accepters).await
                }
            }
        }

        Ok(dispute)
    }
}
