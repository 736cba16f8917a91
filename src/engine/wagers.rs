//! Caller-facing wager operations: create, accept, cancel, deposit, withdraw
//!
//! Funds are reserved lazily: creating a wager moves no money, so a public
//! wager can be browsed by many counter-parties before anyone commits.
//! Acceptance debits both sides inside one storage transaction; the escrow
//! lock happens strictly after commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::compliance::{self, LimitKind};
use crate::errors::{EngineError, EngineResult, PreconditionKind};
use crate::models::{
    Acceptance, LedgerEntryType, Market, MarketDescriptor, Visibility, Wager, WagerStatus,
};
use crate::store;

use super::{idempotent_tx, WagerEngine};

#[derive(Debug, Clone)]
pub struct CreateWagerRequest {
    pub creator_id: Uuid,
    pub event_ref: String,
    pub event_ends_at: DateTime<Utc>,
    pub market: MarketDescriptor,
    pub stake: i64,
    pub odds_milli: Option<i64>,
    pub visibility: Visibility,
    pub idempotency_key: String,
}

/// Recorded outcome of an acceptance, replayable via the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub wager: Wager,
    pub acceptance: Acceptance,
}

/// Recorded outcome of a deposit or withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsOutcome {
    pub user_id: Uuid,
    pub amount: i64,
    pub balance_after: i64,
}

impl WagerEngine {
    /// Propose a wager. Gated by the compliance predicates; no funds move.
    pub async fn create_wager(&self, req: CreateWagerRequest) -> EngineResult<Wager> {
        let market = Market::from_descriptor(&req.market)?;
        if req.stake <= 0 {
            return Err(EngineError::Validation("stake must be positive".into()));
        }
        if req.event_ref.trim().is_empty() {
            return Err(EngineError::Validation("event_ref is empty".into()));
        }
        if let Some(odds) = req.odds_milli {
            if odds <= 0 {
                return Err(EngineError::Validation("odds must be positive".into()));
            }
        }

        let now = Utc::now();
        let wager = self.store().transaction(|tx| {
            idempotent_tx(tx, &req.idempotency_key, "create_wager", |tx| {
                let creator = store::get_user_tx(tx, req.creator_id)?;
                compliance::verified_kyc(&creator)?;
                compliance::not_self_excluded(&creator, now)?;
                compliance::check_limits_tx(tx, &creator, req.stake, LimitKind::Wager, now)?;

                let wager = Wager {
                    id: Uuid::new_v4(),
                    creator_id: req.creator_id,
                    event_ref: req.event_ref.trim().to_string(),
                    event_ends_at: req.event_ends_at,
                    market: market.clone(),
                    stake: req.stake,
                    odds_milli: req.odds_milli,
                    visibility: req.visibility,
                    status: WagerStatus::Open,
                    matched_amount: 0,
                    escrow_id: None,
                    escrow_failed: false,
                    winner_id: None,
                    loser_id: None,
                    version: 0,
                    created_at: now,
                    matched_at: None,
                    settled_at: None,
                };
                store::insert_wager_tx(tx, &wager)?;
                Ok(wager)
            })
        })?;

        info!(
            wager_id = %wager.id,
            creator_id = %wager.creator_id,
            stake = wager.stake,
            "Wager created"
        );
        Ok(wager)
    }

    /// Accept part (or all) of a wager's remaining capacity. One atomic
    /// transaction debits both parties and appends their stake entries;
    /// the wager flips to MATCHED exactly when capacity is fully covered.
    pub async fn accept_wager(
        &self,
        accepter_id: Uuid,
        wager_id: Uuid,
        amount: i64,
        idempotency_key: &str,
    ) -> EngineResult<AcceptOutcome> {
        if amount <= 0 {
            return Err(EngineError::Validation("amount must be positive".into()));
        }

        let outcome = self
            .with_conflict_retry(|| {
                let now = Utc::now();
                self.store().transaction(|tx| {
                    idempotent_tx(tx, idempotency_key, "accept_wager", |tx| {
                        let mut wager = store::get_wager_tx(tx, wager_id)?;
                        if wager.status != WagerStatus::Open {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }
                        if wager.remaining_capacity() < amount {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }
                        if accepter_id == wager.creator_id {
                            return Err(EngineError::Validation(
                                "creator cannot accept their own wager".into(),
                            ));
                        }

                        let accepter = store::get_user_tx(tx, accepter_id)?;
                        let creator = store::get_user_tx(tx, wager.creator_id)?;
                        compliance::verified_kyc(&accepter)?;
                        compliance::verified_kyc(&creator)?;
                        compliance::not_self_excluded(&accepter, now)?;
                        compliance::check_limits_tx(tx, &accepter, amount, LimitKind::Wager, now)?;

                        // Both exposures must be covered: the accepter's
                        // counter-stake and the creator's lazily-reserved slice.
                        if accepter.balance < amount {
                            return Err(EngineError::Precondition(
                                PreconditionKind::InsufficientFunds,
                            ));
                        }
                        if creator.balance < amount {
                            return Err(EngineError::Precondition(
                                PreconditionKind::InsufficientFunds,
                            ));
                        }

                        store::append_entry_tx(
                            tx,
                            accepter_id,
                            LedgerEntryType::WagerStake,
                            -amount,
                            Some(wager.id),
                            now,
                        )?;
                        store::append_entry_tx(
                            tx,
                            wager.creator_id,
                            LedgerEntryType::WagerStake,
                            -amount,
                            Some(wager.id),
                            now,
                        )?;

                        let acceptance = Acceptance {
                            id: Uuid::new_v4(),
                            wager_id: wager.id,
                            accepter_id,
                            amount,
                            created_at: now,
                        };
                        store::insert_acceptance_tx(tx, &acceptance)?;

                        wager.matched_amount += amount;
                        if wager.matched_amount == wager.stake {
                            wager.status = WagerStatus::Matched;
                            wager.matched_at = Some(now);
                        }
                        let updated = store::update_wager_guarded_tx(tx, &wager)?;

                        Ok(AcceptOutcome {
                            wager: updated,
                            acceptance,
                        })
                    })
                })
            })
            .await?;

        info!(
            wager_id = %wager_id,
            accepter_id = %accepter_id,
            amount,
            status = outcome.wager.status.as_str(),
            "Wager acceptance recorded"
        );

        // Escrow is locked strictly after the matching transaction commits.
        if outcome.wager.status == WagerStatus::Matched {
            self.lock_escrow(wager_id).await?;
        }

        Ok(outcome)
    }

    /// Cancel an OPEN wager with zero acceptances. No funds were reserved,
    /// so this is a pure state write.
    pub async fn cancel_wager(
        &self,
        wager_id: Uuid,
        caller_id: Uuid,
        idempotency_key: &str,
    ) -> EngineResult<Wager> {
        let wager = self
            .with_conflict_retry(|| {
                self.store().transaction(|tx| {
                    idempotent_tx(tx, idempotency_key, "cancel_wager", |tx| {
                        let mut wager = store::get_wager_tx(tx, wager_id)?;
                        if wager.creator_id != caller_id {
                            return Err(EngineError::Validation(
                                "only the creator can cancel a wager".into(),
                            ));
                        }
                        if wager.status != WagerStatus::Open {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }
                        if store::acceptance_count_tx(tx, wager_id)? > 0 {
                            return Err(EngineError::Precondition(PreconditionKind::WrongState));
                        }
                        wager.status = WagerStatus::Canceled;
                        store::update_wager_guarded_tx(tx, &wager)
                    })
                })
            })
            .await?;

        info!(wager_id = %wager_id, "Wager canceled");
        Ok(wager)
    }

    /// Credit a deposit, gated by KYC, self-exclusion and deposit limits.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: i64,
        idempotency_key: &str,
    ) -> EngineResult<FundsOutcome> {
        if amount <= 0 {
            return Err(EngineError::Validation("amount must be positive".into()));
        }
        let now = Utc::now();
        self.store().transaction(|tx| {
            idempotent_tx(tx, idempotency_key, "deposit", |tx| {
                let user = store::get_user_tx(tx, user_id)?;
                compliance::verified_kyc(&user)?;
                compliance::not_self_excluded(&user, now)?;
                compliance::check_limits_tx(tx, &user, amount, LimitKind::Deposit, now)?;

                store::append_entry_tx(tx, user_id, LedgerEntryType::Deposit, amount, None, now)?;
                Ok(FundsOutcome {
                    user_id,
                    amount,
                    balance_after: user.balance + amount,
                })
            })
        })
    }

    /// Debit a withdrawal. Self-exclusion never traps funds: only KYC and
    /// the settled balance gate this path.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: i64,
        idempotency_key: &str,
    ) -> EngineResult<FundsOutcome> {
        if amount <= 0 {
            return Err(EngineError::Validation("amount must be positive".into()));
        }
        let now = Utc::now();
        self.store().transaction(|tx| {
            idempotent_tx(tx, idempotency_key, "withdraw", |tx| {
                let user = store::get_user_tx(tx, user_id)?;
                compliance::verified_kyc(&user)?;
                if user.balance < amount {
                    return Err(EngineError::Precondition(
                        PreconditionKind::InsufficientFunds,
                    ));
                }

                store::append_entry_tx(
                    tx,
                    user_id,
                    LedgerEntryType::Withdrawal,
                    -amount,
                    None,
                    now,
                )?;
                Ok(FundsOutcome {
                    user_id,
                    amount,
                    balance_after: user.balance - amount,
                })
            })
        })
    }
}
