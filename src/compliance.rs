//! Compliance Gate
//!
//! Pure predicates consulted before CreateWager, AcceptWager and Deposit:
//! KYC verified, not self-excluded, within responsible-gaming limits.
//! The limit check sums ledger entries over trailing (not calendar-aligned)
//! 24h/7d/30d windows inside the caller's transaction, so there is no
//! check-then-act gap against the posting it guards.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Transaction;

use crate::errors::{EngineError, EngineResult, PreconditionKind};
use crate::models::{LedgerEntryType, LimitWindows, User};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Deposit,
    Wager,
}

/// KYC must be fully verified before any money movement.
pub fn verified_kyc(user: &User) -> EngineResult<()> {
    if user.kyc_status == crate::models::KycStatus::Verified {
        Ok(())
    } else {
        Err(EngineError::Precondition(PreconditionKind::NotVerified))
    }
}

/// Permanent exclusion (no end date) never lapses; a timed exclusion lapses
/// once `now >= end`.
pub fn not_self_excluded(user: &User, now: DateTime<Utc>) -> EngineResult<()> {
    match &user.self_exclusion {
        None => Ok(()),
        Some(exclusion) => match exclusion.end {
            None => Err(EngineError::Precondition(PreconditionKind::SelfExcluded)),
            Some(end) if now < end => {
                Err(EngineError::Precondition(PreconditionKind::SelfExcluded))
            }
            Some(_) => Ok(()),
        },
    }
}

/// Spent amounts over the three trailing windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSpent {
    pub daily: i64,
    pub weekly: i64,
    pub monthly: i64,
}

/// Pure window check: a cap of 0 is unlimited; otherwise the proposed amount
/// must fit in every configured window.
pub fn within_limits(caps: &LimitWindows, spent: &WindowSpent, amount: i64) -> EngineResult<()> {
    let exceeded = |cap: i64, used: i64| cap > 0 && used + amount > cap;
    if exceeded(caps.daily, spent.daily)
        || exceeded(caps.weekly, spent.weekly)
        || exceeded(caps.monthly, spent.monthly)
    {
        return Err(EngineError::Precondition(PreconditionKind::LimitExceeded));
    }
    Ok(())
}

/// Sum the relevant ledger entries inside the caller's transaction and apply
/// the window check for the proposed amount.
pub fn check_limits_tx(
    tx: &Transaction<'_>,
    user: &User,
    amount: i64,
    kind: LimitKind,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let (caps, entry_type) = match kind {
        LimitKind::Deposit => (&user.limits.deposit, LedgerEntryType::Deposit),
        LimitKind::Wager => (&user.limits.wager, LedgerEntryType::WagerStake),
    };

    // Skip the sums entirely when nothing is capped.
    if caps.daily == 0 && caps.weekly == 0 && caps.monthly == 0 {
        return Ok(());
    }

    let spent = WindowSpent {
        daily: store::window_sum(tx, user.id, entry_type, now - Duration::hours(24))?,
        weekly: store::window_sum(tx, user.id, entry_type, now - Duration::days(7))?,
        monthly: store::window_sum(tx, user.id, entry_type, now - Duration::days(30))?,
    };
    within_limits(caps, &spent, amount)
}
