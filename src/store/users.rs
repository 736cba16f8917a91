//! User rows: balances, KYC status, limits, self-exclusion
//!
//! The KYC subsystem writes `kyc_status`; the engine only reads it.
//! Balances are never written directly here, only via ledger postings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::models::{
    KycStatus, LimitWindows, ResponsibleGamingLimits, SelfExclusion, User,
};

use super::{not_found, parse_uuid, ts_to_datetime, Store};

const USER_COLUMNS: &str = "id, balance, kyc_status, \
    deposit_limit_daily, deposit_limit_weekly, deposit_limit_monthly, \
    wager_limit_daily, wager_limit_weekly, wager_limit_monthly, \
    self_exclusion_start, self_exclusion_end, win_count, loss_count, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id = parse_uuid(&row.get::<_, String>(0)?)?;
    let kyc_raw: String = row.get(2)?;
    let excl_start: Option<i64> = row.get(9)?;
    let excl_end: Option<i64> = row.get(10)?;

    Ok(User {
        id,
        balance: row.get(1)?,
        kyc_status: KycStatus::from_str(&kyc_raw).unwrap_or(KycStatus::Pending),
        limits: ResponsibleGamingLimits {
            deposit: LimitWindows {
                daily: row.get(3)?,
                weekly: row.get(4)?,
                monthly: row.get(5)?,
            },
            wager: LimitWindows {
                daily: row.get(6)?,
                weekly: row.get(7)?,
                monthly: row.get(8)?,
            },
        },
        self_exclusion: excl_start.map(|start| SelfExclusion {
            start: ts_to_datetime(start),
            end: excl_end.map(ts_to_datetime),
        }),
        win_count: row.get(11)?,
        loss_count: row.get(12)?,
        created_at: ts_to_datetime(row.get(13)?),
    })
}

pub(crate) fn get_user_tx(tx: &Transaction<'_>, id: Uuid) -> EngineResult<User> {
    let mut stmt = tx.prepare_cached(&format!(
        "SELECT {} FROM users WHERE id = ?1",
        USER_COLUMNS
    ))?;
    match stmt.query_row(params![id.to_string()], map_user) {
        Ok(user) => Ok(user),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found("user")),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn bump_win_loss_tx(tx: &Transaction<'_>, id: Uuid, won: bool) -> EngineResult<()> {
    let sql = if won {
        "UPDATE users SET win_count = win_count + 1 WHERE id = ?1"
    } else {
        "UPDATE users SET loss_count = loss_count + 1 WHERE id = ?1"
    };
    tx.execute(sql, params![id.to_string()])?;
    Ok(())
}

impl Store {
    /// Register a new user account. KYC starts at `pending`.
    pub fn create_user(&self, limits: ResponsibleGamingLimits) -> EngineResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO users (id, balance, kyc_status,
                    deposit_limit_daily, deposit_limit_weekly, deposit_limit_monthly,
                    wager_limit_daily, wager_limit_weekly, wager_limit_monthly,
                    created_at)
                 VALUES (?1, 0, 'pending', ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    limits.deposit.daily,
                    limits.deposit.weekly,
                    limits.deposit.monthly,
                    limits.wager.daily,
                    limits.wager.weekly,
                    limits.wager.monthly,
                    now.timestamp(),
                ],
            )?;
            get_user_tx(tx, id)
        })
    }

    pub fn get_user(&self, id: Uuid) -> EngineResult<User> {
        self.transaction(|tx| get_user_tx(tx, id))
    }

    /// Compliance-writer interface: the KYC subsystem records its decision.
    pub fn set_kyc_status(&self, id: Uuid, status: KycStatus) -> EngineResult<()> {
        self.transaction(|tx| {
            let changed = tx.execute(
                "UPDATE users SET kyc_status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )?;
            if changed == 0 {
                return Err(not_found("user"));
            }
            Ok(())
        })
    }

    /// Start or lift a self-exclusion. `end = None` means permanent.
    pub fn set_self_exclusion(
        &self,
        id: Uuid,
        exclusion: Option<(DateTime<Utc>, Option<DateTime<Utc>>)>,
    ) -> EngineResult<()> {
        self.transaction(|tx| {
            let (start, end) = match exclusion {
                Some((start, end)) => (Some(start.timestamp()), end.map(|e| e.timestamp())),
                None => (None, None),
            };
            let changed = tx.execute(
                "UPDATE users SET self_exclusion_start = ?1, self_exclusion_end = ?2
                 WHERE id = ?3",
                params![start, end, id.to_string()],
            )?;
            if changed == 0 {
                return Err(not_found("user"));
            }
            Ok(())
        })
    }

    pub fn set_limits(&self, id: Uuid, limits: ResponsibleGamingLimits) -> EngineResult<()> {
        self.transaction(|tx| {
            let changed = tx.execute(
                "UPDATE users SET
                    deposit_limit_daily = ?1, deposit_limit_weekly = ?2,
                    deposit_limit_monthly = ?3, wager_limit_daily = ?4,
                    wager_limit_weekly = ?5, wager_limit_monthly = ?6
                 WHERE id = ?7",
                params![
                    limits.deposit.daily,
                    limits.deposit.weekly,
                    limits.deposit.monthly,
                    limits.wager.daily,
                    limits.wager.weekly,
                    limits.wager.monthly,
                    id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(not_found("user"));
            }
            Ok(())
        })
    }
}
