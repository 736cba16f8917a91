//! Append-only transaction log
//!
//! A posting appends the signed entry and adjusts the user's balance in the
//! same statement pair, always inside the caller's transaction, so the
//! invariant `balance == sum(entries)` can never be observed broken.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::models::{LedgerEntry, LedgerEntryType};

use super::{parse_uuid, ts_to_datetime, Store};

fn map_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let type_raw: String = row.get(2)?;
    let related: Option<String> = row.get(4)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        entry_type: LedgerEntryType::from_str(&type_raw)
            .unwrap_or(LedgerEntryType::Deposit),
        amount: row.get(3)?,
        related_wager_id: match related {
            Some(s) => Some(parse_uuid(&s)?),
            None => None,
        },
        created_at: ts_to_datetime(row.get(5)?),
    })
}

/// Append one signed entry and move the balance with it.
pub(crate) fn append_entry_tx(
    tx: &Transaction<'_>,
    user_id: Uuid,
    entry_type: LedgerEntryType,
    amount: i64,
    related_wager_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> EngineResult<i64> {
    tx.execute(
        "INSERT INTO ledger_entries (user_id, entry_type, amount, related_wager_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id.to_string(),
            entry_type.as_str(),
            amount,
            related_wager_id.map(|id| id.to_string()),
            now.timestamp(),
        ],
    )?;
    let entry_id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE users SET balance = balance + ?1 WHERE id = ?2",
        params![amount, user_id.to_string()],
    )?;
    Ok(entry_id)
}

/// Trailing-window sum for responsible-gaming checks. Deposits count their
/// credits, wager stakes count their debits; compensating reversals are
/// excluded so a refunded stake does not consume limit headroom twice.
pub(crate) fn window_sum_tx(
    tx: &Transaction<'_>,
    user_id: Uuid,
    entry_type: LedgerEntryType,
    since: DateTime<Utc>,
) -> EngineResult<i64> {
    let sql = match entry_type {
        LedgerEntryType::Deposit => {
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
             WHERE user_id = ?1 AND entry_type = 'deposit'
               AND amount > 0 AND created_at >= ?2"
        }
        _ => {
            "SELECT COALESCE(SUM(-amount), 0) FROM ledger_entries
             WHERE user_id = ?1 AND entry_type = 'wager_stake'
               AND amount < 0 AND created_at >= ?2"
        }
    };
    let sum: i64 = tx.query_row(sql, params![user_id.to_string(), since.timestamp()], |row| {
        row.get(0)
    })?;
    Ok(sum)
}

/// Audit view of a user's ledger, used by tests and the read API.
#[derive(Debug, Clone)]
pub struct LedgerAudit {
    pub balance: i64,
    pub entry_sum: i64,
}

impl LedgerAudit {
    pub fn consistent(&self) -> bool {
        self.balance == self.entry_sum
    }
}

pub(crate) fn get_idempotency_tx(
    tx: &Transaction<'_>,
    key: &str,
) -> EngineResult<Option<(String, String)>> {
    let mut stmt = tx
        .prepare_cached("SELECT operation, response_json FROM idempotency_keys WHERE key = ?1")?;
    match stmt.query_row(params![key], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    }) {
        Ok(pair) => Ok(Some(pair)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn record_idempotency_tx(
    tx: &Transaction<'_>,
    key: &str,
    operation: &str,
    response_json: &str,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    tx.execute(
        "INSERT INTO idempotency_keys (key, operation, response_json, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![key, operation, response_json, now.timestamp()],
    )?;
    Ok(())
}

impl Store {
    /// Recent ledger entries for a user, newest first.
    pub fn entries_for_user(&self, user_id: Uuid, limit: u32) -> EngineResult<Vec<LedgerEntry>> {
        self.transaction(|tx| {
            let mut stmt = tx.prepare_cached(
                "SELECT id, user_id, entry_type, amount, related_wager_id, created_at
                 FROM ledger_entries WHERE user_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let entries = stmt
                .query_map(params![user_id.to_string(), limit], map_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Compare the stored balance against the running entry sum.
    pub fn audit_user(&self, user_id: Uuid) -> EngineResult<LedgerAudit> {
        self.transaction(|tx| {
            let balance: i64 = tx.query_row(
                "SELECT balance FROM users WHERE id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;
            let entry_sum: i64 = tx.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(LedgerAudit { balance, entry_sum })
        })
    }
}
