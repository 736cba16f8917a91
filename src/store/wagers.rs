//! Wager and acceptance rows
//!
//! Every wager mutation is version-guarded: `UPDATE … WHERE id = ? AND
//! version = ?`. Zero rows affected means a concurrent writer won the race
//! and the caller sees `Conflict`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::{Acceptance, Market, Visibility, Wager, WagerStatus};

use super::{not_found, opt_ts_to_datetime, parse_uuid, ts_to_datetime, Store};

const WAGER_COLUMNS: &str = "id, creator_id, event_ref, event_ends_at, market_json, \
    stake, odds_milli, visibility, status, matched_amount, escrow_id, escrow_failed, \
    winner_id, loser_id, version, created_at, matched_at, settled_at";

fn map_wager(row: &Row<'_>) -> rusqlite::Result<Wager> {
    let market_json: String = row.get(4)?;
    let market: Market = serde_json::from_str(&market_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let visibility_raw: String = row.get(7)?;
    let status_raw: String = row.get(8)?;
    let winner: Option<String> = row.get(12)?;
    let loser: Option<String> = row.get(13)?;

    Ok(Wager {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        creator_id: parse_uuid(&row.get::<_, String>(1)?)?,
        event_ref: row.get(2)?,
        event_ends_at: ts_to_datetime(row.get(3)?),
        market,
        stake: row.get(5)?,
        odds_milli: row.get(6)?,
        visibility: Visibility::from_str(&visibility_raw).unwrap_or(Visibility::Public),
        status: WagerStatus::from_str(&status_raw).unwrap_or(WagerStatus::Open),
        matched_amount: row.get(9)?,
        escrow_id: row.get(10)?,
        escrow_failed: row.get::<_, i64>(11)? != 0,
        winner_id: match winner {
            Some(s) => Some(parse_uuid(&s)?),
            None => None,
        },
        loser_id: match loser {
            Some(s) => Some(parse_uuid(&s)?),
            None => None,
        },
        version: row.get(14)?,
        created_at: ts_to_datetime(row.get(15)?),
        matched_at: opt_ts_to_datetime(row.get(16)?),
        settled_at: opt_ts_to_datetime(row.get(17)?),
    })
}

fn map_acceptance(row: &Row<'_>) -> rusqlite::Result<Acceptance> {
    Ok(Acceptance {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        wager_id: parse_uuid(&row.get::<_, String>(1)?)?,
        accepter_id: parse_uuid(&row.get::<_, String>(2)?)?,
        amount: row.get(3)?,
        created_at: ts_to_datetime(row.get(4)?),
    })
}

pub(crate) fn insert_wager_tx(tx: &Transaction<'_>, wager: &Wager) -> EngineResult<()> {
    let market_json = serde_json::to_string(&wager.market)
        .map_err(|e| EngineError::Internal(e.into()))?;
    tx.execute(
        "INSERT INTO wagers (id, creator_id, event_ref, event_ends_at, market_json,
            stake, odds_milli, visibility, status, matched_amount, escrow_id,
            escrow_failed, winner_id, loser_id, version, created_at, matched_at, settled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            wager.id.to_string(),
            wager.creator_id.to_string(),
            wager.event_ref,
            wager.event_ends_at.timestamp(),
            market_json,
            wager.stake,
            wager.odds_milli,
            wager.visibility.as_str(),
            wager.status.as_str(),
            wager.matched_amount,
            wager.escrow_id,
            wager.escrow_failed as i64,
            wager.winner_id.map(|id| id.to_string()),
            wager.loser_id.map(|id| id.to_string()),
            wager.version,
            wager.created_at.timestamp(),
            wager.matched_at.map(|t| t.timestamp()),
            wager.settled_at.map(|t| t.timestamp()),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_wager_tx(tx: &Transaction<'_>, id: Uuid) -> EngineResult<Wager> {
    let mut stmt = tx.prepare_cached(&format!(
        "SELECT {} FROM wagers WHERE id = ?1",
        WAGER_COLUMNS
    ))?;
    match stmt.query_row(params![id.to_string()], map_wager) {
        Ok(wager) => Ok(wager),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found("wager")),
        Err(e) => Err(e.into()),
    }
}

/// Write the mutable wager fields, guarded by the version the caller read.
/// A lost race surfaces as `Conflict` for the retry loop above.
pub(crate) fn update_wager_guarded_tx(tx: &Transaction<'_>, wager: &Wager) -> EngineResult<Wager> {
    let changed = tx.execute(
        "UPDATE wagers SET
            status = ?1, matched_amount = ?2, escrow_id = ?3, escrow_failed = ?4,
            winner_id = ?5, loser_id = ?6, matched_at = ?7, settled_at = ?8,
            version = version + 1
         WHERE id = ?9 AND version = ?10",
        params![
            wager.status.as_str(),
            wager.matched_amount,
            wager.escrow_id,
            wager.escrow_failed as i64,
            wager.winner_id.map(|id| id.to_string()),
            wager.loser_id.map(|id| id.to_string()),
            wager.matched_at.map(|t| t.timestamp()),
            wager.settled_at.map(|t| t.timestamp()),
            wager.id.to_string(),
            wager.version,
        ],
    )?;
    if changed == 0 {
        return Err(EngineError::Conflict);
    }
    let mut updated = wager.clone();
    updated.version += 1;
    Ok(updated)
}

pub(crate) fn insert_acceptance_tx(
    tx: &Transaction<'_>,
    acceptance: &Acceptance,
) -> EngineResult<()> {
    tx.execute(
        "INSERT INTO acceptances (id, wager_id, accepter_id, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            acceptance.id.to_string(),
            acceptance.wager_id.to_string(),
            acceptance.accepter_id.to_string(),
            acceptance.amount,
            acceptance.created_at.timestamp(),
        ],
    )?;
    Ok(())
}

pub(crate) fn acceptances_for_wager_tx(
    tx: &Transaction<'_>,
    wager_id: Uuid,
) -> EngineResult<Vec<Acceptance>> {
    let mut stmt = tx.prepare_cached(
        "SELECT id, wager_id, accepter_id, amount, created_at
         FROM acceptances WHERE wager_id = ?1 ORDER BY created_at",
    )?;
    let acceptances = stmt
        .query_map(params![wager_id.to_string()], map_acceptance)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(acceptances)
}

pub(crate) fn acceptance_count_tx(tx: &Transaction<'_>, wager_id: Uuid) -> EngineResult<i64> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM acceptances WHERE wager_id = ?1",
        params![wager_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

impl Store {
    pub fn get_wager(&self, id: Uuid) -> EngineResult<Wager> {
        self.transaction(|tx| get_wager_tx(tx, id))
    }

    pub fn acceptances_for_wager(&self, wager_id: Uuid) -> EngineResult<Vec<Acceptance>> {
        self.transaction(|tx| acceptances_for_wager_tx(tx, wager_id))
    }

    /// Public OPEN wagers for counter-party browsing, newest first.
    pub fn list_open_public(&self, limit: u32) -> EngineResult<Vec<Wager>> {
        self.transaction(|tx| {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {} FROM wagers
                 WHERE visibility = 'public' AND status = 'OPEN'
                 ORDER BY created_at DESC LIMIT ?1",
                WAGER_COLUMNS
            ))?;
            let wagers = stmt
                .query_map(params![limit], map_wager)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(wagers)
        })
    }

    /// MATCHED wagers past their event end, eligible for the settlement scan.
    /// DISPUTED wagers are excluded by status; escrow-failed ones were already
    /// compensated and wait for manual resolution.
    pub fn list_due_for_settlement(&self, now: DateTime<Utc>) -> EngineResult<Vec<Uuid>> {
        self.transaction(|tx| {
            let mut stmt = tx.prepare_cached(
                "SELECT id FROM wagers
                 WHERE status = 'MATCHED' AND escrow_failed = 0 AND event_ends_at <= ?1
                 ORDER BY event_ends_at",
            )?;
            let ids = stmt
                .query_map(params![now.timestamp()], |row| {
                    parse_uuid(&row.get::<_, String>(0)?)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponsibleGamingLimits;
    use tempfile::NamedTempFile;

    fn test_store() -> (Store, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let store = Store::new(temp.path().to_str().unwrap()).unwrap();
        (store, temp)
    }

    fn sample_wager(store: &Store) -> Wager {
        let creator = store.create_user(ResponsibleGamingLimits::default()).unwrap();
        let now = Utc::now();
        let wager = Wager {
            id: Uuid::new_v4(),
            creator_id: creator.id,
            event_ref: "nba-2026-finals-g7".to_string(),
            event_ends_at: now,
            market: Market::Moneyline {
                selection: "HOME".to_string(),
            },
            stake: 2000,
            odds_milli: None,
            visibility: Visibility::Public,
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
        store.transaction(|tx| insert_wager_tx(tx, &wager)).unwrap();
        wager
    }

    #[test]
    fn test_insert_and_round_trip() {
        let (store, _temp) = test_store();
        let wager = sample_wager(&store);

        let fetched = store.get_wager(wager.id).unwrap();
        assert_eq!(fetched.status, WagerStatus::Open);
        assert_eq!(fetched.market.selection(), "HOME");
        assert_eq!(fetched.version, 0);
    }

    #[test]
    fn test_version_guard_rejects_stale_write() {
        let (store, _temp) = test_store();
        let wager = sample_wager(&store);

        // First writer wins
        let mut first = wager.clone();
        first.status = WagerStatus::Canceled;
        store
            .transaction(|tx| update_wager_guarded_tx(tx, &first))
            .unwrap();

        // Second writer holds the stale version and loses
        let mut second = wager;
        second.status = WagerStatus::Matched;
        let result = store.transaction(|tx| update_wager_guarded_tx(tx, &second));
        assert!(matches!(result, Err(EngineError::Conflict)));
    }

    #[test]
    fn test_due_for_settlement_filters() {
        let (store, _temp) = test_store();
        let now = Utc::now();

        let open = sample_wager(&store);
        let mut matched = sample_wager(&store);
        matched.status = WagerStatus::Matched;
        store
            .transaction(|tx| update_wager_guarded_tx(tx, &matched))
            .unwrap();

        let mut disputed = sample_wager(&store);
        disputed.status = WagerStatus::Disputed;
        store
            .transaction(|tx| update_wager_guarded_tx(tx, &disputed))
            .unwrap();

        let mut failed = sample_wager(&store);
        failed.status = WagerStatus::Matched;
        failed.escrow_failed = true;
        store
            .transaction(|tx| update_wager_guarded_tx(tx, &failed))
            .unwrap();

        let due = store
            .list_due_for_settlement(now + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(due, vec![matched.id]);
        assert!(!due.contains(&open.id));
        assert!(!due.contains(&disputed.id));
        assert!(!due.contains(&failed.id));
    }
}
