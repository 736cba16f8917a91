//! Dispute rows
//!
//! Resolution is a read-then-conditional-write: the UPDATE only matches an
//! unresolved row, so an already-resolved dispute can never resolve twice.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, PreconditionKind};
use crate::models::{Dispute, DisputeResolution, DisputeRuling, DisputeStatus};

use super::{not_found, parse_uuid, ts_to_datetime, Store};

fn map_dispute(row: &Row<'_>) -> rusqlite::Result<Dispute> {
    let status_raw: String = row.get(4)?;
    let outcome_raw: Option<String> = row.get(5)?;
    let notes: Option<String> = row.get(6)?;
    let resolved_at: Option<i64> = row.get(7)?;

    let resolution = match (outcome_raw, resolved_at) {
        (Some(outcome), Some(ts)) => DisputeRuling::from_str(&outcome).map(|outcome| {
            DisputeResolution {
                outcome,
                notes: notes.unwrap_or_default(),
                resolved_at: ts_to_datetime(ts),
            }
        }),
        _ => None,
    };

    Ok(Dispute {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        wager_id: parse_uuid(&row.get::<_, String>(1)?)?,
        disputing_user_id: parse_uuid(&row.get::<_, String>(2)?)?,
        reason: row.get(3)?,
        status: DisputeStatus::from_str(&status_raw).unwrap_or(DisputeStatus::Open),
        resolution,
        created_at: ts_to_datetime(row.get(8)?),
    })
}

pub(crate) fn insert_dispute_tx(tx: &Transaction<'_>, dispute: &Dispute) -> EngineResult<()> {
    tx.execute(
        "INSERT INTO disputes (id, wager_id, disputing_user_id, reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            dispute.id.to_string(),
            dispute.wager_id.to_string(),
            dispute.disputing_user_id.to_string(),
            dispute.reason,
            dispute.status.as_str(),
            dispute.created_at.timestamp(),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_dispute_tx(tx: &Transaction<'_>, id: Uuid) -> EngineResult<Dispute> {
    let mut stmt = tx.prepare_cached(
        "SELECT id, wager_id, disputing_user_id, reason, status, outcome, notes,
                resolved_at, created_at
         FROM disputes WHERE id = ?1",
    )?;
    match stmt.query_row(params![id.to_string()], map_dispute) {
        Ok(dispute) => Ok(dispute),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found("dispute")),
        Err(e) => Err(e.into()),
    }
}

/// Conditional write: only an unresolved dispute transitions to resolved.
pub(crate) fn resolve_dispute_guarded_tx(
    tx: &Transaction<'_>,
    id: Uuid,
    ruling: DisputeRuling,
    notes: &str,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let changed = tx.execute(
        "UPDATE disputes SET status = 'resolved', outcome = ?1, notes = ?2, resolved_at = ?3
         WHERE id = ?4 AND status IN ('open', 'under_review')",
        params![ruling.as_str(), notes, now.timestamp(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(EngineError::Precondition(PreconditionKind::WrongState));
    }
    Ok(())
}

impl Store {
    pub fn get_dispute(&self, id: Uuid) -> EngineResult<Dispute> {
        self.transaction(|tx| get_dispute_tx(tx, id))
    }
}
