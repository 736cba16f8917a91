//! Durable storage for the wager engine
//!
//! SQLite-backed: per-user balances, the append-only transaction log, wagers,
//! acceptances, disputes and idempotency records. Every balance-affecting
//! operation runs inside one SQLite transaction; wager rows carry a version
//! column for optimistic concurrency (write only if unchanged).

mod disputes;
mod ledger;
mod users;
mod wagers;

pub use ledger::LedgerAudit;

pub(crate) use disputes::{get_dispute_tx, insert_dispute_tx, resolve_dispute_guarded_tx};
pub(crate) use ledger::{
    append_entry_tx, get_idempotency_tx, record_idempotency_tx, window_sum_tx as window_sum,
};
pub(crate) use users::{bump_win_loss_tx, get_user_tx};
pub(crate) use wagers::{
    acceptance_count_tx, acceptances_for_wager_tx, get_wager_tx, insert_acceptance_tx,
    insert_wager_tx, update_wager_guarded_tx,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

/// Reserved account that accrues platform commission entries.
pub const PLATFORM_ACCOUNT: Uuid = Uuid::nil();

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    balance INTEGER NOT NULL DEFAULT 0,
    kyc_status TEXT NOT NULL DEFAULT 'pending',
    deposit_limit_daily INTEGER NOT NULL DEFAULT 0,
    deposit_limit_weekly INTEGER NOT NULL DEFAULT 0,
    deposit_limit_monthly INTEGER NOT NULL DEFAULT 0,
    wager_limit_daily INTEGER NOT NULL DEFAULT 0,
    wager_limit_weekly INTEGER NOT NULL DEFAULT 0,
    wager_limit_monthly INTEGER NOT NULL DEFAULT 0,
    self_exclusion_start INTEGER,
    self_exclusion_end INTEGER,
    win_count INTEGER NOT NULL DEFAULT 0,
    loss_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS wagers (
    id TEXT PRIMARY KEY,
    creator_id TEXT NOT NULL REFERENCES users(id),
    event_ref TEXT NOT NULL,
    event_ends_at INTEGER NOT NULL,
    market_json TEXT NOT NULL,
    stake INTEGER NOT NULL,
    odds_milli INTEGER,
    visibility TEXT NOT NULL,
    status TEXT NOT NULL,
    matched_amount INTEGER NOT NULL DEFAULT 0,
    escrow_id TEXT,
    escrow_failed INTEGER NOT NULL DEFAULT 0,
    winner_id TEXT,
    loser_id TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    matched_at INTEGER,
    settled_at INTEGER
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_wagers_status_ends
    ON wagers(status, escrow_failed, event_ends_at);

CREATE INDEX IF NOT EXISTS idx_wagers_visibility
    ON wagers(visibility, status, created_at DESC);

CREATE TABLE IF NOT EXISTS acceptances (
    id TEXT PRIMARY KEY,
    wager_id TEXT NOT NULL REFERENCES wagers(id),
    accepter_id TEXT NOT NULL REFERENCES users(id),
    amount INTEGER NOT NULL,
    created_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_acceptances_wager
    ON acceptances(wager_id);

CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    entry_type TEXT NOT NULL,
    amount INTEGER NOT NULL,
    related_wager_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_user_ts
    ON ledger_entries(user_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_ledger_user_type_ts
    ON ledger_entries(user_id, entry_type, created_at DESC);

CREATE TABLE IF NOT EXISTS disputes (
    id TEXT PRIMARY KEY,
    wager_id TEXT NOT NULL REFERENCES wagers(id),
    disputing_user_id TEXT NOT NULL REFERENCES users(id),
    reason TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open',
    outcome TEXT,
    notes TEXT,
    resolved_at INTEGER,
    created_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_disputes_wager
    ON disputes(wager_id);

CREATE TABLE IF NOT EXISTS idempotency_keys (
    key TEXT PRIMARY KEY,
    operation TEXT NOT NULL,
    response_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
) WITHOUT ROWID;
"#;

/// Handle to the engine database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database and apply the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to apply schema")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_platform_account()?;

        info!("Ledger store initialized at {}", db_path);
        Ok(store)
    }

    /// The platform account receives commission postings; it is created once
    /// and never touched by compliance gates.
    fn ensure_platform_account(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO users (id, balance, kyc_status, created_at)
             VALUES (?1, 0, 'verified', ?2)",
            rusqlite::params![PLATFORM_ACCOUNT.to_string(), Utc::now().timestamp()],
        )
        .context("Failed to seed platform account")?;
        Ok(())
    }

    /// Run `f` inside one SQLite transaction. Any error rolls back; the
    /// version-guarded writes inside surface lost races as `Conflict`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// ===== Row-mapping helpers shared by the submodules =====

pub(crate) fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn ts_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn opt_ts_to_datetime(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(ts_to_datetime)
}

pub(crate) fn not_found(what: &'static str) -> EngineError {
    EngineError::NotFound(what)
}
