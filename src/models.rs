//! Core domain types for the wager engine
//!
//! All monetary amounts are integer minor currency units (cents).
//! Decimal odds are stored as milli-odds: 1000 = even money winnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

/// KYC verification status, written by the identity subsystem and only read here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    InReview,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::InReview => "in_review",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(KycStatus::Pending),
            "in_review" => Some(KycStatus::InReview),
            "verified" => Some(KycStatus::Verified),
            "rejected" => Some(KycStatus::Rejected),
            _ => None,
        }
    }
}

/// Trailing-window caps in minor units. 0 = unlimited.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LimitWindows {
    pub daily: i64,
    pub weekly: i64,
    pub monthly: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResponsibleGamingLimits {
    pub deposit: LimitWindows,
    pub wager: LimitWindows,
}

/// User-initiated account suspension. `end = None` means permanent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfExclusion {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Minor units; equals the running sum of the user's ledger entries.
    pub balance: i64,
    pub kyc_status: KycStatus,
    pub limits: ResponsibleGamingLimits,
    pub self_exclusion: Option<SelfExclusion>,
    pub win_count: i64,
    pub loss_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Loose market payload as received from callers. Validated into [`Market`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub market_type: String,
    pub selection: String,
    /// Spread/total line in milli-points (e.g. -3500 = -3.5).
    pub line_milli: Option<i64>,
}

/// Validated market, tagged per market type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Market {
    Moneyline { selection: String },
    Spread { selection: String, line_milli: i64 },
    Total { selection: String, line_milli: i64 },
}

impl Market {
    /// Validate a loose descriptor into a tagged market. Unrecognized shapes
    /// are rejected here, never propagated into the engine.
    pub fn from_descriptor(desc: &MarketDescriptor) -> EngineResult<Self> {
        if desc.selection.trim().is_empty() {
            return Err(EngineError::Validation("market selection is empty".into()));
        }
        let selection = desc.selection.trim().to_string();
        match desc.market_type.as_str() {
            "moneyline" => Ok(Market::Moneyline { selection }),
            "spread" => match desc.line_milli {
                Some(line_milli) => Ok(Market::Spread {
                    selection,
                    line_milli,
                }),
                None => Err(EngineError::Validation(
                    "spread market requires a line".into(),
                )),
            },
            "total" => match desc.line_milli {
                Some(line_milli) => Ok(Market::Total {
                    selection,
                    line_milli,
                }),
                None => Err(EngineError::Validation(
                    "total market requires a line".into(),
                )),
            },
            other => Err(EngineError::Validation(format!(
                "unrecognized market type: {}",
                other
            ))),
        }
    }

    pub fn selection(&self) -> &str {
        match self {
            Market::Moneyline { selection }
            | Market::Spread { selection, .. }
            | Market::Total { selection, .. } => selection,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WagerStatus {
    Open,
    Matched,
    Disputed,
    Settled,
    Void,
    Canceled,
}

impl WagerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WagerStatus::Open => "OPEN",
            WagerStatus::Matched => "MATCHED",
            WagerStatus::Disputed => "DISPUTED",
            WagerStatus::Settled => "SETTLED",
            WagerStatus::Void => "VOID",
            WagerStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(WagerStatus::Open),
            "MATCHED" => Some(WagerStatus::Matched),
            "DISPUTED" => Some(WagerStatus::Disputed),
            "SETTLED" => Some(WagerStatus::Settled),
            "VOID" => Some(WagerStatus::Void),
            "CANCELED" => Some(WagerStatus::Canceled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WagerStatus::Settled | WagerStatus::Void | WagerStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub event_ref: String,
    pub event_ends_at: DateTime<Utc>,
    pub market: Market,
    /// Creator's full stake, minor units.
    pub stake: i64,
    /// Winnings multiplier in milli-units (1000 = even money). None = 1:1.
    pub odds_milli: Option<i64>,
    pub visibility: Visibility,
    pub status: WagerStatus,
    /// Sum of acceptance amounts so far; MATCHED exactly when == stake.
    pub matched_amount: i64,
    pub escrow_id: Option<String>,
    /// Escrow lock exhausted its retries; stakes were compensated back.
    pub escrow_failed: bool,
    pub winner_id: Option<Uuid>,
    pub loser_id: Option<Uuid>,
    /// Optimistic-concurrency version, bumped on every mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Wager {
    pub fn remaining_capacity(&self) -> i64 {
        self.stake - self.matched_amount
    }

    /// Total pot once fully matched: creator stake + matched counter-stakes.
    pub fn total_pot(&self) -> i64 {
        self.stake + self.matched_amount
    }
}

/// One counter-party's (possibly fractional) acceptance of a wager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acceptance {
    pub id: Uuid,
    pub wager_id: Uuid,
    pub accepter_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Deposit,
    Withdrawal,
    WagerStake,
    WagerPayout,
    Commission,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Deposit => "deposit",
            LedgerEntryType::Withdrawal => "withdrawal",
            LedgerEntryType::WagerStake => "wager_stake",
            LedgerEntryType::WagerPayout => "wager_payout",
            LedgerEntryType::Commission => "commission",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(LedgerEntryType::Deposit),
            "withdrawal" => Some(LedgerEntryType::Withdrawal),
            "wager_stake" => Some(LedgerEntryType::WagerStake),
            "wager_payout" => Some(LedgerEntryType::WagerPayout),
            "commission" => Some(LedgerEntryType::Commission),
            _ => None,
        }
    }
}

/// Append-only. `amount` is signed: debits negative, credits positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: Uuid,
    pub entry_type: LedgerEntryType,
    pub amount: i64,
    pub related_wager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::UnderReview => "under_review",
            DisputeStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(DisputeStatus::Open),
            "under_review" => Some(DisputeStatus::UnderReview),
            "resolved" => Some(DisputeStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeRuling {
    CreatorWins,
    AccepterWins,
    Void,
}

impl DisputeRuling {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeRuling::CreatorWins => "creator_wins",
            DisputeRuling::AccepterWins => "accepter_wins",
            DisputeRuling::Void => "void",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "creator_wins" => Some(DisputeRuling::CreatorWins),
            "accepter_wins" => Some(DisputeRuling::AccepterWins),
            "void" => Some(DisputeRuling::Void),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub outcome: DisputeRuling,
    pub notes: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub wager_id: Uuid,
    pub disputing_user_id: Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<DisputeResolution>,
    pub created_at: DateTime<Utc>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    /// Commission on winnings, basis points (500 = 5%).
    pub commission_rate_bps: u32,
    pub settlement_scan_secs: u64,
    pub adapter_timeout_secs: u64,
    pub escrow_retry_attempts: u32,
    pub escrow_backoff_base_ms: u64,
    pub conflict_retry_attempts: u32,
    pub oracle_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./matchbook.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let commission_rate_bps = std::env::var("COMMISSION_RATE_BPS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .unwrap_or(500);

        let settlement_scan_secs = std::env::var("SETTLEMENT_SCAN_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let adapter_timeout_secs = std::env::var("ADAPTER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let escrow_retry_attempts = std::env::var("ESCROW_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);

        let escrow_backoff_base_ms = std::env::var("ESCROW_BACKOFF_BASE_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse()
            .unwrap_or(250);

        let conflict_retry_attempts = std::env::var("CONFLICT_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let oracle_base_url = std::env::var("ORACLE_BASE_URL").ok();

        Ok(Self {
            database_path,
            port,
            commission_rate_bps,
            settlement_scan_secs,
            adapter_timeout_secs,
            escrow_retry_attempts,
            escrow_backoff_base_ms,
            conflict_retry_attempts,
            oracle_base_url,
        })
    }
}
