//! End-to-end wager lifecycle scenarios against a real on-disk database,
//! the paper escrow adapter, and a fixed-results oracle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use matchbook_backend::adapters::{OracleResult, PaperEscrowAdapter, StaticOracleAdapter};
use matchbook_backend::engine::{CreateWagerRequest, EngineConfig, WagerEngine};
use matchbook_backend::errors::{EngineError, PreconditionKind};
use matchbook_backend::models::{
    DisputeRuling, DisputeStatus, KycStatus, LimitWindows, MarketDescriptor,
    ResponsibleGamingLimits, Visibility, WagerStatus,
};
use matchbook_backend::store::{Store, PLATFORM_ACCOUNT};

struct Harness {
    engine: Arc<WagerEngine>,
    escrow: Arc<PaperEscrowAdapter>,
    oracle: Arc<StaticOracleAdapter>,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.db");
    let store = Store::new(path.to_str().unwrap()).unwrap();
    let escrow = Arc::new(PaperEscrowAdapter::new());
    let oracle = Arc::new(StaticOracleAdapter::new());
    let config = EngineConfig {
        escrow_backoff_base_ms: 1,
        adapter_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let engine = Arc::new(WagerEngine::new(
        store,
        escrow.clone(),
        oracle.clone(),
        config,
    ));
    Harness {
        engine,
        escrow,
        oracle,
        _dir: dir,
    }
}

async fn funded_user(h: &Harness, balance: i64) -> Uuid {
    funded_user_with_limits(h, balance, ResponsibleGamingLimits::default()).await
}

async fn funded_user_with_limits(
    h: &Harness,
    balance: i64,
    limits: ResponsibleGamingLimits,
) -> Uuid {
    let user = h.engine.store().create_user(limits).unwrap();
    h.engine
        .store()
        .set_kyc_status(user.id, KycStatus::Verified)
        .unwrap();
    if balance > 0 {
        h.engine
            .deposit(user.id, balance, &format!("seed-{}", user.id))
            .await
            .unwrap();
    }
    user.id
}

fn moneyline(selection: &str) -> MarketDescriptor {
    MarketDescriptor {
        market_type: "moneyline".to_string(),
        selection: selection.to_string(),
        line_milli: None,
    }
}

fn wager_request(creator: Uuid, stake: i64, event_ref: &str) -> CreateWagerRequest {
    CreateWagerRequest {
        creator_id: creator,
        // Already past its event end, so a scan picks it up immediately
        event_ends_at: Utc::now() - ChronoDuration::minutes(5),
        event_ref: event_ref.to_string(),
        market: moneyline("HOME"),
        stake,
        odds_milli: None,
        visibility: Visibility::Public,
        idempotency_key: Uuid::new_v4().to_string(),
    }
}

fn balance(h: &Harness, user_id: Uuid) -> i64 {
    h.engine.store().get_user(user_id).unwrap().balance
}

fn assert_ledger_consistent(h: &Harness, user_id: Uuid) {
    let audit = h.engine.store().audit_user(user_id).unwrap();
    assert!(
        audit.consistent(),
        "balance {} != entry sum {} for {}",
        audit.balance,
        audit.entry_sum,
        user_id
    );
}

// Creator stakes $20 at even money against a $20 acceptance; HOME wins.
// Winner payout $39 ($20 stake back + $20 winnings - $1 commission).
#[tokio::test]
async fn test_home_win_settles_with_commission() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-home-win"))
        .await
        .unwrap();
    assert_eq!(wager.status, WagerStatus::Open);
    assert_eq!(balance(&h, creator), 10_000);

    let outcome = h
        .engine
        .accept_wager(accepter, wager.id, 2_000, "accept-a")
        .await
        .unwrap();
    assert_eq!(outcome.wager.status, WagerStatus::Matched);
    assert_eq!(balance(&h, creator), 8_000);
    assert_eq!(balance(&h, accepter), 3_000);
    assert_eq!(h.escrow.locked_amount(wager.id), Some(4_000));

    h.oracle
        .set_result("evt-home-win", OracleResult::final_result(Some("HOME")));
    let settled = h.engine.run_settlement_scan().await.unwrap();
    assert_eq!(settled, 1);

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Settled);
    assert_eq!(wager.winner_id, Some(creator));
    assert_eq!(wager.loser_id, Some(accepter));

    assert_eq!(balance(&h, creator), 11_900);
    assert_eq!(balance(&h, accepter), 3_000);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 100);
    assert!(h.escrow.release_calls() >= 1);

    // Pot conservation across the three parties
    let pot_out = (balance(&h, creator) - 8_000)
        + (balance(&h, accepter) - 3_000)
        + balance(&h, PLATFORM_ACCOUNT);
    assert_eq!(pot_out, 4_000);

    assert_ledger_consistent(&h, creator);
    assert_ledger_consistent(&h, accepter);
    assert_ledger_consistent(&h, PLATFORM_ACCOUNT);

    let creator_user = h.engine.store().get_user(creator).unwrap();
    let accepter_user = h.engine.store().get_user(accepter).unwrap();
    assert_eq!(creator_user.win_count, 1);
    assert_eq!(accepter_user.loss_count, 1);
}

// A push refunds both stakes in full with zero commission.
#[tokio::test]
async fn test_push_voids_and_refunds() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-push"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-b")
        .await
        .unwrap();

    h.oracle
        .set_result("evt-push", OracleResult::final_result(None));
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 1);

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Void);
    assert_eq!(balance(&h, creator), 10_000);
    assert_eq!(balance(&h, accepter), 5_000);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 0);
    assert!(h.escrow.refund_calls() >= 1);

    // A second scan finds nothing left to do
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 0);
}

#[tokio::test]
async fn test_deposit_limit_enforced() {
    let h = harness();
    let limits = ResponsibleGamingLimits {
        deposit: LimitWindows {
            daily: 3_000,
            weekly: 0,
            monthly: 0,
        },
        wager: LimitWindows::default(),
    };
    let user = funded_user_with_limits(&h, 1_000, limits).await;

    let err = h
        .engine
        .deposit(user, 5_000, "dep-over-limit")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::LimitExceeded)
    ));
    assert_eq!(balance(&h, user), 1_000);

    // Exactly up to the cap is still allowed
    h.engine.deposit(user, 2_000, "dep-to-cap").await.unwrap();
    assert_eq!(balance(&h, user), 3_000);
}

#[tokio::test]
async fn test_self_excluded_cannot_create() {
    let h = harness();
    let user = funded_user(&h, 10_000).await;
    h.engine
        .store()
        .set_self_exclusion(user, Some((Utc::now(), None)))
        .unwrap();

    let err = h
        .engine
        .create_wager(wager_request(user, 2_000, "evt-excluded"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::SelfExcluded)
    ));

    // Exclusion never traps funds: withdrawal still works
    let outcome = h.engine.withdraw(user, 4_000, "wd-excluded").await.unwrap();
    assert_eq!(outcome.balance_after, 6_000);
}

#[tokio::test]
async fn test_unverified_kyc_blocks_money_movement() {
    let h = harness();
    let user = h
        .engine
        .store()
        .create_user(ResponsibleGamingLimits::default())
        .unwrap();

    let err = h.engine.deposit(user.id, 1_000, "dep-kyc").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::NotVerified)
    ));
}

// Two accepters cover a $20 stake $12/$8; settlement runs per acceptance
// and the totals come out identical to the single-acceptance case.
#[tokio::test]
async fn test_fractional_acceptance_settles_per_slice() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter_a = funded_user(&h, 5_000).await;
    let accepter_b = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-fractional"))
        .await
        .unwrap();

    let first = h
        .engine
        .accept_wager(accepter_a, wager.id, 1_200, "frac-a")
        .await
        .unwrap();
    assert_eq!(first.wager.status, WagerStatus::Open);
    assert_eq!(first.wager.matched_amount, 1_200);

    let second = h
        .engine
        .accept_wager(accepter_b, wager.id, 800, "frac-b")
        .await
        .unwrap();
    assert_eq!(second.wager.status, WagerStatus::Matched);
    assert_eq!(h.escrow.locked_amount(wager.id), Some(4_000));

    h.oracle
        .set_result("evt-fractional", OracleResult::final_result(Some("HOME")));
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 1);

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Settled);
    assert_eq!(wager.winner_id, Some(creator));
    // No single loser with multiple acceptances
    assert_eq!(wager.loser_id, None);

    // Per-slice commission: 5% of 1200 + 5% of 800 = 100
    assert_eq!(balance(&h, creator), 11_900);
    assert_eq!(balance(&h, accepter_a), 3_800);
    assert_eq!(balance(&h, accepter_b), 4_200);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 100);

    assert_ledger_consistent(&h, creator);
    assert_ledger_consistent(&h, accepter_a);
    assert_ledger_consistent(&h, accepter_b);
}

#[tokio::test]
async fn test_concurrent_accept_single_winner() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-race"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = h.engine.clone();
        let accepter = funded_user(&h, 5_000).await;
        let wager_id = wager.id;
        handles.push(tokio::spawn(async move {
            engine
                .accept_wager(accepter, wager_id, 2_000, &format!("race-{}", i))
                .await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome.wager.status, WagerStatus::Matched);
                wins += 1;
            }
            Err(EngineError::Precondition(PreconditionKind::WrongState)) => {}
            Err(other) => panic!("unexpected acceptance error: {}", other),
        }
    }
    assert_eq!(wins, 1);

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Matched);
    assert_eq!(wager.matched_amount, 2_000);
    assert_eq!(h.engine.store().acceptances_for_wager(wager.id).unwrap().len(), 1);
    // Only one acceptance debited the creator
    assert_eq!(balance(&h, creator), 8_000);
}

#[tokio::test]
async fn test_cancel_rules() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let stranger = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-cancel"))
        .await
        .unwrap();

    let err = h
        .engine
        .cancel_wager(wager.id, stranger, "cancel-stranger")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let canceled = h
        .engine
        .cancel_wager(wager.id, creator, "cancel-ok")
        .await
        .unwrap();
    assert_eq!(canceled.status, WagerStatus::Canceled);

    // Terminal: cannot be accepted afterwards
    let err = h
        .engine
        .accept_wager(stranger, wager.id, 2_000, "accept-canceled")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::WrongState)
    ));
}

#[tokio::test]
async fn test_cancel_rejected_once_accepted() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-cancel-late"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 500, "partial")
        .await
        .unwrap();

    let err = h
        .engine
        .cancel_wager(wager.id, creator, "cancel-late")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::WrongState)
    ));
}

// Escrow lock exhausting its retries flags the wager and writes explicit
// compensating entries; the scan then skips it.
#[tokio::test]
async fn test_escrow_failure_compensates_both_sides() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    h.escrow.fail_next_locks(10);

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-escrow-down"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-escrow-down")
        .await
        .unwrap();

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Matched);
    assert!(wager.escrow_failed);
    assert!(wager.escrow_id.is_none());

    // Stakes compensated back, explicitly on the ledger
    assert_eq!(balance(&h, creator), 10_000);
    assert_eq!(balance(&h, accepter), 5_000);
    assert_ledger_consistent(&h, creator);
    assert_ledger_consistent(&h, accepter);

    h.oracle
        .set_result("evt-escrow-down", OracleResult::final_result(Some("HOME")));
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 0);
}

#[tokio::test]
async fn test_in_progress_defers_settlement() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-live"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-live")
        .await
        .unwrap();

    // Oracle default for unknown events is InProgress
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 0);
    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Matched);

    h.oracle
        .set_result("evt-live", OracleResult::final_result(Some("AWAY")));
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 1);
    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Settled);
    assert_eq!(wager.winner_id, Some(accepter));
    assert_eq!(balance(&h, accepter), 6_900);
}

#[tokio::test]
async fn test_dispute_removes_wager_from_scan_and_resolves_once() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-dispute"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-dispute")
        .await
        .unwrap();

    // A non-party cannot dispute
    let stranger = funded_user(&h, 1_000).await;
    let err = h
        .engine
        .open_dispute(wager.id, stranger, "not my wager", "dis-stranger")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let dispute = h
        .engine
        .open_dispute(wager.id, accepter, "result looks wrong", "dis-open")
        .await
        .unwrap();
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(
        h.engine.store().get_wager(wager.id).unwrap().status,
        WagerStatus::Disputed
    );

    // Disputed wagers never auto-settle, even with a final result on feed
    h.oracle
        .set_result("evt-dispute", OracleResult::final_result(Some("HOME")));
    assert_eq!(h.engine.run_settlement_scan().await.unwrap(), 0);

    let resolved = h
        .engine
        .resolve_dispute(dispute.id, DisputeRuling::CreatorWins, "video review", "dis-res")
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Settled);
    assert_eq!(balance(&h, creator), 11_900);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 100);

    // A second ruling with a fresh key hits the exactly-once guard
    let err = h
        .engine
        .resolve_dispute(dispute.id, DisputeRuling::Void, "again", "dis-res-2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::WrongState)
    ));
    assert_eq!(balance(&h, creator), 11_900);
}

#[tokio::test]
async fn test_dispute_void_ruling_refunds() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-dispute-void"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-dv")
        .await
        .unwrap();

    let dispute = h
        .engine
        .open_dispute(wager.id, creator, "event abandoned", "dv-open")
        .await
        .unwrap();
    h.engine
        .resolve_dispute(dispute.id, DisputeRuling::Void, "abandoned", "dv-res")
        .await
        .unwrap();

    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Void);
    assert_eq!(balance(&h, creator), 10_000);
    assert_eq!(balance(&h, accepter), 5_000);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 0);
}

// A wager whose escrow lock failed was already compensated; any ruling on
// it resolves the dispute but moves no money.
#[tokio::test]
async fn test_dispute_ruling_on_escrow_failed_wager_is_financially_void() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    h.escrow.fail_next_locks(10);

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-ef-dispute"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-ef-dispute")
        .await
        .unwrap();
    assert!(h.engine.store().get_wager(wager.id).unwrap().escrow_failed);

    let dispute = h
        .engine
        .open_dispute(wager.id, creator, "never escrowed", "ef-dis-open")
        .await
        .unwrap();
    let resolved = h
        .engine
        .resolve_dispute(dispute.id, DisputeRuling::CreatorWins, "moot", "ef-dis-res")
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);

    // Ruling recorded, wager voided, no money moved and no escrow calls
    let wager = h.engine.store().get_wager(wager.id).unwrap();
    assert_eq!(wager.status, WagerStatus::Void);
    assert_eq!(wager.winner_id, None);
    assert_eq!(balance(&h, creator), 10_000);
    assert_eq!(balance(&h, accepter), 5_000);
    assert_eq!(balance(&h, PLATFORM_ACCOUNT), 0);
    assert_eq!(h.escrow.release_calls(), 0);
    assert_eq!(h.escrow.refund_calls(), 0);
    assert_ledger_consistent(&h, creator);
    assert_ledger_consistent(&h, accepter);
}

#[tokio::test]
async fn test_dispute_on_settled_wager_rejected() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-too-late"))
        .await
        .unwrap();
    h.engine
        .accept_wager(accepter, wager.id, 2_000, "accept-late")
        .await
        .unwrap();
    h.oracle
        .set_result("evt-too-late", OracleResult::final_result(Some("HOME")));
    h.engine.run_settlement_scan().await.unwrap();

    let err = h
        .engine
        .open_dispute(wager.id, accepter, "sore loser", "dis-late")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::WrongState)
    ));
}

// A replayed idempotency key returns the recorded outcome without
// re-applying any financial effect.
#[tokio::test]
async fn test_idempotent_replay_never_double_applies() {
    let h = harness();
    let user = funded_user(&h, 0).await;

    let first = h.engine.deposit(user, 1_000, "dep-once").await.unwrap();
    let replay = h.engine.deposit(user, 1_000, "dep-once").await.unwrap();
    assert_eq!(first.balance_after, 1_000);
    assert_eq!(replay.balance_after, 1_000);
    assert_eq!(balance(&h, user), 1_000);

    // Same key, different operation is rejected outright
    let err = h.engine.withdraw(user, 500, "dep-once").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(balance(&h, user), 1_000);
}

#[tokio::test]
async fn test_accept_replay_is_single_acceptance() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let accepter = funded_user(&h, 5_000).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-replay"))
        .await
        .unwrap();

    let first = h
        .engine
        .accept_wager(accepter, wager.id, 2_000, "accept-replay")
        .await
        .unwrap();
    let replay = h
        .engine
        .accept_wager(accepter, wager.id, 2_000, "accept-replay")
        .await
        .unwrap();
    assert_eq!(first.acceptance.id, replay.acceptance.id);

    assert_eq!(balance(&h, creator), 8_000);
    assert_eq!(balance(&h, accepter), 3_000);
    assert_eq!(h.engine.store().acceptances_for_wager(wager.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_withdraw_insufficient_funds() {
    let h = harness();
    let user = funded_user(&h, 500).await;

    let err = h.engine.withdraw(user, 1_000, "wd-over").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::InsufficientFunds)
    ));
    assert_eq!(balance(&h, user), 500);
}

#[tokio::test]
async fn test_accept_insufficient_funds_rejected() {
    let h = harness();
    let creator = funded_user(&h, 10_000).await;
    let poor = funded_user(&h, 100).await;

    let wager = h
        .engine
        .create_wager(wager_request(creator, 2_000, "evt-poor"))
        .await
        .unwrap();
    let err = h
        .engine
        .accept_wager(poor, wager.id, 2_000, "accept-poor")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Precondition(PreconditionKind::InsufficientFunds)
    ));

    // Nothing moved, wager still open for someone solvent
    assert_eq!(balance(&h, poor), 100);
    assert_eq!(
        h.engine.store().get_wager(wager.id).unwrap().status,
        WagerStatus::Open
    );
}
