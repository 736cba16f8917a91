//! HTTP surface for the wager engine
//!
//! Thin handlers over the engine operations. Every mutating route carries a
//! caller-supplied idempotency key; errors map to stable codes in a
//! `{"error": {"code", "message"}}` envelope.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{AcceptOutcome, CreateWagerRequest, FundsOutcome, WagerEngine};
use crate::errors::EngineError;
use crate::models::{
    Acceptance, Dispute, DisputeRuling, KycStatus, LedgerEntry, MarketDescriptor,
    ResponsibleGamingLimits, User, Visibility, Wager,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WagerEngine>,
}

/// Create the API router
pub fn create_router(engine: Arc<WagerEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/users", post(create_user))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/ledger", get(get_ledger))
        .route("/api/users/:id/deposit", post(deposit))
        .route("/api/users/:id/withdraw", post(withdraw))
        .route("/api/users/:id/kyc", post(set_kyc))
        .route("/api/wagers", post(create_wager).get(list_open_wagers))
        .route("/api/wagers/:id", get(get_wager))
        .route("/api/wagers/:id/accept", post(accept_wager))
        .route("/api/wagers/:id/cancel", post(cancel_wager))
        .route("/api/wagers/:id/dispute", post(open_dispute))
        .route("/api/disputes/:id", get(get_dispute))
        .route("/api/disputes/:id/resolve", post(resolve_dispute))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .engine
        .store()
        .create_user(req.limits.unwrap_or_default())?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.engine.store().get_user(id)?))
}

async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).min(500);
    let entries = state.engine.store().entries_for_user(id, limit)?;
    Ok(Json(LedgerResponse {
        count: entries.len(),
        entries,
    }))
}

async fn deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FundsRequest>,
) -> Result<Json<FundsOutcome>, ApiError> {
    let outcome = state
        .engine
        .deposit(id, req.amount_minor, &req.idempotency_key)
        .await?;
    Ok(Json(outcome))
}

async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FundsRequest>,
) -> Result<Json<FundsOutcome>, ApiError> {
    let outcome = state
        .engine
        .withdraw(id, req.amount_minor, &req.idempotency_key)
        .await?;
    Ok(Json(outcome))
}

/// Compliance-writer endpoint: the KYC subsystem records its decision here.
async fn set_kyc(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetKycRequest>,
) -> Result<Json<User>, ApiError> {
    let status = KycStatus::from_str(&req.status).ok_or_else(|| {
        ApiError(EngineError::Validation(format!(
            "unrecognized kyc status: {}",
            req.status
        )))
    })?;
    state.engine.store().set_kyc_status(id, status)?;
    Ok(Json(state.engine.store().get_user(id)?))
}

async fn create_wager(
    State(state): State<AppState>,
    Json(req): Json<CreateWagerBody>,
) -> Result<Json<Wager>, ApiError> {
    let wager = state
        .engine
        .create_wager(CreateWagerRequest {
            creator_id: req.creator_id,
            event_ref: req.event_ref,
            event_ends_at: req.event_ends_at,
            market: req.market,
            stake: req.stake_minor,
            odds_milli: req.odds_milli,
            visibility: req.visibility.unwrap_or(Visibility::Public),
            idempotency_key: req.idempotency_key,
        })
        .await?;
    Ok(Json(wager))
}

async fn list_open_wagers(
    State(state): State<AppState>,
    Query(params): Query<WagerQuery>,
) -> Result<Json<WagersResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).min(500);
    let wagers = state.engine.store().list_open_public(limit)?;
    Ok(Json(WagersResponse {
        count: wagers.len(),
        wagers,
    }))
}

async fn get_wager(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WagerDetail>, ApiError> {
    let wager = state.engine.store().get_wager(id)?;
    let acceptances = state.engine.store().acceptances_for_wager(id)?;
    Ok(Json(WagerDetail { wager, acceptances }))
}

async fn accept_wager(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AcceptWagerBody>,
) -> Result<Json<AcceptOutcome>, ApiError> {
    let outcome = state
        .engine
        .accept_wager(req.accepter_id, id, req.amount_minor, &req.idempotency_key)
        .await?;
    Ok(Json(outcome))
}

async fn cancel_wager(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelWagerBody>,
) -> Result<Json<Wager>, ApiError> {
    let wager = state
        .engine
        .cancel_wager(id, req.caller_id, &req.idempotency_key)
        .await?;
    Ok(Json(wager))
}

async fn open_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<OpenDisputeBody>,
) -> Result<Json<Dispute>, ApiError> {
    let dispute = state
        .engine
        .open_dispute(id, req.user_id, &req.reason, &req.idempotency_key)
        .await?;
    Ok(Json(dispute))
}

async fn get_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Dispute>, ApiError> {
    Ok(Json(state.engine.store().get_dispute(id)?))
}

async fn resolve_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveDisputeBody>,
) -> Result<Json<Dispute>, ApiError> {
    let ruling = DisputeRuling::from_str(&req.ruling).ok_or_else(|| {
        ApiError(EngineError::Validation(format!(
            "unrecognized ruling: {}",
            req.ruling
        )))
    })?;
    let dispute = state
        .engine
        .resolve_dispute(id, ruling, &req.notes, &req.idempotency_key)
        .await?;
    Ok(Json(dispute))
}

// ===== Request/Response Types =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    limits: Option<ResponsibleGamingLimits>,
}

#[derive(Deserialize)]
struct LedgerQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct LedgerResponse {
    count: usize,
    entries: Vec<LedgerEntry>,
}

#[derive(Deserialize)]
struct FundsRequest {
    amount_minor: i64,
    idempotency_key: String,
}

#[derive(Deserialize)]
struct SetKycRequest {
    status: String,
}

#[derive(Deserialize)]
struct CreateWagerBody {
    creator_id: Uuid,
    event_ref: String,
    event_ends_at: DateTime<Utc>,
    market: MarketDescriptor,
    stake_minor: i64,
    odds_milli: Option<i64>,
    visibility: Option<Visibility>,
    idempotency_key: String,
}

#[derive(Deserialize)]
struct WagerQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct WagersResponse {
    count: usize,
    wagers: Vec<Wager>,
}

#[derive(Serialize)]
struct WagerDetail {
    wager: Wager,
    acceptances: Vec<Acceptance>,
}

#[derive(Deserialize)]
struct AcceptWagerBody {
    accepter_id: Uuid,
    amount_minor: i64,
    idempotency_key: String,
}

#[derive(Deserialize)]
struct CancelWagerBody {
    caller_id: Uuid,
    idempotency_key: String,
}

#[derive(Deserialize)]
struct OpenDisputeBody {
    user_id: Uuid,
    reason: String,
    idempotency_key: String,
}

#[derive(Deserialize)]
struct ResolveDisputeBody {
    ruling: String,
    notes: String,
    idempotency_key: String,
}

// ===== Error Handling =====

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            EngineError::Precondition(kind) => {
                (StatusCode::UNPROCESSABLE_ENTITY, kind.to_string())
            }
            EngineError::Conflict => (StatusCode::CONFLICT, self.0.to_string()),
            EngineError::Adapter(_) => {
                tracing::error!("Adapter error: {}", self.0);
                (StatusCode::BAD_GATEWAY, "upstream adapter failure".to_string())
            }
            EngineError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.0.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
