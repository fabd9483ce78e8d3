//! Handlers for `/gamification` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/gamification/rules` | Create a rule |
//! | `PATCH` | `/gamification/rules/:id` | Partial rule update |
//! | `GET`   | `/gamification/profile` | Caller's points and level |
//! | `GET`   | `/gamification/history` | Caller's transactions, newest first |
//! | `GET`   | `/gamification/leaderboard` | Top users by points |
//! | `POST`  | `/gamification/complete` | Award a self-reported activity |
//! | `POST`  | `/gamification/claim/:tx` | Claim a transaction |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use meander_core::gamify::{
  Activity, ClaimOutcome, GamificationStore, LeaderboardEntry, NewRule,
  PointsTransaction, Profile, RuleUpdate,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::CallerId, error::ApiError};

// ─── Rules ───────────────────────────────────────────────────────────────────

fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct CreateRuleBody {
  pub activity:    Activity,
  pub points:      i64,
  pub description: String,
  #[serde(default = "default_true")]
  pub is_active:   bool,
}

/// `POST /gamification/rules`
pub async fn create_rule<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateRuleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GamificationStore + 'static,
{
  let activity = body.activity;
  let rule = state
    .store
    .create_rule(NewRule {
      activity,
      points:      body.points,
      description: body.description,
      is_active:   body.is_active,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::BadRequest(format!("activity {activity} already has a rule"))
    })?;
  Ok((StatusCode::CREATED, Json(rule)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRuleBody {
  pub points:      Option<i64>,
  pub description: Option<String>,
  pub is_active:   Option<bool>,
}

/// `PATCH /gamification/rules/:id`
pub async fn update_rule<S>(
  State(state): State<AppState<S>>,
  Path(rule_id): Path<Uuid>,
  Json(body): Json<UpdateRuleBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GamificationStore + 'static,
{
  let rule = state
    .store
    .update_rule(rule_id, RuleUpdate {
      points:      body.points,
      description: body.description,
      is_active:   body.is_active,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("rule {rule_id} not found")))?;
  Ok(Json(rule))
}

// ─── Profile and ledger reads ────────────────────────────────────────────────

/// `GET /gamification/profile`
pub async fn profile<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
) -> Result<Json<Profile>, ApiError>
where
  S: GamificationStore + 'static,
{
  let profile = state.store.profile(user_id).await.map_err(ApiError::store)?;
  Ok(Json(profile))
}

/// `GET /gamification/history`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
) -> Result<Json<Vec<PointsTransaction>>, ApiError>
where
  S: GamificationStore + 'static,
{
  let txs = state.store.history(user_id).await.map_err(ApiError::store)?;
  Ok(Json(txs))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
  pub limit: Option<usize>,
}

/// `GET /gamification/leaderboard[?limit=<n>]`
pub async fn leaderboard<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<LeaderboardParams>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError>
where
  S: GamificationStore + 'static,
{
  let board = state
    .store
    .leaderboard(params.limit.unwrap_or(10))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(board))
}

// ─── Self-reported activities ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
  pub activity: Activity,
}

/// `POST /gamification/complete` — award the caller for a self-reported
/// activity (registration, sharing, reviewing). Repeatable: these carry no
/// idempotency key.
pub async fn complete<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<CompleteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GamificationStore + 'static,
{
  let tx = state
    .store
    .complete_activity(user_id, body.activity)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no active rule for activity {}", body.activity))
    })?;
  Ok((StatusCode::CREATED, Json(tx)))
}

// ─── Claim ───────────────────────────────────────────────────────────────────

/// `POST /gamification/claim/:tx`
pub async fn claim<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Path(tx_id): Path<Uuid>,
) -> Result<Json<PointsTransaction>, ApiError>
where
  S: GamificationStore + 'static,
{
  match state.store.claim(user_id, tx_id).await.map_err(ApiError::store)? {
    ClaimOutcome::Claimed(tx) => Ok(Json(tx)),
    ClaimOutcome::AlreadyClaimed => Err(ApiError::BadRequest(format!(
      "transaction {tx_id} already claimed"
    ))),
    ClaimOutcome::NotFound => Err(ApiError::NotFound(format!(
      "transaction {tx_id} not found"
    ))),
  }
}
