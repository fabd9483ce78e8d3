//! Handlers for `/routes` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/routes/start` | Start a circuit traversal |
//! | `POST` | `/routes/trace` | Record a GPS ping or POI visit |
//! | `POST` | `/routes/remove-poi` | Exclude a POI from the required set |
//! | `POST` | `/routes/add-poi-back` | Undo a removal |
//! | `POST` | `/routes/save` | Save a completed navigation route |
//! | `GET`  | `/routes/:id` | Route detail read model |
//! | `GET`  | `/routes` | The caller's routes, newest first |
//!
//! All endpoints identify the caller through the `x-user-id` header.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use meander_core::{
  engine::{RemovalOutcome, ReinstateOutcome, RouteDetail, TraceOutcome},
  gamify::RewardSink,
  route::{Navigation, Route, TransportMode},
  store::RouteStore,
  trace::Coordinates,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::CallerId, error::ApiError};

// ─── Start ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub circuit_id: Uuid,
  pub latitude:   f64,
  pub longitude:  f64,
  /// POI visited at the starting position, if the route begins at one.
  pub poi_id:     Option<Uuid>,
}

/// `POST /routes/start`
pub async fn start<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let started = state
    .engine
    .start_route(
      user_id,
      body.circuit_id,
      Coordinates { latitude: body.latitude, longitude: body.longitude },
      body.poi_id,
    )
    .await
    .map_err(ApiError::from_engine)?;
  Ok((StatusCode::CREATED, Json(started)))
}

// ─── Trace ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TraceBody {
  pub route_id:  Uuid,
  pub latitude:  f64,
  pub longitude: f64,
  pub poi_id:    Option<Uuid>,
}

/// `POST /routes/trace`
pub async fn trace<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<TraceBody>,
) -> Result<Json<TraceOutcome>, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let outcome = state
    .engine
    .add_visited_trace(
      body.route_id,
      user_id,
      Coordinates { latitude: body.latitude, longitude: body.longitude },
      body.poi_id,
    )
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(outcome))
}

// ─── Remove / re-add ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PoiBody {
  pub route_id: Uuid,
  pub poi_id:   Uuid,
}

/// `POST /routes/remove-poi`
pub async fn remove_poi<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<PoiBody>,
) -> Result<Json<RemovalOutcome>, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let outcome = state
    .engine
    .remove_poi(body.route_id, user_id, body.poi_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(outcome))
}

/// `POST /routes/add-poi-back`
pub async fn add_poi_back<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<PoiBody>,
) -> Result<Json<ReinstateOutcome>, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let outcome = state
    .engine
    .add_poi_back(body.route_id, user_id, body.poi_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(outcome))
}

// ─── Save navigation ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SaveBody {
  pub poi_id:         Uuid,
  pub distance_m:     f64,
  pub duration_s:     u32,
  pub transport_mode: TransportMode,
  #[serde(default)]
  pub path:           Vec<Coordinates>,
  #[serde(default)]
  pub points_earned:  u32,
}

/// `POST /routes/save` — persist a finished standalone-POI navigation.
pub async fn save<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Json(body): Json<SaveBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let route = state
    .engine
    .save_navigation_route(user_id, body.poi_id, Navigation {
      distance_m:     body.distance_m,
      duration_s:     body.duration_s,
      transport_mode: body.transport_mode,
      path:           body.path,
      points_earned:  body.points_earned,
    })
    .await
    .map_err(ApiError::from_engine)?;
  Ok((StatusCode::CREATED, Json(route)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /routes/:id`
pub async fn detail<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Path(route_id): Path<Uuid>,
) -> Result<Json<RouteDetail>, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let detail = state
    .engine
    .route_detail(route_id, user_id)
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /routes[?limit=<n>&offset=<n>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CallerId(user_id): CallerId,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Route>>, ApiError>
where
  S: RouteStore + RewardSink + 'static,
{
  let routes = state
    .engine
    .list_routes(
      user_id,
      params.limit.unwrap_or(50),
      params.offset.unwrap_or(0),
    )
    .await
    .map_err(ApiError::from_engine)?;
  Ok(Json(routes))
}
