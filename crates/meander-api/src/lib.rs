//! JSON REST API for the Meander route progress engine.
//!
//! Exposes an axum [`Router`] backed by any storage type that implements the
//! route, reward, and gamification contracts. TLS and user authentication are
//! upstream concerns; the caller's id arrives in the `x-user-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", meander_api::router(state.clone()))
//! ```

pub mod auth;
pub mod error;
pub mod gamification;
pub mod routes;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post},
};
use meander_core::{
  engine::ProgressEngine,
  gamify::{GamificationStore, RewardSink},
  store::RouteStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_true() -> bool { true }

/// Server configuration, deserialised from `config.toml` and `MEANDER_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Insert the default gamification rules at startup for activities that
  /// have none.
  #[serde(default = "default_true")]
  pub seed_rules: bool,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers. The store doubles as the
/// engine's reward sink: awards land in the same database.
pub struct AppState<S> {
  pub engine: ProgressEngine<S, S>,
  pub store:  Arc<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), store: Arc::clone(&self.store) }
  }
}

impl<S> AppState<S>
where
  S: RouteStore + RewardSink,
{
  pub fn new(store: Arc<S>) -> Self {
    Self {
      engine: ProgressEngine::new(Arc::clone(&store), Arc::clone(&store)),
      store,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S>(state: AppState<S>) -> Router<()>
where
  S: RouteStore + GamificationStore + RewardSink + 'static,
{
  Router::new()
    // Routes
    .route("/routes", get(routes::list::<S>))
    .route("/routes/start", post(routes::start::<S>))
    .route("/routes/trace", post(routes::trace::<S>))
    .route("/routes/remove-poi", post(routes::remove_poi::<S>))
    .route("/routes/add-poi-back", post(routes::add_poi_back::<S>))
    .route("/routes/save", post(routes::save::<S>))
    .route("/routes/{id}", get(routes::detail::<S>))
    // Gamification
    .route("/gamification/rules", post(gamification::create_rule::<S>))
    .route("/gamification/rules/{id}", patch(gamification::update_rule::<S>))
    .route("/gamification/profile", get(gamification::profile::<S>))
    .route("/gamification/history", get(gamification::history::<S>))
    .route("/gamification/leaderboard", get(gamification::leaderboard::<S>))
    .route("/gamification/complete", post(gamification::complete::<S>))
    .route("/gamification/claim/{tx}", post(gamification::claim::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use meander_core::{
    catalog::{NewCircuit, NewCircuitStop, NewPoi},
    gamify::GamificationStore as _,
    store::RouteStore as _,
  };
  use meander_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.seed_default_rules().await.unwrap();
    AppState::new(Arc::new(store))
  }

  async fn seed_circuit(state: &AppState<SqliteStore>, n: usize) -> (Uuid, Vec<Uuid>) {
    let mut poi_ids = Vec::new();
    for i in 0..n {
      let poi = state
        .store
        .add_poi(NewPoi {
          name:      format!("poi {i}"),
          latitude:  45.76,
          longitude: 4.84,
        })
        .await
        .unwrap();
      poi_ids.push(poi.poi_id);
    }
    let circuit = state
      .store
      .add_circuit(NewCircuit {
        name:       "riverside".into(),
        is_premium: false,
        stops:      poi_ids
          .iter()
          .map(|&poi_id| NewCircuitStop { poi_id, estimated_time_min: None })
          .collect(),
      })
      .await
      .unwrap();
    (circuit.circuit_id, poi_ids)
  }

  async fn request(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    user_id: Option<Uuid>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
      builder = builder.header("x-user-id", user_id.to_string());
    }
    let req = match body {
      Some(v) => builder
        .header("content-type", "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  #[tokio::test]
  async fn start_trace_and_complete_over_http() {
    let state = make_state().await;
    let (circuit_id, poi_ids) = seed_circuit(&state, 2).await;
    let user_id = Uuid::new_v4();

    let (status, started) = request(
      state.clone(),
      "POST",
      "/routes/start",
      Some(user_id),
      Some(json!({
        "circuit_id": circuit_id,
        "latitude": 45.76,
        "longitude": 4.84,
        "poi_id": poi_ids[0],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let route_id = started["route"]["route_id"].as_str().unwrap().to_string();
    assert_eq!(started["route"]["is_completed"], json!(false));

    let (status, outcome) = request(
      state.clone(),
      "POST",
      "/routes/trace",
      Some(user_id),
      Some(json!({
        "route_id": route_id,
        "latitude": 45.77,
        "longitude": 4.85,
        "poi_id": poi_ids[1],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["completed"], json!(true));
    assert!(outcome["album_id"].is_string());

    // 2 visit awards plus the completion award.
    let (status, profile) = request(
      state.clone(),
      "GET",
      "/gamification/profile",
      Some(user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["total_points"], json!(60));

    let (status, detail) = request(
      state,
      "GET",
      &format!("/routes/{route_id}"),
      Some(user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["route"]["is_completed"], json!(true));
    assert_eq!(detail["traces"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn missing_user_header_is_rejected() {
    let state = make_state().await;
    let (status, body) =
      request(state, "GET", "/routes", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));
  }

  #[tokio::test]
  async fn unknown_circuit_maps_to_404() {
    let state = make_state().await;
    let (status, body) = request(
      state,
      "POST",
      "/routes/start",
      Some(Uuid::new_v4()),
      Some(json!({
        "circuit_id": Uuid::new_v4(),
        "latitude": 0.0,
        "longitude": 0.0,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn self_reported_activity_over_http() {
    let state = make_state().await;
    let user_id = Uuid::new_v4();

    let (status, tx) = request(
      state.clone(),
      "POST",
      "/gamification/complete",
      Some(user_id),
      Some(json!({ "activity": "share_with_friend" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["points"], json!(20));

    // Repeatable; no idempotency key for self-reported activities.
    let (status, _) = request(
      state.clone(),
      "POST",
      "/gamification/complete",
      Some(user_id),
      Some(json!({ "activity": "share_with_friend" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, profile) = request(
      state.clone(),
      "GET",
      "/gamification/profile",
      Some(user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["total_points"], json!(40));

    // No active rule for the activity reads as 404, an unknown activity
    // name as a bad request.
    let unseeded = AppState::new(Arc::new(
      SqliteStore::open_in_memory().await.unwrap(),
    ));
    let (status, _) = request(
      unseeded,
      "POST",
      "/gamification/complete",
      Some(user_id),
      Some(json!({ "activity": "leave_review" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
      state,
      "POST",
      "/gamification/complete",
      Some(user_id),
      Some(json!({ "activity": "climb_mountain" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn claiming_twice_maps_to_400() {
    let state = make_state().await;
    let user_id = Uuid::new_v4();
    use meander_core::gamify::RewardSink as _;
    state
      .store
      .award_circuit_completion(user_id, Uuid::new_v4(), false, "r@t".into())
      .await
      .unwrap();
    let (_, history) = request(
      state.clone(),
      "GET",
      "/gamification/history",
      Some(user_id),
      None,
    )
    .await;
    let tx_id = history[0]["tx_id"].as_str().unwrap().to_string();

    let (status, _) = request(
      state.clone(),
      "POST",
      &format!("/gamification/claim/{tx_id}"),
      Some(user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
      state,
      "POST",
      &format!("/gamification/claim/{tx_id}"),
      Some(user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn rule_create_and_update_roundtrip() {
    // Unseeded store so the activity slot is free.
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = AppState::new(Arc::new(store));

    let (status, rule) = request(
      state.clone(),
      "POST",
      "/gamification/rules",
      Some(Uuid::new_v4()),
      Some(json!({
        "activity": "complete_registration",
        "points": 15,
        "description": "signup bonus",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["is_active"], json!(true));
    let rule_id = rule["rule_id"].as_str().unwrap().to_string();

    // A second rule for the same activity is a client error, not a 500.
    let (status, body) = request(
      state.clone(),
      "POST",
      "/gamification/rules",
      Some(Uuid::new_v4()),
      Some(json!({
        "activity": "complete_registration",
        "points": 99,
        "description": "duplicate",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already has a rule"));

    let (status, updated) = request(
      state.clone(),
      "PATCH",
      &format!("/gamification/rules/{rule_id}"),
      None,
      Some(json!({ "points": 25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["points"], json!(25));
    assert_eq!(updated["description"], json!("signup bonus"));

    let (status, _) = request(
      state.clone(),
      "PATCH",
      &format!("/gamification/rules/{}", Uuid::new_v4()),
      None,
      Some(json!({ "points": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, board) = request(
      state,
      "GET",
      "/gamification/leaderboard?limit=5",
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(board.as_array().unwrap().is_empty());
  }
}
