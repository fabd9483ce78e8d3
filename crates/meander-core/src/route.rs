//! Route — one user's traversal attempt.
//!
//! A route is either a circuit traversal (owns a ledger of traces and a
//! personalised required set) or a standalone-POI navigation record saved in
//! one step, already completed. The two kinds are mutually exclusive:
//! exactly one of `circuit_id` / `poi_id` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trace::Coordinates;

// ─── Navigation metadata ─────────────────────────────────────────────────────

/// How the user travelled a navigation route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
  Walking,
  Cycling,
  Driving,
  Transit,
}

/// Caller-supplied metadata for a navigation route; the engine stores it
/// verbatim and never recomputes anything from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Navigation {
  pub distance_m:     f64,
  pub duration_s:     u32,
  pub transport_mode: TransportMode,
  pub path:           Vec<Coordinates>,
  pub points_earned:  u32,
}

// ─── Route ───────────────────────────────────────────────────────────────────

/// One (user, circuit) traversal attempt or one (user, POI) navigation record.
/// Never physically deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
  pub route_id:     Uuid,
  pub user_id:      Uuid,
  /// Set iff this is a circuit traversal.
  pub circuit_id:   Option<Uuid>,
  /// Set iff this is a standalone-POI navigation record.
  pub poi_id:       Option<Uuid>,
  pub is_completed: bool,
  pub completed_at: Option<DateTime<Utc>>,
  pub started_at:   DateTime<Utc>,
  pub navigation:   Option<Navigation>,
}

impl Route {
  /// The circuit id, or an error if this is a navigation route.
  pub fn circuit_id(&self) -> crate::Result<Uuid> {
    self
      .circuit_id
      .ok_or(crate::Error::NotACircuitRoute(self.route_id))
  }
}

// ─── NewRoute ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::RouteStore::create_route`].
/// `route_id` and `started_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewRoute {
  pub user_id:      Uuid,
  pub circuit_id:   Option<Uuid>,
  pub poi_id:       Option<Uuid>,
  pub is_completed: bool,
  pub completed_at: Option<DateTime<Utc>>,
  pub navigation:   Option<Navigation>,
}

impl NewRoute {
  /// An active circuit traversal, the `start route` case.
  pub fn circuit(user_id: Uuid, circuit_id: Uuid) -> Self {
    Self {
      user_id,
      circuit_id: Some(circuit_id),
      poi_id: None,
      is_completed: false,
      completed_at: None,
      navigation: None,
    }
  }

  /// A navigation record saved already completed, the `save route` case.
  pub fn navigation(
    user_id: Uuid,
    poi_id: Uuid,
    completed_at: DateTime<Utc>,
    navigation: Navigation,
  ) -> Self {
    Self {
      user_id,
      circuit_id: None,
      poi_id: Some(poi_id),
      is_completed: true,
      completed_at: Some(completed_at),
      navigation: Some(navigation),
    }
  }
}
