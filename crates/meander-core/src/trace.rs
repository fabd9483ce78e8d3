//! Trace types — the append-only ledger entries of a route.
//!
//! A visited trace is never updated or deleted; undoing a POI removal deletes
//! the removal row rather than inserting a tombstone, so `removed_traces`
//! holds at most one live row per (route, poi).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// A GPS position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

// ─── Visited traces ──────────────────────────────────────────────────────────

/// An immutable record of a GPS ping and/or a POI visit.
///
/// `poi_id` is `None` for a bare position ping; pings never affect completion.
/// Multiple traces may name the same POI — visitation is idempotent at the
/// POI-identity level, not the trace level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitedTrace {
  pub trace_id:    Uuid,
  pub route_id:    Uuid,
  pub coordinates: Coordinates,
  pub poi_id:      Option<Uuid>,
  /// Server-assigned; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::RouteStore::record_visit`].
/// `recorded_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewVisit {
  pub route_id:    Uuid,
  pub coordinates: Coordinates,
  pub poi_id:      Option<Uuid>,
}

// ─── Removed traces ──────────────────────────────────────────────────────────

/// Marks a POI as excluded from the user's personalised required set for one
/// route. Deleted (not marked) when the user re-adds the POI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedTrace {
  pub removal_id:  Uuid,
  pub user_id:     Uuid,
  pub route_id:    Uuid,
  pub poi_id:      Uuid,
  pub recorded_at: DateTime<Utc>,
}
