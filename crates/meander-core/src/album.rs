//! Album types — the photo album materialised when a route completes.
//!
//! An album links to POI *files* of the album kind, not to POIs directly.
//! Materialisation is idempotent per route: a route that completes a second
//! time (after a completed→active reversion) reuses its existing album.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-owned photo album tied to exactly one route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
  pub album_id:   Uuid,
  pub route_id:   Uuid,
  pub user_id:    Uuid,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RouteStore::create_album`].
#[derive(Debug, Clone)]
pub struct NewAlbum {
  pub route_id: Uuid,
  pub user_id:  Uuid,
  pub name:     String,
}

/// The album name shown to the user, derived from the circuit and the
/// completion date.
pub fn album_name(circuit_name: &str, completed_at: DateTime<Utc>) -> String {
  format!("{circuit_name} ({})", completed_at.format("%Y-%m-%d"))
}
