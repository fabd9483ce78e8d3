//! Catalog types — circuits, POIs, and POI media files.
//!
//! The catalog is read-only input from the engine's perspective: the progress
//! engine never mutates a circuit or a POI. The `New*` input types exist so
//! the ingest surface (seeding, admin tooling) and tests can populate a store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── POIs ────────────────────────────────────────────────────────────────────

/// A point of interest — the atomic visitable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
  pub poi_id:     Uuid,
  pub name:       String,
  pub latitude:   f64,
  pub longitude:  f64,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RouteStore::add_poi`].
#[derive(Debug, Clone)]
pub struct NewPoi {
  pub name:      String,
  pub latitude:  f64,
  pub longitude: f64,
}

// ─── POI files ───────────────────────────────────────────────────────────────

/// What a POI media file is for. Only [`FileKind::AlbumImage`] files are
/// collected into post-completion albums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
  Image,
  AlbumImage,
}

/// A media file owned by a POI. Only the URL is stored; the bytes live in an
/// external file store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiFile {
  pub file_id: Uuid,
  pub poi_id:  Uuid,
  pub kind:    FileKind,
  pub url:     String,
}

/// Input to [`crate::store::RouteStore::add_poi_file`].
#[derive(Debug, Clone)]
pub struct NewPoiFile {
  pub poi_id: Uuid,
  pub kind:   FileKind,
  pub url:    String,
}

// ─── Circuits ────────────────────────────────────────────────────────────────

/// A curated itinerary of POIs. Immutable from the engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
  pub circuit_id: Uuid,
  pub name:       String,
  pub is_premium: bool,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
}

/// One POI's membership in a circuit, with its position in the itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStop {
  pub poi_id:             Uuid,
  pub position:           u32,
  pub estimated_time_min: Option<u32>,
}

/// A circuit together with its ordered, non-deleted POI memberships — the
/// authoritative required-POI input to completion evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitDetail {
  pub circuit: Circuit,
  /// Ordered by `position`, soft-deleted POIs excluded.
  pub stops:   Vec<CircuitStop>,
}

impl CircuitDetail {
  /// Whether `poi_id` is an original member of this circuit.
  pub fn contains(&self, poi_id: Uuid) -> bool {
    self.stops.iter().any(|s| s.poi_id == poi_id)
  }

  pub fn poi_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
    self.stops.iter().map(|s| s.poi_id)
  }
}

/// Input to [`crate::store::RouteStore::add_circuit`].
#[derive(Debug, Clone)]
pub struct NewCircuit {
  pub name:       String,
  pub is_premium: bool,
  pub stops:      Vec<NewCircuitStop>,
}

/// One stop in a [`NewCircuit`].
#[derive(Debug, Clone)]
pub struct NewCircuitStop {
  pub poi_id:             Uuid,
  pub estimated_time_min: Option<u32>,
}
