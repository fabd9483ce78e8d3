//! The `RouteStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `meander-store-sqlite`).
//! Higher layers (the engine, `meander-api`) depend on this abstraction, not
//! on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  album::{Album, NewAlbum},
  catalog::{Circuit, CircuitDetail, NewCircuit, NewPoi, NewPoiFile, Poi, PoiFile},
  route::{NewRoute, Route},
  trace::{NewVisit, RemovedTrace, VisitedTrace},
};

/// Abstraction over a Meander storage backend.
///
/// Visited traces are strictly append-only. The only row the engine ever
/// updates is the route's completion flag, and that update is expressed as a
/// compare-and-set so a false→true transition is won by exactly one caller.
pub trait RouteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// Create and persist a POI.
  fn add_poi(
    &self,
    input: NewPoi,
  ) -> impl Future<Output = Result<Poi, Self::Error>> + Send + '_;

  /// Attach a media file record to a POI.
  fn add_poi_file(
    &self,
    input: NewPoiFile,
  ) -> impl Future<Output = Result<PoiFile, Self::Error>> + Send + '_;

  /// Create a circuit together with its ordered POI memberships.
  fn add_circuit(
    &self,
    input: NewCircuit,
  ) -> impl Future<Output = Result<Circuit, Self::Error>> + Send + '_;

  /// Resolve a circuit and its non-deleted POI memberships. Returns `None`
  /// for a missing or soft-deleted circuit.
  fn get_circuit_with_pois(
    &self,
    circuit_id: Uuid,
  ) -> impl Future<Output = Result<Option<CircuitDetail>, Self::Error>> + Send + '_;

  // ── Routes ────────────────────────────────────────────────────────────

  /// Persist a new route. `route_id` and `started_at` are set by the store.
  fn create_route(
    &self,
    input: NewRoute,
  ) -> impl Future<Output = Result<Route, Self::Error>> + Send + '_;

  /// Retrieve a route by id. Returns `None` if not found.
  fn get_route(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<Option<Route>, Self::Error>> + Send + '_;

  /// List a user's routes, most recently started first.
  fn list_routes(
    &self,
    user_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Route>, Self::Error>> + Send + '_;

  /// Transition the route to completed iff it is currently active.
  /// Returns `true` only for the caller that won the transition.
  fn complete_route(
    &self,
    route_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Transition the route back to active iff it is currently completed.
  /// The completion timestamp is cleared. Returns `true` if it transitioned.
  fn reopen_route(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Trace ledger ──────────────────────────────────────────────────────

  /// Append a visited trace. `recorded_at` is set by the store.
  fn record_visit(
    &self,
    input: NewVisit,
  ) -> impl Future<Output = Result<VisitedTrace, Self::Error>> + Send + '_;

  /// Mark a POI as removed for a route. Idempotent: if a removal already
  /// exists it is returned unchanged with `inserted == false`.
  fn record_removal(
    &self,
    user_id: Uuid,
    route_id: Uuid,
    poi_id: Uuid,
  ) -> impl Future<Output = Result<(RemovedTrace, bool), Self::Error>> + Send + '_;

  /// Delete the removal row for (route, poi). Returns `false` (a no-op, not
  /// an error) if the POI was not removed.
  fn undo_removal(
    &self,
    route_id: Uuid,
    poi_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Distinct POI ids named by this route's visited traces.
  fn visited_poi_ids(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<Uuid>, Self::Error>> + Send + '_;

  /// POI ids currently removed for this route.
  fn removed_poi_ids(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<Uuid>, Self::Error>> + Send + '_;

  /// All visited traces for a route in recording order.
  fn list_traces(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VisitedTrace>, Self::Error>> + Send + '_;

  // ── Albums ────────────────────────────────────────────────────────────

  /// The album previously materialised for this route, if any.
  fn find_route_album(
    &self,
    route_id: Uuid,
  ) -> impl Future<Output = Result<Option<Album>, Self::Error>> + Send + '_;

  /// Create an album. Fails if the route already has one; callers are
  /// expected to check [`RouteStore::find_route_album`] first.
  fn create_album(
    &self,
    input: NewAlbum,
  ) -> impl Future<Output = Result<Album, Self::Error>> + Send + '_;

  /// All album-kind files owned by the given POIs.
  fn album_files_for_pois(
    &self,
    poi_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<PoiFile>, Self::Error>> + Send + '_;

  /// Bulk-link files to an album. Returns how many links were created.
  fn link_album_files(
    &self,
    album_id: Uuid,
    file_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
