//! The route progress engine.
//!
//! Owns the route lifecycle: records visit and removal events, asks the
//! completion evaluator for a verdict after every POI-affecting mutation, and
//! fires the completion side effects (point award, album materialisation)
//! exactly once per false→true transition.
//!
//! The false→true transition is won through the store's compare-and-set
//! [`RouteStore::complete_route`], so concurrent trace-add and removal
//! requests against the same route dispatch side effects at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  album::{Album, NewAlbum, album_name},
  catalog::{CircuitDetail, CircuitStop},
  error::{EngineError, Error},
  gamify::{RewardSink, VisitContext},
  progress::RouteProgress,
  route::{Navigation, NewRoute, Route},
  store::RouteStore,
  trace::{Coordinates, NewVisit, RemovedTrace, VisitedTrace},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`ProgressEngine::start_route`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedRoute {
  pub route:       Route,
  pub first_trace: VisitedTrace,
  pub circuit:     CircuitDetail,
}

/// Result of [`ProgressEngine::add_visited_trace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceOutcome {
  pub trace:     VisitedTrace,
  /// `true` iff this trace transitioned the route to completed.
  pub completed: bool,
  /// The album materialised (or reused) on completion, if the album step
  /// succeeded.
  pub album_id:  Option<Uuid>,
}

/// Result of [`ProgressEngine::remove_poi`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalOutcome {
  pub removal:         RemovedTrace,
  pub already_removed: bool,
  /// `true` iff this removal transitioned the route to completed.
  pub completed:       bool,
  pub album_id:        Option<Uuid>,
}

/// Result of [`ProgressEngine::add_poi_back`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinstateOutcome {
  /// `false` when the POI was not removed in the first place (a no-op).
  pub was_removed: bool,
  /// `true` iff the route reverted from completed to active because the
  /// re-added POI is not yet visited.
  pub reverted:    bool,
}

/// The read model returned by [`ProgressEngine::route_detail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDetail {
  pub route:    Route,
  /// `None` for navigation routes, which have no required set.
  pub progress: Option<RouteProgress>,
  /// The circuit's stops minus those removed for this route, in itinerary
  /// order. Empty for navigation routes.
  pub stops:    Vec<CircuitStop>,
  pub traces:   Vec<VisitedTrace>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Orchestrates the trace ledger, the completion evaluator, and the
/// completion side-effect dispatch over a [`RouteStore`] and a [`RewardSink`].
///
/// Holds no per-route state between calls; everything lives in the store.
pub struct ProgressEngine<S, R> {
  store:   Arc<S>,
  rewards: Arc<R>,
}

impl<S, R> Clone for ProgressEngine<S, R> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), rewards: Arc::clone(&self.rewards) }
  }
}

impl<S, R> ProgressEngine<S, R>
where
  S: RouteStore,
  R: RewardSink,
{
  pub fn new(store: Arc<S>, rewards: Arc<R>) -> Self { Self { store, rewards } }

  // ── Operations ────────────────────────────────────────────────────────

  /// Start a circuit traversal: create an active route and record its first
  /// trace. The initial POI id is optional.
  pub async fn start_route(
    &self,
    user_id: Uuid,
    circuit_id: Uuid,
    coordinates: Coordinates,
    initial_poi: Option<Uuid>,
  ) -> Result<StartedRoute, EngineError<S::Error>> {
    let circuit = self
      .store
      .get_circuit_with_pois(circuit_id)
      .await
      .map_err(EngineError::Store)?
      .ok_or(Error::CircuitNotFound(circuit_id))?;

    let route = self
      .store
      .create_route(NewRoute::circuit(user_id, circuit_id))
      .await
      .map_err(EngineError::Store)?;

    let first_trace = self
      .store
      .record_visit(NewVisit {
        route_id: route.route_id,
        coordinates,
        poi_id: initial_poi,
      })
      .await
      .map_err(EngineError::Store)?;

    tracing::info!(
      route_id = %route.route_id,
      circuit_id = %circuit_id,
      "route started"
    );

    Ok(StartedRoute { route, first_trace, circuit })
  }

  /// Record a GPS ping or POI visit against an active route, then re-evaluate
  /// completion. A trace with no POI never affects completion.
  pub async fn add_visited_trace(
    &self,
    route_id: Uuid,
    user_id: Uuid,
    coordinates: Coordinates,
    poi_id: Option<Uuid>,
  ) -> Result<TraceOutcome, EngineError<S::Error>> {
    let route = self.active_owned_route(route_id, user_id).await?;

    let trace = self
      .store
      .record_visit(NewVisit { route_id, coordinates, poi_id })
      .await
      .map_err(EngineError::Store)?;

    // The required/visited sets only change when a POI was named.
    let Some(visited_poi) = poi_id else {
      return Ok(TraceOutcome { trace, completed: false, album_id: None });
    };

    self
      .request_visit_award(user_id, visited_poi, VisitContext {
        route_id,
        coordinates,
      })
      .await;

    let circuit = self.circuit_for(&route).await?;
    let progress = RouteProgress::assemble(&*self.store, &route, &circuit).await?;
    let (completed, album_id) =
      self.settle_completion(&route, &circuit, &progress).await?;

    Ok(TraceOutcome { trace, completed, album_id })
  }

  /// Exclude a POI from the route's personalised required set. Idempotent.
  /// A removal can itself complete the route (removing the one outstanding
  /// required POI) and fires the same side effects as the trace path.
  pub async fn remove_poi(
    &self,
    route_id: Uuid,
    user_id: Uuid,
    poi_id: Uuid,
  ) -> Result<RemovalOutcome, EngineError<S::Error>> {
    let route = self.active_owned_route(route_id, user_id).await?;
    let circuit = self.circuit_for(&route).await?;

    if !circuit.contains(poi_id) {
      return Err(
        Error::NotInCircuit { poi_id, circuit_id: circuit.circuit.circuit_id }
          .into(),
      );
    }

    let (removal, inserted) = self
      .store
      .record_removal(user_id, route_id, poi_id)
      .await
      .map_err(EngineError::Store)?;

    if !inserted {
      // Already removed; nothing changed, so no re-evaluation.
      return Ok(RemovalOutcome {
        removal,
        already_removed: true,
        completed: false,
        album_id: None,
      });
    }

    let progress = RouteProgress::assemble(&*self.store, &route, &circuit).await?;
    let (completed, album_id) =
      self.settle_completion(&route, &circuit, &progress).await?;

    Ok(RemovalOutcome { removal, already_removed: false, completed, album_id })
  }

  /// Undo a POI removal. A no-op if the POI was not removed. If the route
  /// was completed and the re-added POI is not yet visited, the route
  /// reverts to active; already-dispatched side effects are not retracted.
  pub async fn add_poi_back(
    &self,
    route_id: Uuid,
    user_id: Uuid,
    poi_id: Uuid,
  ) -> Result<ReinstateOutcome, EngineError<S::Error>> {
    let route = self.owned_route(route_id, user_id).await?;
    let circuit = self.circuit_for(&route).await?;

    if !circuit.contains(poi_id) {
      return Err(
        Error::NotInCircuit { poi_id, circuit_id: circuit.circuit.circuit_id }
          .into(),
      );
    }

    let was_removed = self
      .store
      .undo_removal(route_id, poi_id)
      .await
      .map_err(EngineError::Store)?;

    if !was_removed {
      return Ok(ReinstateOutcome { was_removed: false, reverted: false });
    }

    let mut reverted = false;
    if route.is_completed {
      let progress =
        RouteProgress::assemble(&*self.store, &route, &circuit).await?;
      if !progress.is_complete() {
        reverted = self
          .store
          .reopen_route(route_id)
          .await
          .map_err(EngineError::Store)?;
        if reverted {
          tracing::info!(
            route_id = %route_id,
            poi_id = %poi_id,
            "route reverted to active after poi reinstated"
          );
        }
      }
    }

    Ok(ReinstateOutcome { was_removed: true, reverted })
  }

  /// Persist a standalone-POI navigation route, already completed, with
  /// caller-supplied points and geometry. Bypasses completion evaluation.
  pub async fn save_navigation_route(
    &self,
    user_id: Uuid,
    poi_id: Uuid,
    navigation: Navigation,
  ) -> Result<Route, EngineError<S::Error>> {
    let route = self
      .store
      .create_route(NewRoute::navigation(user_id, poi_id, Utc::now(), navigation))
      .await
      .map_err(EngineError::Store)?;

    tracing::info!(route_id = %route.route_id, poi_id = %poi_id, "navigation route saved");
    Ok(route)
  }

  /// Read-only reconstruction of the route's required/visited/removed sets,
  /// its non-removed stops, and its trace history.
  pub async fn route_detail(
    &self,
    route_id: Uuid,
    user_id: Uuid,
  ) -> Result<RouteDetail, EngineError<S::Error>> {
    let route = self.owned_route(route_id, user_id).await?;

    let (progress, stops) = if route.circuit_id.is_some() {
      let circuit = self.circuit_for(&route).await?;
      let progress =
        RouteProgress::assemble(&*self.store, &route, &circuit).await?;
      let stops = circuit
        .stops
        .into_iter()
        .filter(|s| !progress.removed.contains(&s.poi_id))
        .collect();
      (Some(progress), stops)
    } else {
      (None, Vec::new())
    };

    let traces = self
      .store
      .list_traces(route_id)
      .await
      .map_err(EngineError::Store)?;

    Ok(RouteDetail { route, progress, stops, traces })
  }

  /// The caller's routes, most recently started first.
  pub async fn list_routes(
    &self,
    user_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Route>, EngineError<S::Error>> {
    self
      .store
      .list_routes(user_id, limit, offset)
      .await
      .map_err(EngineError::Store)
  }

  // ── Preconditions ─────────────────────────────────────────────────────

  /// The route, if it exists and belongs to `user_id`. A route owned by
  /// another user is reported as not found, never as forbidden.
  async fn owned_route(
    &self,
    route_id: Uuid,
    user_id: Uuid,
  ) -> Result<Route, EngineError<S::Error>> {
    let route = self
      .store
      .get_route(route_id)
      .await
      .map_err(EngineError::Store)?
      .filter(|r| r.user_id == user_id)
      .ok_or(Error::RouteNotFound(route_id))?;
    Ok(route)
  }

  async fn active_owned_route(
    &self,
    route_id: Uuid,
    user_id: Uuid,
  ) -> Result<Route, EngineError<S::Error>> {
    let route = self.owned_route(route_id, user_id).await?;
    if route.is_completed {
      return Err(Error::RouteNotActive(route_id).into());
    }
    Ok(route)
  }

  async fn circuit_for(
    &self,
    route: &Route,
  ) -> Result<CircuitDetail, EngineError<S::Error>> {
    let circuit_id = route.circuit_id()?;
    let circuit = self
      .store
      .get_circuit_with_pois(circuit_id)
      .await
      .map_err(EngineError::Store)?
      .ok_or(Error::CircuitNotFound(circuit_id))?;
    Ok(circuit)
  }

  // ── Completion ────────────────────────────────────────────────────────

  /// Evaluate the progress sets and, on a verdict of complete, attempt the
  /// false→true transition. Side effects fire only for the caller that wins
  /// the compare-and-set.
  async fn settle_completion(
    &self,
    route: &Route,
    circuit: &CircuitDetail,
    progress: &RouteProgress,
  ) -> Result<(bool, Option<Uuid>), EngineError<S::Error>> {
    if !progress.is_complete() {
      return Ok((false, None));
    }

    let completed_at = Utc::now();
    let transitioned = self
      .store
      .complete_route(route.route_id, completed_at)
      .await
      .map_err(EngineError::Store)?;

    if !transitioned {
      // Lost the race; the winner dispatched the side effects.
      return Ok((false, None));
    }

    tracing::info!(route_id = %route.route_id, "route completed");
    let album_id =
      self.dispatch_completion(route, circuit, progress, completed_at).await;
    Ok((true, album_id))
  }

  // ── Side-effect dispatch ──────────────────────────────────────────────

  /// Fire the post-completion side effects. Both steps are best-effort:
  /// a failure is logged and never rolls back the completed state or the
  /// trace that triggered it.
  async fn dispatch_completion(
    &self,
    route: &Route,
    circuit: &CircuitDetail,
    progress: &RouteProgress,
    completed_at: DateTime<Utc>,
  ) -> Option<Uuid> {
    let reference =
      format!("{}@{}", route.route_id, completed_at.to_rfc3339());

    match self
      .rewards
      .award_circuit_completion(
        route.user_id,
        circuit.circuit.circuit_id,
        circuit.circuit.is_premium,
        reference,
      )
      .await
    {
      Ok(award) if award.awarded => {
        tracing::info!(
          route_id = %route.route_id,
          points = award.points_awarded,
          total = award.total_points,
          "completion points awarded"
        );
      }
      Ok(_) => {
        tracing::debug!(
          route_id = %route.route_id,
          "completion award skipped: no active rule or duplicate reference"
        );
      }
      Err(e) => {
        tracing::error!(route_id = %route.route_id, error = %e, "completion award request failed");
      }
    }

    match self.materialize_album(route, circuit, progress, completed_at).await {
      Ok(album) => Some(album.album_id),
      Err(e) => {
        tracing::error!(route_id = %route.route_id, error = %e, "album materialisation failed");
        None
      }
    }
  }

  /// Create (or reuse) the route's album and link the album-kind files of
  /// every visited POI. An empty visited set yields an empty album.
  async fn materialize_album(
    &self,
    route: &Route,
    circuit: &CircuitDetail,
    progress: &RouteProgress,
    completed_at: DateTime<Utc>,
  ) -> Result<Album, S::Error> {
    if let Some(existing) = self.store.find_route_album(route.route_id).await? {
      tracing::debug!(album_id = %existing.album_id, "reusing existing route album");
      return Ok(existing);
    }

    let album = self
      .store
      .create_album(NewAlbum {
        route_id: route.route_id,
        user_id:  route.user_id,
        name:     album_name(&circuit.circuit.name, completed_at),
      })
      .await?;

    let files = self
      .store
      .album_files_for_pois(progress.visited.iter().copied().collect())
      .await?;
    let linked = self
      .store
      .link_album_files(album.album_id, files.iter().map(|f| f.file_id).collect())
      .await?;

    tracing::info!(album_id = %album.album_id, files = linked, "album materialised");
    Ok(album)
  }

  /// Visit-level awards are fire-and-forget: a failure is logged and never
  /// surfaces to the caller.
  async fn request_visit_award(
    &self,
    user_id: Uuid,
    poi_id: Uuid,
    context: VisitContext,
  ) {
    if let Err(e) = self.rewards.award_poi_visit(user_id, poi_id, context).await
    {
      tracing::warn!(poi_id = %poi_id, error = %e, "poi visit award request failed");
    }
  }
}
