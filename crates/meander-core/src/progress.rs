//! Completion evaluation and the route progress read model.
//!
//! [`RouteProgress`] is the single place that joins route, circuit membership,
//! and trace data into the sets the engine reasons about. The completion rule
//! itself is the pure function [`evaluate`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  catalog::CircuitDetail, error::EngineError, route::Route, store::RouteStore,
};

// ─── Evaluator ───────────────────────────────────────────────────────────────

/// The completion rule: a route is complete iff its required set is non-empty
/// and every required POI has at least one recorded visit.
///
/// Visited ids outside the required set (e.g. a POI visited, then removed)
/// neither block nor force completion. An empty required set — a zero-POI
/// circuit, or one whose every POI has been removed — never completes; that
/// is a terminal non-completing state, not an error.
pub fn evaluate(required: &BTreeSet<Uuid>, visited: &BTreeSet<Uuid>) -> bool {
  !required.is_empty() && required.is_subset(visited)
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// The derived per-route sets: `required = circuit − removed`, and the
/// distinct visited POI ids. Never stored, always assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteProgress {
  pub required: BTreeSet<Uuid>,
  pub visited:  BTreeSet<Uuid>,
  pub removed:  BTreeSet<Uuid>,
}

impl RouteProgress {
  /// Compute the sets from their raw inputs.
  pub fn from_sets(
    circuit_poi_ids: impl IntoIterator<Item = Uuid>,
    visited: BTreeSet<Uuid>,
    removed: BTreeSet<Uuid>,
  ) -> Self {
    let required = circuit_poi_ids
      .into_iter()
      .filter(|id| !removed.contains(id))
      .collect();
    Self { required, visited, removed }
  }

  /// Assemble the read model for a circuit route from the store.
  pub async fn assemble<S: RouteStore>(
    store: &S,
    route: &Route,
    circuit: &CircuitDetail,
  ) -> Result<Self, EngineError<S::Error>> {
    let visited = store
      .visited_poi_ids(route.route_id)
      .await
      .map_err(EngineError::Store)?;
    let removed = store
      .removed_poi_ids(route.route_id)
      .await
      .map_err(EngineError::Store)?;
    Ok(Self::from_sets(circuit.poi_ids(), visited, removed))
  }

  pub fn is_complete(&self) -> bool { evaluate(&self.required, &self.visited) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(ns: &[u128]) -> BTreeSet<Uuid> {
    ns.iter().map(|n| Uuid::from_u128(*n)).collect()
  }

  #[test]
  fn empty_required_never_completes() {
    assert!(!evaluate(&ids(&[]), &ids(&[])));
    assert!(!evaluate(&ids(&[]), &ids(&[1, 2])));
  }

  #[test]
  fn complete_when_required_subset_of_visited() {
    assert!(evaluate(&ids(&[1, 2]), &ids(&[1, 2])));
    assert!(evaluate(&ids(&[1]), &ids(&[1, 2, 3])));
  }

  #[test]
  fn incomplete_when_any_required_unvisited() {
    assert!(!evaluate(&ids(&[1, 2, 3]), &ids(&[1, 2])));
    assert!(!evaluate(&ids(&[1]), &ids(&[2])));
  }

  #[test]
  fn extra_visits_outside_required_do_not_block() {
    // POI 9 was visited, then removed from the required set.
    assert!(evaluate(&ids(&[1, 2]), &ids(&[1, 2, 9])));
  }

  #[test]
  fn required_is_circuit_minus_removed() {
    let progress = RouteProgress::from_sets(
      ids(&[1, 2, 3]),
      ids(&[1]),
      ids(&[2]),
    );
    assert_eq!(progress.required, ids(&[1, 3]));
    assert!(!progress.is_complete());
  }

  #[test]
  fn removing_every_poi_leaves_route_non_completable() {
    let progress = RouteProgress::from_sets(
      ids(&[1, 2]),
      ids(&[1, 2]),
      ids(&[1, 2]),
    );
    assert!(progress.required.is_empty());
    assert!(!progress.is_complete());
  }
}
