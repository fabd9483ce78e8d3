//! Error types for `meander-core`.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors: preconditions the engine checks before mutating anything.
/// All of these abort the operation and are reported to the caller.
#[derive(Debug, Error)]
pub enum Error {
  #[error("circuit not found: {0}")]
  CircuitNotFound(Uuid),

  #[error("route not found: {0}")]
  RouteNotFound(Uuid),

  /// The route exists and belongs to the caller, but is already completed.
  #[error("route {0} is not active")]
  RouteNotActive(Uuid),

  /// The route is a standalone-POI navigation record; it has no circuit and
  /// no required set, so POI removal/re-adding does not apply.
  #[error("route {0} is not a circuit traversal")]
  NotACircuitRoute(Uuid),

  /// The POI is not an original member of the target circuit.
  #[error("poi {poi_id} is not part of circuit {circuit_id}")]
  NotInCircuit { poi_id: Uuid, circuit_id: Uuid },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`crate::engine::ProgressEngine`]: either a domain
/// precondition failure or a failure inside the storage backend.
///
/// Side-effect failures (album materialisation, point awarding) are *not*
/// represented here — they are caught and logged inside the engine and never
/// abort the triggering state transition.
#[derive(Debug, Error)]
pub enum EngineError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error(transparent)]
  Domain(#[from] Error),

  #[error("store error: {0}")]
  Store(E),
}
