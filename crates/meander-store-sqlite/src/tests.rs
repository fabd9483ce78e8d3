//! Integration tests for `SqliteStore` against an in-memory database,
//! including end-to-end engine scenarios with the store acting as both the
//! route backend and the reward sink.

use std::sync::Arc;

use meander_core::{
  Error as CoreError, EngineError,
  catalog::{FileKind, NewCircuit, NewCircuitStop, NewPoi, NewPoiFile},
  engine::ProgressEngine,
  gamify::{Activity, ClaimOutcome, GamificationStore, RewardSink, RuleUpdate, VisitContext},
  route::{Navigation, NewRoute, TransportMode},
  store::RouteStore,
  trace::{Coordinates, NewVisit},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn engine(s: &SqliteStore) -> ProgressEngine<SqliteStore, SqliteStore> {
  ProgressEngine::new(Arc::new(s.clone()), Arc::new(s.clone()))
}

fn coords() -> Coordinates {
  Coordinates { latitude: 48.8584, longitude: 2.2945 }
}

/// Seed `n` POIs and a circuit containing all of them, in order.
async fn seed_circuit(s: &SqliteStore, n: usize) -> (Uuid, Vec<Uuid>) {
  let mut poi_ids = Vec::with_capacity(n);
  for i in 0..n {
    let poi = s
      .add_poi(NewPoi {
        name:      format!("poi {i}"),
        latitude:  48.85 + i as f64 * 0.01,
        longitude: 2.29 + i as f64 * 0.01,
      })
      .await
      .unwrap();
    poi_ids.push(poi.poi_id);
  }

  let circuit = s
    .add_circuit(NewCircuit {
      name:       "old town loop".into(),
      is_premium: false,
      stops:      poi_ids
        .iter()
        .map(|&poi_id| NewCircuitStop { poi_id, estimated_time_min: Some(15) })
        .collect(),
    })
    .await
    .unwrap();

  (circuit.circuit_id, poi_ids)
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn circuit_roundtrip_preserves_stop_order() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 3).await;

  let detail = s.get_circuit_with_pois(circuit_id).await.unwrap().unwrap();
  assert_eq!(detail.circuit.name, "old town loop");
  assert_eq!(detail.stops.len(), 3);
  let fetched: Vec<Uuid> = detail.poi_ids().collect();
  assert_eq!(fetched, poi_ids);
  assert_eq!(detail.stops[0].position, 1);
  assert_eq!(detail.stops[2].position, 3);

  let poi = s.get_poi(poi_ids[0]).await.unwrap().unwrap();
  assert_eq!(poi.name, "poi 0");
  assert!(!poi.is_deleted);
}

#[tokio::test]
async fn missing_circuit_returns_none() {
  let s = store().await;
  let result = s.get_circuit_with_pois(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

// ─── Routes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_route() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 2).await;
  let user_id = Uuid::new_v4();

  let route = s
    .create_route(NewRoute::circuit(user_id, circuit_id))
    .await
    .unwrap();
  assert!(!route.is_completed);
  assert_eq!(route.circuit_id, Some(circuit_id));
  assert!(route.poi_id.is_none());

  let fetched = s.get_route(route.route_id).await.unwrap().unwrap();
  assert_eq!(fetched.route_id, route.route_id);
  assert_eq!(fetched.user_id, user_id);
}

#[tokio::test]
async fn list_routes_is_scoped_and_paged() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 1).await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  for _ in 0..3 {
    s.create_route(NewRoute::circuit(alice, circuit_id))
      .await
      .unwrap();
  }
  s.create_route(NewRoute::circuit(bob, circuit_id))
    .await
    .unwrap();

  let all = s.list_routes(alice, 10, 0).await.unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.iter().all(|r| r.user_id == alice));

  let page = s.list_routes(alice, 2, 2).await.unwrap();
  assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn complete_route_cas_wins_once() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 1).await;
  let route = s
    .create_route(NewRoute::circuit(Uuid::new_v4(), circuit_id))
    .await
    .unwrap();

  let at = chrono::Utc::now();
  assert!(s.complete_route(route.route_id, at).await.unwrap());
  // A second attempt finds the route already completed.
  assert!(!s.complete_route(route.route_id, at).await.unwrap());

  let fetched = s.get_route(route.route_id).await.unwrap().unwrap();
  assert!(fetched.is_completed);
  assert!(fetched.completed_at.is_some());
}

#[tokio::test]
async fn reopen_route_clears_completion() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 1).await;
  let route = s
    .create_route(NewRoute::circuit(Uuid::new_v4(), circuit_id))
    .await
    .unwrap();

  // Reopening an active route is a no-op.
  assert!(!s.reopen_route(route.route_id).await.unwrap());

  s.complete_route(route.route_id, chrono::Utc::now())
    .await
    .unwrap();
  assert!(s.reopen_route(route.route_id).await.unwrap());
  assert!(!s.reopen_route(route.route_id).await.unwrap());

  let fetched = s.get_route(route.route_id).await.unwrap().unwrap();
  assert!(!fetched.is_completed);
  assert!(fetched.completed_at.is_none());
}

// ─── Trace ledger ────────────────────────────────────────────────────────────

#[tokio::test]
async fn visited_poi_ids_are_distinct_and_skip_pings() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let route = s
    .create_route(NewRoute::circuit(Uuid::new_v4(), circuit_id))
    .await
    .unwrap();

  // A bare ping, then the same POI twice.
  for poi_id in [None, Some(poi_ids[0]), Some(poi_ids[0])] {
    s.record_visit(NewVisit {
      route_id: route.route_id,
      coordinates: coords(),
      poi_id,
    })
    .await
    .unwrap();
  }

  let visited = s.visited_poi_ids(route.route_id).await.unwrap();
  assert_eq!(visited.len(), 1);
  assert!(visited.contains(&poi_ids[0]));

  let traces = s.list_traces(route.route_id).await.unwrap();
  assert_eq!(traces.len(), 3);
  assert!(traces[0].poi_id.is_none());
}

#[tokio::test]
async fn record_removal_is_idempotent() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let user_id = Uuid::new_v4();
  let route = s
    .create_route(NewRoute::circuit(user_id, circuit_id))
    .await
    .unwrap();

  let (first, inserted) = s
    .record_removal(user_id, route.route_id, poi_ids[0])
    .await
    .unwrap();
  assert!(inserted);

  let (second, inserted) = s
    .record_removal(user_id, route.route_id, poi_ids[0])
    .await
    .unwrap();
  assert!(!inserted);
  assert_eq!(second.removal_id, first.removal_id);

  let removed = s.removed_poi_ids(route.route_id).await.unwrap();
  assert_eq!(removed.len(), 1);
}

#[tokio::test]
async fn undo_removal_deletes_the_row() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 1).await;
  let user_id = Uuid::new_v4();
  let route = s
    .create_route(NewRoute::circuit(user_id, circuit_id))
    .await
    .unwrap();

  assert!(!s.undo_removal(route.route_id, poi_ids[0]).await.unwrap());

  s.record_removal(user_id, route.route_id, poi_ids[0])
    .await
    .unwrap();
  assert!(s.undo_removal(route.route_id, poi_ids[0]).await.unwrap());
  assert!(s.removed_poi_ids(route.route_id).await.unwrap().is_empty());
}

// ─── Albums ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn album_files_filter_on_kind() {
  let s = store().await;
  let (_, poi_ids) = seed_circuit(&s, 2).await;

  s.add_poi_file(NewPoiFile {
    poi_id: poi_ids[0],
    kind:   FileKind::AlbumImage,
    url:    "https://files.example/a.jpg".into(),
  })
  .await
  .unwrap();
  s.add_poi_file(NewPoiFile {
    poi_id: poi_ids[0],
    kind:   FileKind::Image,
    url:    "https://files.example/thumb.jpg".into(),
  })
  .await
  .unwrap();
  s.add_poi_file(NewPoiFile {
    poi_id: poi_ids[1],
    kind:   FileKind::AlbumImage,
    url:    "https://files.example/b.jpg".into(),
  })
  .await
  .unwrap();

  let files = s.album_files_for_pois(vec![poi_ids[0]]).await.unwrap();
  assert_eq!(files.len(), 1);
  assert_eq!(files[0].kind, FileKind::AlbumImage);

  let files = s.album_files_for_pois(poi_ids.clone()).await.unwrap();
  assert_eq!(files.len(), 2);

  let files = s.album_files_for_pois(Vec::new()).await.unwrap();
  assert!(files.is_empty());
}

#[tokio::test]
async fn link_album_files_ignores_duplicates() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 1).await;
  let user_id = Uuid::new_v4();
  let route = s
    .create_route(NewRoute::circuit(user_id, circuit_id))
    .await
    .unwrap();
  let file = s
    .add_poi_file(NewPoiFile {
      poi_id: poi_ids[0],
      kind:   FileKind::AlbumImage,
      url:    "https://files.example/a.jpg".into(),
    })
    .await
    .unwrap();

  let album = s
    .create_album(meander_core::album::NewAlbum {
      route_id: route.route_id,
      user_id,
      name: "old town loop (2026-08-27)".into(),
    })
    .await
    .unwrap();

  let linked = s
    .link_album_files(album.album_id, vec![file.file_id])
    .await
    .unwrap();
  assert_eq!(linked, 1);
  let linked = s
    .link_album_files(album.album_id, vec![file.file_id])
    .await
    .unwrap();
  assert_eq!(linked, 0);

  let found = s.find_route_album(route.route_id).await.unwrap().unwrap();
  assert_eq!(found.album_id, album.album_id);

  let contents = s.list_album_files(album.album_id).await.unwrap();
  assert_eq!(contents.len(), 1);
  assert_eq!(contents[0].file_id, file.file_id);
}

// ─── Gamification ────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_default_rules_is_idempotent() {
  let s = store().await;
  assert_eq!(s.seed_default_rules().await.unwrap(), 6);
  assert_eq!(s.seed_default_rules().await.unwrap(), 0);
}

#[tokio::test]
async fn update_rule_applies_partial_changes() {
  let s = store().await;

  let missing = s
    .update_rule(Uuid::new_v4(), RuleUpdate::default())
    .await
    .unwrap();
  assert!(missing.is_none());

  let rule = s
    .create_rule(meander_core::gamify::NewRule {
      activity:    Activity::LeaveReview,
      points:      30,
      description: "review bonus".into(),
      is_active:   true,
    })
    .await
    .unwrap()
    .unwrap();

  let updated = s
    .update_rule(rule.rule_id, RuleUpdate {
      points: Some(40),
      description: None,
      is_active: Some(false),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.points, 40);
  assert_eq!(updated.description, "review bonus");
  assert!(!updated.is_active);
}

#[tokio::test]
async fn inactive_rule_awards_nothing() {
  let s = store().await;
  let rule = s
    .create_rule(meander_core::gamify::NewRule {
      activity:    Activity::VisitPoi,
      points:      5,
      description: "visit".into(),
      is_active:   false,
    })
    .await
    .unwrap()
    .unwrap();
  assert!(!rule.is_active);

  let user_id = Uuid::new_v4();
  s.award_poi_visit(
    user_id,
    Uuid::new_v4(),
    VisitContext { route_id: Uuid::new_v4(), coordinates: coords() },
  )
  .await
  .unwrap();
  assert_eq!(s.profile(user_id).await.unwrap().total_points, 0);
}

#[tokio::test]
async fn one_rule_per_activity_is_enforced() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();

  let duplicate = s
    .create_rule(meander_core::gamify::NewRule {
      activity:    Activity::LeaveReview,
      points:      30,
      description: "review bonus".into(),
      is_active:   true,
    })
    .await
    .unwrap();
  assert!(duplicate.is_none());
}

#[tokio::test]
async fn visit_award_dedupes_per_route_and_poi() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let user_id = Uuid::new_v4();
  let route_id = Uuid::new_v4();
  let poi_id = Uuid::new_v4();
  let ctx = VisitContext { route_id, coordinates: coords() };

  s.award_poi_visit(user_id, poi_id, ctx).await.unwrap();
  s.award_poi_visit(user_id, poi_id, ctx).await.unwrap();

  let profile = s.profile(user_id).await.unwrap();
  assert_eq!(profile.total_points, 5);
  assert_eq!(profile.level, 1);
}

#[tokio::test]
async fn completion_award_dedupes_on_reference() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let user_id = Uuid::new_v4();
  let circuit_id = Uuid::new_v4();
  let reference = "route-1@2026-08-27T10:00:00Z".to_string();

  let first = s
    .award_circuit_completion(user_id, circuit_id, false, reference.clone())
    .await
    .unwrap();
  assert!(first.awarded);
  assert_eq!(first.points_awarded, 50);
  assert_eq!(first.total_points, 50);

  let second = s
    .award_circuit_completion(user_id, circuit_id, false, reference)
    .await
    .unwrap();
  assert!(!second.awarded);
  assert_eq!(second.points_awarded, 0);
  assert_eq!(second.total_points, 50);
}

#[tokio::test]
async fn premium_completion_uses_premium_rule() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let user_id = Uuid::new_v4();

  let award = s
    .award_circuit_completion(user_id, Uuid::new_v4(), true, "r@t".into())
    .await
    .unwrap();
  assert!(award.awarded);
  assert_eq!(award.points_awarded, 100);
}

#[tokio::test]
async fn no_rules_means_no_award() {
  let s = store().await;
  let award = s
    .award_circuit_completion(Uuid::new_v4(), Uuid::new_v4(), false, "r@t".into())
    .await
    .unwrap();
  assert!(!award.awarded);
  assert_eq!(award.total_points, 0);
}

#[tokio::test]
async fn self_reported_activity_awards_each_time() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let user_id = Uuid::new_v4();

  // No dedup key: sharing twice earns twice.
  let first = s
    .complete_activity(user_id, Activity::ShareWithFriend)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(first.points, 20);
  assert!(first.reference.is_none());

  let second = s
    .complete_activity(user_id, Activity::ShareWithFriend)
    .await
    .unwrap()
    .unwrap();
  assert_ne!(second.tx_id, first.tx_id);

  assert_eq!(s.profile(user_id).await.unwrap().total_points, 40);
}

#[tokio::test]
async fn self_reported_activity_without_rule_awards_nothing() {
  let s = store().await;
  let result = s
    .complete_activity(Uuid::new_v4(), Activity::LeaveReview)
    .await
    .unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn leaderboard_orders_by_total() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  s.award_circuit_completion(alice, Uuid::new_v4(), true, "a@1".into())
    .await
    .unwrap();
  s.award_circuit_completion(bob, Uuid::new_v4(), false, "b@1".into())
    .await
    .unwrap();

  let board = s.leaderboard(10).await.unwrap();
  assert_eq!(board.len(), 2);
  assert_eq!(board[0].user_id, alice);
  assert_eq!(board[0].total_points, 100);
  assert_eq!(board[0].level, 2);
  assert_eq!(board[1].user_id, bob);
}

#[tokio::test]
async fn claim_transitions_once() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let user_id = Uuid::new_v4();
  s.award_circuit_completion(user_id, Uuid::new_v4(), false, "r@t".into())
    .await
    .unwrap();
  let tx = s.history(user_id).await.unwrap().remove(0);
  assert!(!tx.is_claimed);

  match s.claim(user_id, tx.tx_id).await.unwrap() {
    ClaimOutcome::Claimed(claimed) => assert!(claimed.is_claimed),
    other => panic!("expected Claimed, got {other:?}"),
  }
  assert!(matches!(
    s.claim(user_id, tx.tx_id).await.unwrap(),
    ClaimOutcome::AlreadyClaimed
  ));
  // Another user cannot claim someone else's transaction.
  assert!(matches!(
    s.claim(Uuid::new_v4(), tx.tx_id).await.unwrap(),
    ClaimOutcome::NotFound
  ));
}

// ─── Engine end-to-end ───────────────────────────────────────────────────────

#[tokio::test]
async fn visiting_every_poi_completes_exactly_once() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let (circuit_id, poi_ids) = seed_circuit(&s, 3).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let file = s
    .add_poi_file(NewPoiFile {
      poi_id: poi_ids[0],
      kind:   FileKind::AlbumImage,
      url:    "https://files.example/start.jpg".into(),
    })
    .await
    .unwrap();

  let started = e
    .start_route(user_id, circuit_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap();
  let route_id = started.route.route_id;
  assert!(!started.route.is_completed);

  // Visit the second POI twice; the duplicate must not complete anything.
  for &poi_id in [poi_ids[1], poi_ids[1]].iter() {
    let out = e
      .add_visited_trace(route_id, user_id, coords(), Some(poi_id))
      .await
      .unwrap();
    assert!(!out.completed);
  }

  let out = e
    .add_visited_trace(route_id, user_id, coords(), Some(poi_ids[2]))
    .await
    .unwrap();
  assert!(out.completed);
  let album_id = out.album_id.unwrap();

  // The album holds the album-kind files of the visited POIs.
  let contents = s.list_album_files(album_id).await.unwrap();
  assert_eq!(contents.len(), 1);
  assert_eq!(contents[0].file_id, file.file_id);

  // 3 distinct visit awards plus the completion award.
  let profile = s.profile(user_id).await.unwrap();
  assert_eq!(profile.total_points, 3 * 5 + 50);

  // A completed route accepts no further traces.
  let err = e
    .add_visited_trace(route_id, user_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Domain(CoreError::RouteNotActive(_))
  ));
}

#[tokio::test]
async fn bare_pings_never_complete() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 1).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), None)
    .await
    .unwrap();
  for _ in 0..5 {
    let out = e
      .add_visited_trace(started.route.route_id, user_id, coords(), None)
      .await
      .unwrap();
    assert!(!out.completed);
  }
}

#[tokio::test]
async fn removal_of_last_outstanding_poi_completes() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap();
  let route_id = started.route.route_id;

  let out = e.remove_poi(route_id, user_id, poi_ids[1]).await.unwrap();
  assert!(!out.already_removed);
  assert!(out.completed);
  assert!(out.album_id.is_some());
}

#[tokio::test]
async fn removing_every_poi_leaves_route_active() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), None)
    .await
    .unwrap();
  let route_id = started.route.route_id;

  // An empty required set never evaluates to complete.
  for &poi_id in &poi_ids {
    let out = e.remove_poi(route_id, user_id, poi_id).await.unwrap();
    assert!(!out.completed);
  }
  let route = s.get_route(route_id).await.unwrap().unwrap();
  assert!(!route.is_completed);
}

#[tokio::test]
async fn repeated_removal_is_a_noop() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 3).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), None)
    .await
    .unwrap();
  let route_id = started.route.route_id;

  let first = e.remove_poi(route_id, user_id, poi_ids[0]).await.unwrap();
  assert!(!first.already_removed);
  let second = e.remove_poi(route_id, user_id, poi_ids[0]).await.unwrap();
  assert!(second.already_removed);
  assert_eq!(second.removal.removal_id, first.removal.removal_id);
}

#[tokio::test]
async fn remove_poi_outside_circuit_is_rejected() {
  let s = store().await;
  let (circuit_id, _) = seed_circuit(&s, 1).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), None)
    .await
    .unwrap();
  let err = e
    .remove_poi(started.route.route_id, user_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Domain(CoreError::NotInCircuit { .. })
  ));
}

#[tokio::test]
async fn add_poi_back_reverts_completion_but_keeps_side_effects() {
  let s = store().await;
  s.seed_default_rules().await.unwrap();
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap();
  let route_id = started.route.route_id;

  // Removing the unvisited POI completes the route and fires side effects.
  let removal = e.remove_poi(route_id, user_id, poi_ids[1]).await.unwrap();
  assert!(removal.completed);
  let album_id = removal.album_id.unwrap();
  let points_before = s.profile(user_id).await.unwrap().total_points;

  // Re-adding the still-unvisited POI reverts the route to active.
  let out = e.add_poi_back(route_id, user_id, poi_ids[1]).await.unwrap();
  assert!(out.was_removed);
  assert!(out.reverted);

  let route = s.get_route(route_id).await.unwrap().unwrap();
  assert!(!route.is_completed);

  // Already-dispatched side effects are never retracted.
  let album = s.find_route_album(route_id).await.unwrap().unwrap();
  assert_eq!(album.album_id, album_id);
  assert_eq!(s.profile(user_id).await.unwrap().total_points, points_before);

  // Re-completing by visiting the POI reuses the existing album.
  let out = e
    .add_visited_trace(route_id, user_id, coords(), Some(poi_ids[1]))
    .await
    .unwrap();
  assert!(out.completed);
  assert_eq!(out.album_id, Some(album_id));
}

#[tokio::test]
async fn add_poi_back_of_visited_poi_keeps_route_completed() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap();
  let route_id = started.route.route_id;

  // Visit both POIs, then remove one; the route is completed throughout.
  let out = e
    .add_visited_trace(route_id, user_id, coords(), Some(poi_ids[1]))
    .await
    .unwrap();
  assert!(out.completed);

  // remove_poi rejects completed routes, so exercise the undo path through
  // a removal recorded directly in the store.
  s.record_removal(user_id, route_id, poi_ids[1])
    .await
    .unwrap();

  let out = e.add_poi_back(route_id, user_id, poi_ids[1]).await.unwrap();
  assert!(out.was_removed);
  assert!(!out.reverted);

  let route = s.get_route(route_id).await.unwrap().unwrap();
  assert!(route.is_completed);
}

#[tokio::test]
async fn add_poi_back_without_removal_is_a_noop() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 2).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), None)
    .await
    .unwrap();
  let out = e
    .add_poi_back(started.route.route_id, user_id, poi_ids[0])
    .await
    .unwrap();
  assert!(!out.was_removed);
  assert!(!out.reverted);
}

#[tokio::test]
async fn foreign_route_reads_as_not_found() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 1).await;
  let e = engine(&s);
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let started = e
    .start_route(alice, circuit_id, coords(), None)
    .await
    .unwrap();
  let err = e
    .add_visited_trace(started.route.route_id, bob, coords(), Some(poi_ids[0]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Domain(CoreError::RouteNotFound(_))
  ));
}

#[tokio::test]
async fn start_route_with_unknown_circuit_fails() {
  let s = store().await;
  let e = engine(&s);
  let err = e
    .start_route(Uuid::new_v4(), Uuid::new_v4(), coords(), None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Domain(CoreError::CircuitNotFound(_))
  ));
}

#[tokio::test]
async fn navigation_route_is_saved_completed_and_skips_evaluation() {
  let s = store().await;
  let (_, poi_ids) = seed_circuit(&s, 1).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let route = e
    .save_navigation_route(user_id, poi_ids[0], Navigation {
      distance_m:     1200.0,
      duration_s:     900,
      transport_mode: TransportMode::Walking,
      path:           vec![coords(), coords()],
      points_earned:  10,
    })
    .await
    .unwrap();
  assert!(route.is_completed);
  assert!(route.completed_at.is_some());
  assert_eq!(route.poi_id, Some(poi_ids[0]));

  let fetched = s.get_route(route.route_id).await.unwrap().unwrap();
  let nav = fetched.navigation.unwrap();
  assert_eq!(nav.transport_mode, TransportMode::Walking);
  assert_eq!(nav.path.len(), 2);
  assert_eq!(nav.points_earned, 10);

  // No album or award is dispatched for a saved navigation record.
  assert!(s.find_route_album(route.route_id).await.unwrap().is_none());
  assert_eq!(s.profile(user_id).await.unwrap().total_points, 0);
}

#[tokio::test]
async fn route_detail_excludes_removed_stops() {
  let s = store().await;
  let (circuit_id, poi_ids) = seed_circuit(&s, 3).await;
  let e = engine(&s);
  let user_id = Uuid::new_v4();

  let started = e
    .start_route(user_id, circuit_id, coords(), Some(poi_ids[0]))
    .await
    .unwrap();
  let route_id = started.route.route_id;
  e.remove_poi(route_id, user_id, poi_ids[1]).await.unwrap();

  let detail = e.route_detail(route_id, user_id).await.unwrap();
  let progress = detail.progress.unwrap();
  assert_eq!(progress.visited.len(), 1);
  assert_eq!(progress.removed.len(), 1);
  assert_eq!(progress.required.len(), 2);
  assert!(!progress.is_complete());

  let stop_ids: Vec<Uuid> = detail.stops.iter().map(|st| st.poi_id).collect();
  assert_eq!(stop_ids, vec![poi_ids[0], poi_ids[2]]);
  assert_eq!(detail.traces.len(), 1);
}
