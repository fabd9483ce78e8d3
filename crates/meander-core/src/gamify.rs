//! Gamification types and collaborator contracts.
//!
//! The progress engine only *requests* awards through [`RewardSink`]; the
//! point ledger itself (rules, transactions, profile reads) is owned by the
//! storage backend and exposed through [`GamificationStore`] for the API.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::trace::Coordinates;

// ─── Activities ──────────────────────────────────────────────────────────────

/// The point-awarding activities a rule can be attached to. The snake_case
/// string form is the value stored in the `activity` columns.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Activity {
  CompleteCircuit,
  CompletePremiumCircuit,
  VisitPoi,
  CompleteRegistration,
  ShareWithFriend,
  LeaveReview,
}

impl Activity {
  /// The activity used for a circuit-completion award.
  pub fn for_completion(is_premium: bool) -> Self {
    if is_premium {
      Self::CompletePremiumCircuit
    } else {
      Self::CompleteCircuit
    }
  }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// An admin-managed rule mapping an activity to a point value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationRule {
  pub rule_id:     Uuid,
  pub activity:    Activity,
  pub points:      i64,
  pub description: String,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`GamificationStore::create_rule`].
#[derive(Debug, Clone)]
pub struct NewRule {
  pub activity:    Activity,
  pub points:      i64,
  pub description: String,
  pub is_active:   bool,
}

/// Partial update for an existing rule; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
  pub points:      Option<i64>,
  pub description: Option<String>,
  pub is_active:   Option<bool>,
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// One append-only point-awarding event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsTransaction {
  pub tx_id:       Uuid,
  pub user_id:     Uuid,
  pub rule_id:     Uuid,
  pub activity:    Activity,
  pub points:      i64,
  /// Idempotency key; at most one transaction per (activity, reference).
  pub reference:   Option<String>,
  pub is_claimed:  bool,
  pub recorded_at: DateTime<Utc>,
}

/// The result of requesting a circuit-completion award.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionAward {
  /// `false` when no active rule exists or the reference key was already
  /// used (a retried completion).
  pub awarded:        bool,
  pub points_awarded: i64,
  pub total_points:   i64,
}

/// Context attached to a POI-visit award request.
#[derive(Debug, Clone, Copy)]
pub struct VisitContext {
  pub route_id:    Uuid,
  pub coordinates: Coordinates,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A user's point standing. Level advances every 100 points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:      Uuid,
  pub total_points: i64,
  pub level:        i64,
}

/// The level implied by a point total: 100 points per level, starting at 1.
pub fn level_for(total_points: i64) -> i64 { total_points / 100 + 1 }

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub user_id:      Uuid,
  pub total_points: i64,
  pub level:        i64,
}

/// Outcome of claiming a points transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
  Claimed(PointsTransaction),
  AlreadyClaimed,
  NotFound,
}

// ─── Collaborator contracts ──────────────────────────────────────────────────

/// The award-requesting contract the progress engine consumes.
///
/// Visit-level awards are fire-and-forget; completion-level awards are
/// awaited but non-fatal on failure. Both carry idempotency keys so a retry
/// does not double-award.
pub trait RewardSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Request a [`Activity::VisitPoi`] award. Deduplicated per (route, poi).
  fn award_poi_visit(
    &self,
    user_id: Uuid,
    poi_id: Uuid,
    context: VisitContext,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Request a circuit-completion award. `reference` is the idempotency key
  /// for this completion event.
  fn award_circuit_completion(
    &self,
    user_id: Uuid,
    circuit_id: Uuid,
    is_premium: bool,
    reference: String,
  ) -> impl Future<Output = Result<CompletionAward, Self::Error>> + Send + '_;
}

/// Rule management and point-ledger reads, consumed by the API layer only.
/// The engine never touches these.
pub trait GamificationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a rule. One rule per activity: returns `None` without inserting
  /// when the activity already has one.
  fn create_rule(
    &self,
    input: NewRule,
  ) -> impl Future<Output = Result<Option<GamificationRule>, Self::Error>> + Send + '_;

  /// Apply a partial update. Returns `None` if the rule does not exist.
  fn update_rule(
    &self,
    rule_id: Uuid,
    update: RuleUpdate,
  ) -> impl Future<Output = Result<Option<GamificationRule>, Self::Error>> + Send + '_;

  /// Insert the default rule set, skipping activities that already have a
  /// rule. Returns how many rules were inserted.
  fn seed_default_rules(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// All transactions for a user, most recent first.
  fn history(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PointsTransaction>, Self::Error>> + Send + '_;

  /// Top users by summed points.
  fn leaderboard(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<LeaderboardEntry>, Self::Error>> + Send + '_;

  /// Append a caller-triggered transaction for `activity` at its active
  /// rule's point value. Unlike the engine's completion awards these carry
  /// no idempotency key; repeating the activity earns points again. Returns
  /// `None` when no active rule exists for the activity.
  fn complete_activity(
    &self,
    user_id: Uuid,
    activity: Activity,
  ) -> impl Future<Output = Result<Option<PointsTransaction>, Self::Error>> + Send + '_;

  /// Mark one of the caller's transactions as claimed.
  fn claim(
    &self,
    user_id: Uuid,
    tx_id: Uuid,
  ) -> impl Future<Output = Result<ClaimOutcome, Self::Error>> + Send + '_;
}

/// The default rule set seeded at startup.
pub fn default_rules() -> Vec<NewRule> {
  let rule = |activity, points, description: &str| NewRule {
    activity,
    points,
    description: description.to_string(),
    is_active: true,
  };
  vec![
    rule(Activity::CompleteCircuit, 50, "Complete a circuit"),
    rule(Activity::CompletePremiumCircuit, 100, "Complete a premium circuit"),
    rule(Activity::VisitPoi, 5, "Visit a point of interest"),
    rule(Activity::CompleteRegistration, 10, "Complete registration"),
    rule(Activity::ShareWithFriend, 20, "Share with a friend"),
    rule(Activity::LeaveReview, 25, "Leave a review"),
  ]
}
