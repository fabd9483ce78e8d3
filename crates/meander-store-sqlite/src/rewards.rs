//! Gamification ledger: [`RewardSink`] and [`GamificationStore`] for
//! [`SqliteStore`].
//!
//! Awards are deduplicated through the UNIQUE (activity, reference) index:
//! `INSERT OR IGNORE` makes a retried award a silent no-op.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use meander_core::gamify::{
  Activity, ClaimOutcome, CompletionAward, GamificationRule,
  GamificationStore, LeaderboardEntry, NewRule, PointsTransaction, Profile,
  RewardSink, RuleUpdate, VisitContext, default_rules, level_for,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{RawRule, RawTx, encode_activity, encode_dt, encode_uuid},
};

const RULE_COLUMNS: &str =
  "rule_id, activity, points, description, is_active, created_at";

const TX_COLUMNS: &str = "tx_id, user_id, rule_id, activity, points, \
   reference, is_claimed, recorded_at";

fn rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRule> {
  Ok(RawRule {
    rule_id:     row.get(0)?,
    activity:    row.get(1)?,
    points:      row.get(2)?,
    description: row.get(3)?,
    is_active:   row.get(4)?,
    created_at:  row.get(5)?,
  })
}

fn tx_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTx> {
  Ok(RawTx {
    tx_id:       row.get(0)?,
    user_id:     row.get(1)?,
    rule_id:     row.get(2)?,
    activity:    row.get(3)?,
    points:      row.get(4)?,
    reference:   row.get(5)?,
    is_claimed:  row.get(6)?,
    recorded_at: row.get(7)?,
  })
}

// ─── Internals ───────────────────────────────────────────────────────────────

impl SqliteStore {
  /// The active rule for an activity, if any. Inactive rules award nothing.
  async fn active_rule(&self, activity: Activity) -> Result<Option<GamificationRule>> {
    let activity_str = encode_activity(activity);
    let sql = format!(
      "SELECT {RULE_COLUMNS} FROM gamification_rules
       WHERE activity = ?1 AND is_active = 1"
    );

    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![activity_str], rule_from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRule::into_rule).transpose()
  }

  /// Append a transaction for `rule`, deduplicated by `reference` when one
  /// is given. Returns `None` when the reference key was already used.
  async fn insert_award(
    &self,
    user_id: Uuid,
    rule: &GamificationRule,
    reference: Option<String>,
  ) -> Result<Option<PointsTransaction>> {
    let tx = PointsTransaction {
      tx_id: Uuid::new_v4(),
      user_id,
      rule_id: rule.rule_id,
      activity: rule.activity,
      points: rule.points,
      reference,
      is_claimed: false,
      recorded_at: Utc::now(),
    };

    let tx_id_str    = encode_uuid(tx.tx_id);
    let user_id_str  = encode_uuid(user_id);
    let rule_id_str  = encode_uuid(rule.rule_id);
    let activity_str = encode_activity(rule.activity);
    let points       = rule.points;
    let reference    = tx.reference.clone();
    let at_str       = encode_dt(tx.recorded_at);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO points_transactions
             (tx_id, user_id, rule_id, activity, points, reference, is_claimed, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
          rusqlite::params![
            tx_id_str,
            user_id_str,
            rule_id_str,
            activity_str,
            points,
            reference,
            at_str,
          ],
        )?)
      })
      .await?;

    Ok((rows > 0).then_some(tx))
  }

  async fn summed_points(&self, user_id: Uuid) -> Result<i64> {
    let user_str = encode_uuid(user_id);

    let total: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(SUM(points), 0) FROM points_transactions WHERE user_id = ?1",
          rusqlite::params![user_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(total)
  }
}

// ─── RewardSink impl ─────────────────────────────────────────────────────────

impl RewardSink for SqliteStore {
  type Error = Error;

  async fn award_poi_visit(
    &self,
    user_id: Uuid,
    poi_id: Uuid,
    context: VisitContext,
  ) -> Result<()> {
    let Some(rule) = self.active_rule(Activity::VisitPoi).await? else {
      return Ok(());
    };

    // One award per (route, poi), however many traces name the POI.
    let reference = format!("{}/{}", context.route_id, poi_id);
    if self.insert_award(user_id, &rule, Some(reference)).await?.is_some() {
      tracing::debug!(%poi_id, points = rule.points, "poi visit awarded");
    }
    Ok(())
  }

  async fn award_circuit_completion(
    &self,
    user_id: Uuid,
    _circuit_id: Uuid,
    is_premium: bool,
    reference: String,
  ) -> Result<CompletionAward> {
    // A premium circuit with no premium rule falls back to the standard one.
    let mut rule = self.active_rule(Activity::for_completion(is_premium)).await?;
    if rule.is_none() && is_premium {
      rule = self.active_rule(Activity::CompleteCircuit).await?;
    }

    let Some(rule) = rule else {
      let total_points = self.summed_points(user_id).await?;
      return Ok(CompletionAward { awarded: false, points_awarded: 0, total_points });
    };

    let awarded =
      self.insert_award(user_id, &rule, Some(reference)).await?.is_some();
    let total_points = self.summed_points(user_id).await?;

    Ok(CompletionAward {
      awarded,
      points_awarded: if awarded { rule.points } else { 0 },
      total_points,
    })
  }
}

// ─── GamificationStore impl ──────────────────────────────────────────────────

impl GamificationStore for SqliteStore {
  type Error = Error;

  async fn create_rule(&self, input: NewRule) -> Result<Option<GamificationRule>> {
    let rule = GamificationRule {
      rule_id:     Uuid::new_v4(),
      activity:    input.activity,
      points:      input.points,
      description: input.description,
      is_active:   input.is_active,
      created_at:  Utc::now(),
    };

    let rule_id_str  = encode_uuid(rule.rule_id);
    let activity_str = encode_activity(rule.activity);
    let points       = rule.points;
    let description  = rule.description.clone();
    let is_active    = rule.is_active;
    let at_str       = encode_dt(rule.created_at);

    // The UNIQUE(activity) index turns a second rule for the same activity
    // into an ignored insert, reported as `None`.
    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO gamification_rules
             (rule_id, activity, points, description, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            rule_id_str,
            activity_str,
            points,
            description,
            is_active,
            at_str,
          ],
        )?)
      })
      .await?;

    Ok((rows > 0).then_some(rule))
  }

  async fn update_rule(
    &self,
    rule_id: Uuid,
    update: RuleUpdate,
  ) -> Result<Option<GamificationRule>> {
    let id_str = encode_uuid(rule_id);
    let sql = format!(
      "SELECT {RULE_COLUMNS} FROM gamification_rules WHERE rule_id = ?1"
    );

    let raw: Option<RawRule> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], rule_from_row)
            .optional()?,
        )
      })
      .await?;

    let Some(mut rule) = raw.map(RawRule::into_rule).transpose()? else {
      return Ok(None);
    };

    if let Some(points) = update.points {
      rule.points = points;
    }
    if let Some(description) = update.description {
      rule.description = description;
    }
    if let Some(is_active) = update.is_active {
      rule.is_active = is_active;
    }

    let id_str      = encode_uuid(rule_id);
    let points      = rule.points;
    let description = rule.description.clone();
    let is_active   = rule.is_active;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE gamification_rules SET points = ?2, description = ?3, is_active = ?4
           WHERE rule_id = ?1",
          rusqlite::params![id_str, points, description, is_active],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(rule))
  }

  async fn seed_default_rules(&self) -> Result<usize> {
    let mut inserted = 0;
    for input in default_rules() {
      if self.create_rule(input).await?.is_some() {
        inserted += 1;
      }
    }
    Ok(inserted)
  }

  async fn profile(&self, user_id: Uuid) -> Result<Profile> {
    let total_points = self.summed_points(user_id).await?;
    Ok(Profile { user_id, total_points, level: level_for(total_points) })
  }

  async fn history(&self, user_id: Uuid) -> Result<Vec<PointsTransaction>> {
    let user_str = encode_uuid(user_id);
    let sql = format!(
      "SELECT {TX_COLUMNS} FROM points_transactions
       WHERE user_id = ?1 ORDER BY recorded_at DESC, rowid DESC"
    );

    let raws: Vec<RawTx> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], tx_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTx::into_tx).collect()
  }

  async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let limit_val = limit as i64;

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, SUM(points) AS total FROM points_transactions
           GROUP BY user_id ORDER BY total DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(user_str, total_points)| {
        Ok(LeaderboardEntry {
          user_id:      crate::encode::decode_uuid(&user_str)?,
          total_points,
          level:        level_for(total_points),
        })
      })
      .collect()
  }

  async fn complete_activity(
    &self,
    user_id: Uuid,
    activity: Activity,
  ) -> Result<Option<PointsTransaction>> {
    let Some(rule) = self.active_rule(activity).await? else {
      return Ok(None);
    };

    // No reference key: a repeated activity earns points again.
    self.insert_award(user_id, &rule, None).await
  }

  async fn claim(&self, user_id: Uuid, tx_id: Uuid) -> Result<ClaimOutcome> {
    let tx_id_str   = encode_uuid(tx_id);
    let user_id_str = encode_uuid(user_id);
    let sql = format!(
      "SELECT {TX_COLUMNS} FROM points_transactions
       WHERE tx_id = ?1 AND user_id = ?2"
    );

    // Check-then-update runs in one closure on the connection thread.
    let raw: Option<(RawTx, bool)> = self
      .conn
      .call(move |conn| {
        let existing = conn
          .query_row(
            &sql,
            rusqlite::params![tx_id_str, user_id_str],
            tx_from_row,
          )
          .optional()?;

        let Some(raw) = existing else {
          return Ok(None);
        };
        if raw.is_claimed {
          return Ok(Some((raw, true)));
        }

        conn.execute(
          "UPDATE points_transactions SET is_claimed = 1 WHERE tx_id = ?1",
          rusqlite::params![tx_id_str],
        )?;
        Ok(Some((raw, false)))
      })
      .await?;

    match raw {
      None => Ok(ClaimOutcome::NotFound),
      Some((_, true)) => Ok(ClaimOutcome::AlreadyClaimed),
      Some((raw, false)) => {
        let mut tx = raw.into_tx()?;
        tx.is_claimed = true;
        Ok(ClaimOutcome::Claimed(tx))
      }
    }
  }
}
