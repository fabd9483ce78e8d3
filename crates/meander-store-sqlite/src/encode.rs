//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Navigation path geometry is stored as a
//! compact JSON array of coordinates.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use meander_core::{
  album::Album,
  catalog::{Circuit, FileKind, Poi, PoiFile},
  gamify::{Activity, GamificationRule, PointsTransaction},
  route::{Navigation, Route, TransportMode},
  trace::{Coordinates, RemovedTrace, VisitedTrace},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── FileKind ────────────────────────────────────────────────────────────────

pub fn encode_file_kind(k: FileKind) -> &'static str {
  match k {
    FileKind::Image => "image",
    FileKind::AlbumImage => "album_image",
  }
}

pub fn decode_file_kind(s: &str) -> Result<FileKind> {
  match s {
    "image" => Ok(FileKind::Image),
    "album_image" => Ok(FileKind::AlbumImage),
    other => Err(Error::Decode(format!("unknown file kind: {other:?}"))),
  }
}

// ─── TransportMode ───────────────────────────────────────────────────────────

pub fn encode_transport_mode(m: TransportMode) -> &'static str {
  match m {
    TransportMode::Walking => "walking",
    TransportMode::Cycling => "cycling",
    TransportMode::Driving => "driving",
    TransportMode::Transit => "transit",
  }
}

pub fn decode_transport_mode(s: &str) -> Result<TransportMode> {
  match s {
    "walking" => Ok(TransportMode::Walking),
    "cycling" => Ok(TransportMode::Cycling),
    "driving" => Ok(TransportMode::Driving),
    "transit" => Ok(TransportMode::Transit),
    other => Err(Error::Decode(format!("unknown transport mode: {other:?}"))),
  }
}

// ─── Activity ────────────────────────────────────────────────────────────────

pub fn encode_activity(a: Activity) -> String { a.to_string() }

pub fn decode_activity(s: &str) -> Result<Activity> {
  Activity::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown activity: {s:?}")))
}

// ─── Path geometry ───────────────────────────────────────────────────────────

pub fn encode_path(path: &[Coordinates]) -> Result<String> {
  Ok(serde_json::to_string(path)?)
}

pub fn decode_path(s: &str) -> Result<Vec<Coordinates>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `pois` row.
pub struct RawPoi {
  pub poi_id:     String,
  pub name:       String,
  pub latitude:   f64,
  pub longitude:  f64,
  pub is_deleted: bool,
  pub created_at: String,
}

impl RawPoi {
  pub fn into_poi(self) -> Result<Poi> {
    Ok(Poi {
      poi_id:     decode_uuid(&self.poi_id)?,
      name:       self.name,
      latitude:   self.latitude,
      longitude:  self.longitude,
      is_deleted: self.is_deleted,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `poi_files` row.
pub struct RawPoiFile {
  pub file_id: String,
  pub poi_id:  String,
  pub kind:    String,
  pub url:     String,
}

impl RawPoiFile {
  pub fn into_file(self) -> Result<PoiFile> {
    Ok(PoiFile {
      file_id: decode_uuid(&self.file_id)?,
      poi_id:  decode_uuid(&self.poi_id)?,
      kind:    decode_file_kind(&self.kind)?,
      url:     self.url,
    })
  }
}

/// Raw values read directly from a `circuits` row.
pub struct RawCircuit {
  pub circuit_id: String,
  pub name:       String,
  pub is_premium: bool,
  pub is_deleted: bool,
  pub created_at: String,
}

impl RawCircuit {
  pub fn into_circuit(self) -> Result<Circuit> {
    Ok(Circuit {
      circuit_id: decode_uuid(&self.circuit_id)?,
      name:       self.name,
      is_premium: self.is_premium,
      is_deleted: self.is_deleted,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `routes` row.
pub struct RawRoute {
  pub route_id:       String,
  pub user_id:        String,
  pub circuit_id:     Option<String>,
  pub poi_id:         Option<String>,
  pub is_completed:   bool,
  pub completed_at:   Option<String>,
  pub started_at:     String,
  pub distance_m:     Option<f64>,
  pub duration_s:     Option<i64>,
  pub transport_mode: Option<String>,
  pub path_json:      Option<String>,
  pub points_earned:  Option<i64>,
}

impl RawRoute {
  pub fn into_route(self) -> Result<Route> {
    // Navigation metadata is all-or-nothing; transport_mode anchors it.
    let navigation = match self.transport_mode {
      Some(mode) => Some(Navigation {
        distance_m:     self.distance_m.unwrap_or(0.0),
        duration_s:     self.duration_s.unwrap_or(0) as u32,
        transport_mode: decode_transport_mode(&mode)?,
        path:           self
          .path_json
          .as_deref()
          .map(decode_path)
          .transpose()?
          .unwrap_or_default(),
        points_earned:  self.points_earned.unwrap_or(0) as u32,
      }),
      None => None,
    };

    Ok(Route {
      route_id:     decode_uuid(&self.route_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      circuit_id:   self.circuit_id.as_deref().map(decode_uuid).transpose()?,
      poi_id:       self.poi_id.as_deref().map(decode_uuid).transpose()?,
      is_completed: self.is_completed,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
      started_at:   decode_dt(&self.started_at)?,
      navigation,
    })
  }
}

/// Raw values read directly from a `visited_traces` row.
pub struct RawTrace {
  pub trace_id:    String,
  pub route_id:    String,
  pub latitude:    f64,
  pub longitude:   f64,
  pub poi_id:      Option<String>,
  pub recorded_at: String,
}

impl RawTrace {
  pub fn into_trace(self) -> Result<VisitedTrace> {
    Ok(VisitedTrace {
      trace_id:    decode_uuid(&self.trace_id)?,
      route_id:    decode_uuid(&self.route_id)?,
      coordinates: Coordinates {
        latitude:  self.latitude,
        longitude: self.longitude,
      },
      poi_id:      self.poi_id.as_deref().map(decode_uuid).transpose()?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read directly from a `removed_traces` row.
pub struct RawRemoval {
  pub removal_id:  String,
  pub user_id:     String,
  pub route_id:    String,
  pub poi_id:      String,
  pub recorded_at: String,
}

impl RawRemoval {
  pub fn into_removal(self) -> Result<RemovedTrace> {
    Ok(RemovedTrace {
      removal_id:  decode_uuid(&self.removal_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      route_id:    decode_uuid(&self.route_id)?,
      poi_id:      decode_uuid(&self.poi_id)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read directly from an `albums` row.
pub struct RawAlbum {
  pub album_id:   String,
  pub route_id:   String,
  pub user_id:    String,
  pub name:       String,
  pub created_at: String,
}

impl RawAlbum {
  pub fn into_album(self) -> Result<Album> {
    Ok(Album {
      album_id:   decode_uuid(&self.album_id)?,
      route_id:   decode_uuid(&self.route_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `gamification_rules` row.
pub struct RawRule {
  pub rule_id:     String,
  pub activity:    String,
  pub points:      i64,
  pub description: String,
  pub is_active:   bool,
  pub created_at:  String,
}

impl RawRule {
  pub fn into_rule(self) -> Result<GamificationRule> {
    Ok(GamificationRule {
      rule_id:     decode_uuid(&self.rule_id)?,
      activity:    decode_activity(&self.activity)?,
      points:      self.points,
      description: self.description,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `points_transactions` row.
pub struct RawTx {
  pub tx_id:       String,
  pub user_id:     String,
  pub rule_id:     String,
  pub activity:    String,
  pub points:      i64,
  pub reference:   Option<String>,
  pub is_claimed:  bool,
  pub recorded_at: String,
}

impl RawTx {
  pub fn into_tx(self) -> Result<PointsTransaction> {
    Ok(PointsTransaction {
      tx_id:       decode_uuid(&self.tx_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      rule_id:     decode_uuid(&self.rule_id)?,
      activity:    decode_activity(&self.activity)?,
      points:      self.points,
      reference:   self.reference,
      is_claimed:  self.is_claimed,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
