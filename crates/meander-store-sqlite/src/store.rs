//! [`SqliteStore`] — the SQLite implementation of [`RouteStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use meander_core::{
  album::{Album, NewAlbum},
  catalog::{
    Circuit, CircuitDetail, CircuitStop, NewCircuit, NewPoi, NewPoiFile, Poi,
    PoiFile,
  },
  route::{NewRoute, Route},
  store::RouteStore,
  trace::{NewVisit, RemovedTrace, VisitedTrace},
};

use crate::{
  Error, Result,
  encode::{
    RawAlbum, RawCircuit, RawPoi, RawPoiFile, RawRemoval, RawRoute, RawTrace,
    encode_dt, encode_file_kind, encode_path, encode_transport_mode,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Meander store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// statements run serially on the connection's worker thread; the
/// completion-flag compare-and-set additionally guards the false→true
/// transition at the SQL level.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn route_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRoute> {
  Ok(RawRoute {
    route_id:       row.get(0)?,
    user_id:        row.get(1)?,
    circuit_id:     row.get(2)?,
    poi_id:         row.get(3)?,
    is_completed:   row.get(4)?,
    completed_at:   row.get(5)?,
    started_at:     row.get(6)?,
    distance_m:     row.get(7)?,
    duration_s:     row.get(8)?,
    transport_mode: row.get(9)?,
    path_json:      row.get(10)?,
    points_earned:  row.get(11)?,
  })
}

const ROUTE_COLUMNS: &str = "route_id, user_id, circuit_id, poi_id, \
   is_completed, completed_at, started_at, distance_m, duration_s, \
   transport_mode, path_json, points_earned";

fn trace_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTrace> {
  Ok(RawTrace {
    trace_id:    row.get(0)?,
    route_id:    row.get(1)?,
    latitude:    row.get(2)?,
    longitude:   row.get(3)?,
    poi_id:      row.get(4)?,
    recorded_at: row.get(5)?,
  })
}

// ─── RouteStore impl ─────────────────────────────────────────────────────────

impl RouteStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn add_poi(&self, input: NewPoi) -> Result<Poi> {
    let poi = Poi {
      poi_id:     Uuid::new_v4(),
      name:       input.name,
      latitude:   input.latitude,
      longitude:  input.longitude,
      is_deleted: false,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(poi.poi_id);
    let name     = poi.name.clone();
    let lat      = poi.latitude;
    let lon      = poi.longitude;
    let at_str   = encode_dt(poi.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pois (poi_id, name, latitude, longitude, is_deleted, created_at)
           VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![id_str, name, lat, lon, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(poi)
  }

  async fn add_poi_file(&self, input: NewPoiFile) -> Result<PoiFile> {
    let file = PoiFile {
      file_id: Uuid::new_v4(),
      poi_id:  input.poi_id,
      kind:    input.kind,
      url:     input.url,
    };

    let file_id_str = encode_uuid(file.file_id);
    let poi_id_str  = encode_uuid(file.poi_id);
    let kind_str    = encode_file_kind(file.kind).to_owned();
    let url         = file.url.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO poi_files (file_id, poi_id, kind, url) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![file_id_str, poi_id_str, kind_str, url],
        )?;
        Ok(())
      })
      .await?;

    Ok(file)
  }

  async fn add_circuit(&self, input: NewCircuit) -> Result<Circuit> {
    let circuit = Circuit {
      circuit_id: Uuid::new_v4(),
      name:       input.name,
      is_premium: input.is_premium,
      is_deleted: false,
      created_at: Utc::now(),
    };

    let id_str  = encode_uuid(circuit.circuit_id);
    let name    = circuit.name.clone();
    let premium = circuit.is_premium;
    let at_str  = encode_dt(circuit.created_at);
    let stops: Vec<(String, i64, Option<i64>)> = input
      .stops
      .iter()
      .enumerate()
      .map(|(i, s)| {
        (
          encode_uuid(s.poi_id),
          (i + 1) as i64,
          s.estimated_time_min.map(i64::from),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO circuits (circuit_id, name, is_premium, is_deleted, created_at)
           VALUES (?1, ?2, ?3, 0, ?4)",
          rusqlite::params![id_str, name, premium, at_str],
        )?;
        for (poi_id, position, est) in &stops {
          tx.execute(
            "INSERT INTO circuit_pois (circuit_id, poi_id, position, estimated_time_min)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id_str, poi_id, position, est],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(circuit)
  }

  async fn get_circuit_with_pois(
    &self,
    circuit_id: Uuid,
  ) -> Result<Option<CircuitDetail>> {
    let id_str = encode_uuid(circuit_id);

    let raw: Option<(RawCircuit, Vec<(String, i64, Option<i64>)>)> = self
      .conn
      .call(move |conn| {
        let circuit = conn
          .query_row(
            "SELECT circuit_id, name, is_premium, is_deleted, created_at
             FROM circuits WHERE circuit_id = ?1 AND is_deleted = 0",
            rusqlite::params![id_str],
            |row| {
              Ok(RawCircuit {
                circuit_id: row.get(0)?,
                name:       row.get(1)?,
                is_premium: row.get(2)?,
                is_deleted: row.get(3)?,
                created_at: row.get(4)?,
              })
            },
          )
          .optional()?;

        let Some(circuit) = circuit else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT cp.poi_id, cp.position, cp.estimated_time_min
           FROM circuit_pois cp
           JOIN pois p ON p.poi_id = cp.poi_id
           WHERE cp.circuit_id = ?1 AND p.is_deleted = 0
           ORDER BY cp.position",
        )?;
        let stops = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((circuit, stops)))
      })
      .await?;

    let Some((raw_circuit, raw_stops)) = raw else {
      return Ok(None);
    };

    let stops = raw_stops
      .into_iter()
      .map(|(poi_id, position, est)| {
        Ok(CircuitStop {
          poi_id:             crate::encode::decode_uuid(&poi_id)?,
          position:           position as u32,
          estimated_time_min: est.map(|v| v as u32),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Some(CircuitDetail { circuit: raw_circuit.into_circuit()?, stops }))
  }

  // ── Routes ────────────────────────────────────────────────────────────────

  async fn create_route(&self, input: NewRoute) -> Result<Route> {
    let route = Route {
      route_id:     Uuid::new_v4(),
      user_id:      input.user_id,
      circuit_id:   input.circuit_id,
      poi_id:       input.poi_id,
      is_completed: input.is_completed,
      completed_at: input.completed_at,
      started_at:   Utc::now(),
      navigation:   input.navigation,
    };

    let route_id_str   = encode_uuid(route.route_id);
    let user_id_str    = encode_uuid(route.user_id);
    let circuit_id_str = route.circuit_id.map(encode_uuid);
    let poi_id_str     = route.poi_id.map(encode_uuid);
    let completed      = route.is_completed;
    let completed_str  = route.completed_at.map(encode_dt);
    let started_str    = encode_dt(route.started_at);
    let (distance, duration, mode_str, path_str, points) = match &route.navigation {
      Some(nav) => (
        Some(nav.distance_m),
        Some(i64::from(nav.duration_s)),
        Some(encode_transport_mode(nav.transport_mode).to_owned()),
        Some(encode_path(&nav.path)?),
        Some(i64::from(nav.points_earned)),
      ),
      None => (None, None, None, None, None),
    };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO routes (
             route_id, user_id, circuit_id, poi_id, is_completed, completed_at,
             started_at, distance_m, duration_s, transport_mode, path_json,
             points_earned
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            route_id_str,
            user_id_str,
            circuit_id_str,
            poi_id_str,
            completed,
            completed_str,
            started_str,
            distance,
            duration,
            mode_str,
            path_str,
            points,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(route)
  }

  async fn get_route(&self, route_id: Uuid) -> Result<Option<Route>> {
    let id_str = encode_uuid(route_id);
    let sql = format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE route_id = ?1");

    let raw: Option<RawRoute> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], route_from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRoute::into_route).transpose()
  }

  async fn list_routes(
    &self,
    user_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Route>> {
    let user_str   = encode_uuid(user_id);
    let limit_val  = limit as i64;
    let offset_val = offset as i64;
    let sql = format!(
      "SELECT {ROUTE_COLUMNS} FROM routes WHERE user_id = ?1
       ORDER BY started_at DESC LIMIT ?2 OFFSET ?3"
    );

    let raws: Vec<RawRoute> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![user_str, limit_val, offset_val],
            route_from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRoute::into_route).collect()
  }

  async fn complete_route(
    &self,
    route_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(route_id);
    let at_str = encode_dt(at);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE routes SET is_completed = 1, completed_at = ?2
           WHERE route_id = ?1 AND is_completed = 0",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(rows > 0)
  }

  async fn reopen_route(&self, route_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(route_id);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE routes SET is_completed = 0, completed_at = NULL
           WHERE route_id = ?1 AND is_completed = 1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(rows > 0)
  }

  // ── Trace ledger ──────────────────────────────────────────────────────────

  async fn record_visit(&self, input: NewVisit) -> Result<VisitedTrace> {
    let trace = VisitedTrace {
      trace_id:    Uuid::new_v4(),
      route_id:    input.route_id,
      coordinates: input.coordinates,
      poi_id:      input.poi_id,
      recorded_at: Utc::now(),
    };

    let trace_id_str = encode_uuid(trace.trace_id);
    let route_id_str = encode_uuid(trace.route_id);
    let lat          = trace.coordinates.latitude;
    let lon          = trace.coordinates.longitude;
    let poi_id_str   = trace.poi_id.map(encode_uuid);
    let at_str       = encode_dt(trace.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO visited_traces (trace_id, route_id, latitude, longitude, poi_id, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![trace_id_str, route_id_str, lat, lon, poi_id_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(trace)
  }

  async fn record_removal(
    &self,
    user_id: Uuid,
    route_id: Uuid,
    poi_id: Uuid,
  ) -> Result<(RemovedTrace, bool)> {
    let fresh = RemovedTrace {
      removal_id: Uuid::new_v4(),
      user_id,
      route_id,
      poi_id,
      recorded_at: Utc::now(),
    };

    let removal_id_str = encode_uuid(fresh.removal_id);
    let user_id_str    = encode_uuid(user_id);
    let route_id_str   = encode_uuid(route_id);
    let poi_id_str     = encode_uuid(poi_id);
    let at_str         = encode_dt(fresh.recorded_at);

    // Check-then-insert runs in one closure on the connection thread, so no
    // second writer can interleave between the two statements.
    let existing: Option<RawRemoval> = self
      .conn
      .call(move |conn| {
        let existing = conn
          .query_row(
            "SELECT removal_id, user_id, route_id, poi_id, recorded_at
             FROM removed_traces WHERE route_id = ?1 AND poi_id = ?2",
            rusqlite::params![route_id_str, poi_id_str],
            |row| {
              Ok(RawRemoval {
                removal_id:  row.get(0)?,
                user_id:     row.get(1)?,
                route_id:    row.get(2)?,
                poi_id:      row.get(3)?,
                recorded_at: row.get(4)?,
              })
            },
          )
          .optional()?;

        if existing.is_some() {
          return Ok(existing);
        }

        conn.execute(
          "INSERT INTO removed_traces (removal_id, user_id, route_id, poi_id, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![removal_id_str, user_id_str, route_id_str, poi_id_str, at_str],
        )?;
        Ok(None)
      })
      .await?;

    match existing {
      Some(raw) => Ok((raw.into_removal()?, false)),
      None => Ok((fresh, true)),
    }
  }

  async fn undo_removal(&self, route_id: Uuid, poi_id: Uuid) -> Result<bool> {
    let route_id_str = encode_uuid(route_id);
    let poi_id_str   = encode_uuid(poi_id);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM removed_traces WHERE route_id = ?1 AND poi_id = ?2",
          rusqlite::params![route_id_str, poi_id_str],
        )?)
      })
      .await?;

    Ok(rows > 0)
  }

  async fn visited_poi_ids(&self, route_id: Uuid) -> Result<BTreeSet<Uuid>> {
    let id_str = encode_uuid(route_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT poi_id FROM visited_traces
           WHERE route_id = ?1 AND poi_id IS NOT NULL",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn removed_poi_ids(&self, route_id: Uuid) -> Result<BTreeSet<Uuid>> {
    let id_str = encode_uuid(route_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT poi_id FROM removed_traces WHERE route_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn list_traces(&self, route_id: Uuid) -> Result<Vec<VisitedTrace>> {
    let id_str = encode_uuid(route_id);

    let raws: Vec<RawTrace> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT trace_id, route_id, latitude, longitude, poi_id, recorded_at
           FROM visited_traces WHERE route_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], trace_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTrace::into_trace).collect()
  }

  // ── Albums ────────────────────────────────────────────────────────────────

  async fn find_route_album(&self, route_id: Uuid) -> Result<Option<Album>> {
    let id_str = encode_uuid(route_id);

    let raw: Option<RawAlbum> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT album_id, route_id, user_id, name, created_at
               FROM albums WHERE route_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawAlbum {
                  album_id:   row.get(0)?,
                  route_id:   row.get(1)?,
                  user_id:    row.get(2)?,
                  name:       row.get(3)?,
                  created_at: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAlbum::into_album).transpose()
  }

  async fn create_album(&self, input: NewAlbum) -> Result<Album> {
    let album = Album {
      album_id:   Uuid::new_v4(),
      route_id:   input.route_id,
      user_id:    input.user_id,
      name:       input.name,
      created_at: Utc::now(),
    };

    let album_id_str = encode_uuid(album.album_id);
    let route_id_str = encode_uuid(album.route_id);
    let user_id_str  = encode_uuid(album.user_id);
    let name         = album.name.clone();
    let at_str       = encode_dt(album.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO albums (album_id, route_id, user_id, name, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![album_id_str, route_id_str, user_id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(album)
  }

  async fn album_files_for_pois(&self, poi_ids: Vec<Uuid>) -> Result<Vec<PoiFile>> {
    if poi_ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = poi_ids.into_iter().map(encode_uuid).collect();

    let raws: Vec<RawPoiFile> = self
      .conn
      .call(move |conn| {
        let placeholders =
          vec!["?"; id_strs.len()].join(", ");
        let sql = format!(
          "SELECT file_id, poi_id, kind, url FROM poi_files
           WHERE kind = 'album_image' AND poi_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), |row| {
            Ok(RawPoiFile {
              file_id: row.get(0)?,
              poi_id:  row.get(1)?,
              kind:    row.get(2)?,
              url:     row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPoiFile::into_file).collect()
  }

  async fn link_album_files(
    &self,
    album_id: Uuid,
    file_ids: Vec<Uuid>,
  ) -> Result<usize> {
    let album_id_str = encode_uuid(album_id);
    let file_id_strs: Vec<String> =
      file_ids.into_iter().map(encode_uuid).collect();

    let linked = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut linked = 0usize;
        for file_id in &file_id_strs {
          linked += tx.execute(
            "INSERT OR IGNORE INTO album_files (album_id, file_id) VALUES (?1, ?2)",
            rusqlite::params![album_id_str, file_id],
          )?;
        }
        tx.commit()?;
        Ok(linked)
      })
      .await?;

    Ok(linked)
  }
}

// ─── Extra reads ─────────────────────────────────────────────────────────────

impl SqliteStore {
  /// Fetch a POI by id; used by ingest tooling and tests.
  pub async fn get_poi(&self, poi_id: Uuid) -> Result<Option<Poi>> {
    let id_str = encode_uuid(poi_id);

    let raw: Option<RawPoi> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT poi_id, name, latitude, longitude, is_deleted, created_at
               FROM pois WHERE poi_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawPoi {
                  poi_id:     row.get(0)?,
                  name:       row.get(1)?,
                  latitude:   row.get(2)?,
                  longitude:  row.get(3)?,
                  is_deleted: row.get(4)?,
                  created_at: row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPoi::into_poi).transpose()
  }

  /// Files linked into an album, for display and tests.
  pub async fn list_album_files(&self, album_id: Uuid) -> Result<Vec<PoiFile>> {
    let id_str = encode_uuid(album_id);

    let raws: Vec<RawPoiFile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT f.file_id, f.poi_id, f.kind, f.url
           FROM album_files af
           JOIN poi_files f ON f.file_id = af.file_id
           WHERE af.album_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawPoiFile {
              file_id: row.get(0)?,
              poi_id:  row.get(1)?,
              kind:    row.get(2)?,
              url:     row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPoiFile::into_file).collect()
  }
}
