//! SQL schema for the Meander SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS pois (
    poi_id      TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS poi_files (
    file_id TEXT PRIMARY KEY,
    poi_id  TEXT NOT NULL REFERENCES pois(poi_id),
    kind    TEXT NOT NULL,   -- 'image' | 'album_image'
    url     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS circuits (
    circuit_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    is_premium  INTEGER NOT NULL DEFAULT 0,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS circuit_pois (
    circuit_id         TEXT NOT NULL REFERENCES circuits(circuit_id),
    poi_id             TEXT NOT NULL REFERENCES pois(poi_id),
    position           INTEGER NOT NULL,
    estimated_time_min INTEGER,
    PRIMARY KEY (circuit_id, poi_id)
);

-- Exactly one of circuit_id / poi_id is set: a circuit traversal or a
-- standalone-POI navigation record.
CREATE TABLE IF NOT EXISTS routes (
    route_id       TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    circuit_id     TEXT REFERENCES circuits(circuit_id),
    poi_id         TEXT REFERENCES pois(poi_id),
    is_completed   INTEGER NOT NULL DEFAULT 0,
    completed_at   TEXT,
    started_at     TEXT NOT NULL,
    distance_m     REAL,
    duration_s     INTEGER,
    transport_mode TEXT,
    path_json      TEXT,            -- JSON array of coordinates
    points_earned  INTEGER,
    CHECK ((circuit_id IS NULL) != (poi_id IS NULL))
);

-- Visited traces are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS visited_traces (
    trace_id    TEXT PRIMARY KEY,
    route_id    TEXT NOT NULL REFERENCES routes(route_id),
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    poi_id      TEXT,               -- NULL for a bare GPS ping
    recorded_at TEXT NOT NULL
);

-- At most one live removal per (route, poi); undoing deletes the row.
CREATE TABLE IF NOT EXISTS removed_traces (
    removal_id  TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    route_id    TEXT NOT NULL REFERENCES routes(route_id),
    poi_id      TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    UNIQUE (route_id, poi_id)
);

-- One album per route; a repeated completion reuses it.
CREATE TABLE IF NOT EXISTS albums (
    album_id    TEXT PRIMARY KEY,
    route_id    TEXT NOT NULL REFERENCES routes(route_id),
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (route_id)
);

CREATE TABLE IF NOT EXISTS album_files (
    album_id TEXT NOT NULL REFERENCES albums(album_id),
    file_id  TEXT NOT NULL REFERENCES poi_files(file_id),
    PRIMARY KEY (album_id, file_id)
);

CREATE TABLE IF NOT EXISTS gamification_rules (
    rule_id     TEXT PRIMARY KEY,
    activity    TEXT NOT NULL UNIQUE,
    points      INTEGER NOT NULL,
    description TEXT NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

-- Point awards are append-only; the (activity, reference) pair is the
-- idempotency key, so a retried award is a silent no-op.
CREATE TABLE IF NOT EXISTS points_transactions (
    tx_id       TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    rule_id     TEXT NOT NULL REFERENCES gamification_rules(rule_id),
    activity    TEXT NOT NULL,
    points      INTEGER NOT NULL,
    reference   TEXT,
    is_claimed  INTEGER NOT NULL DEFAULT 0,
    recorded_at TEXT NOT NULL,
    UNIQUE (activity, reference)
);

CREATE INDEX IF NOT EXISTS traces_route_idx    ON visited_traces(route_id);
CREATE INDEX IF NOT EXISTS removals_route_idx  ON removed_traces(route_id);
CREATE INDEX IF NOT EXISTS routes_user_idx     ON routes(user_id);
CREATE INDEX IF NOT EXISTS files_poi_idx       ON poi_files(poi_id);
CREATE INDEX IF NOT EXISTS tx_user_idx         ON points_transactions(user_id);

PRAGMA user_version = 1;
";
