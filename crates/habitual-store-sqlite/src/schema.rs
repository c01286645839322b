//! SQL schema for the Habitual SQLite files.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Record store DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const STORE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS habits (
    id            TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    title         TEXT NOT NULL,
    is_completed  INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL    -- RFC 3339 UTC, fixed width
);

-- Append-only. Several rows for one (owner_id, date) are tolerated;
-- readers keep the earliest.
CREATE TABLE IF NOT EXISTS completion_history (
    id                     TEXT PRIMARY KEY,
    owner_id               TEXT NOT NULL,
    date                   TEXT NOT NULL,   -- YYYY-MM-DD
    completion_percentage  REAL NOT NULL,
    created_at             TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS habits_owner_idx  ON habits(owner_id, created_at);
CREATE INDEX IF NOT EXISTS history_owner_idx ON completion_history(owner_id, date);

PRAGMA user_version = 1;
";

/// Local settings DDL. Kept in its own file, separate from the records.
pub const SETTINGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
";
