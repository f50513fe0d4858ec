//! SQL schema for the Warden SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    displayname TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT 'null',  -- JSON
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    role_id     TEXT PRIMARY KEY,
    displayname TEXT NOT NULL,
    tags        TEXT NOT NULL DEFAULT '[]'     -- JSON array of strings
);

CREATE TABLE IF NOT EXISTS user_groups (
    group_id    TEXT PRIMARY KEY,
    displayname TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT 'null',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Positional tuples; slot meaning depends on ptype ('p' | 'g' | 'g2').
-- Rows are inserted and deleted, never updated.
CREATE TABLE IF NOT EXISTS relation_tuples (
    tuple_id TEXT PRIMARY KEY,
    ptype    TEXT NOT NULL,
    v0       TEXT,
    v1       TEXT,
    v2       TEXT,
    v3       TEXT,
    v4       TEXT,
    v5       TEXT
);

-- Append-only audit log.
CREATE TABLE IF NOT EXISTS activities (
    activity_id TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, microsecond precision
    actor       TEXT NOT NULL,
    model       TEXT NOT NULL,   -- 'group' | 'relation_tuple'
    document_id TEXT NOT NULL,   -- '0' for creations
    document    TEXT NOT NULL,   -- JSON pre-state
    title       TEXT NOT NULL,
    diffs       TEXT NOT NULL    -- JSON array of diff operations
);

CREATE INDEX IF NOT EXISTS tuples_ptype_idx       ON relation_tuples(ptype);
CREATE INDEX IF NOT EXISTS activities_created_idx ON activities(created_at);

PRAGMA user_version = 1;
";
