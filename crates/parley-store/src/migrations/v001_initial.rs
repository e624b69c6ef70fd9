//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `chat_requests`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,   -- opaque identity from the auth layer
    username   TEXT NOT NULL,
    avatar_url TEXT,
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chat requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_requests (
    id          TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    status      TEXT NOT NULL,              -- pending | accepted | rejected
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Backs the duplicate-pending guard for an ordered (sender, receiver) pair.
CREATE INDEX IF NOT EXISTS idx_requests_ordered_pair
    ON chat_requests(sender_id, receiver_id, status);

-- Backs the pending-inbox query, newest first.
CREATE INDEX IF NOT EXISTS idx_requests_receiver_status
    ON chat_requests(receiver_id, status, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_requests_receiver ON chat_requests(receiver_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    sender_id       TEXT NOT NULL,
    receiver_id     TEXT NOT NULL,
    text            TEXT,
    attachment_url  TEXT,
    attachment_kind TEXT,                       -- image | video | audio | file
    attachment_name TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_pair_ts
    ON messages(sender_id, receiver_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
