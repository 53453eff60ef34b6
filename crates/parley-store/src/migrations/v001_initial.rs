//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `users`, `chats`, `messages` and `session`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,   -- server-assigned user id
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    profile_pic TEXT NOT NULL DEFAULT ''
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL,  -- tmp-<uuid> or server id
    participants    TEXT NOT NULL,              -- JSON array of user ids
    last_message_id TEXT,
    status          INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    is_online       INTEGER NOT NULL DEFAULT 0,
    user_name       TEXT NOT NULL DEFAULT '',
    consent1        INTEGER NOT NULL DEFAULT 0,
    consent2        INTEGER NOT NULL DEFAULT 0,
    unread_count    INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,              -- RFC-3339
    updated_at      TEXT NOT NULL,
    is_synced       INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_chats_created ON chats(created_at DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- No FK to chats: server messages may arrive before their chat row, and
-- temporary chat ids are rewritten in place on confirmation.
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- tmp-<uuid> or server id
    chat_id    TEXT NOT NULL,
    sender_id  TEXT NOT NULL,
    text       TEXT NOT NULL DEFAULT '',
    status     TEXT NOT NULL DEFAULT 'sent',  -- sent | delivered | read
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_synced  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_created
    ON messages(chat_id, created_at DESC);

-- ----------------------------------------------------------------
-- Session (bearer token, current user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
