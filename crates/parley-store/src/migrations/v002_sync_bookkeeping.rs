//! v002 -- Sync bookkeeping.
//!
//! Adds retry counters to `chats` and `messages`, indexes over unsynced
//! rows and the `id_remaps` table.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Retry bookkeeping for unsynced rows
ALTER TABLE chats ADD COLUMN sync_attempts INTEGER NOT NULL DEFAULT 0;
ALTER TABLE chats ADD COLUMN last_sync_error TEXT;
ALTER TABLE messages ADD COLUMN sync_attempts INTEGER NOT NULL DEFAULT 0;
ALTER TABLE messages ADD COLUMN last_sync_error TEXT;

CREATE INDEX IF NOT EXISTS idx_chats_unsynced ON chats(is_synced, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_unsynced ON messages(is_synced, created_at);

-- Temporary id -> server id, so stale ids held by a UI still resolve
CREATE TABLE IF NOT EXISTS id_remaps (
    temp_id     TEXT PRIMARY KEY NOT NULL,
    server_id   TEXT NOT NULL,
    kind        TEXT NOT NULL CHECK(kind IN ('chat', 'message')),
    remapped_at TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
