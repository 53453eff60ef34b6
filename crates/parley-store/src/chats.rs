//! CRUD operations for [`Chat`] records, including confirmation of
//! locally created chats against their server-assigned id.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use parley_shared::types::{ChatId, MessageId, RecordKind, UserId};

use crate::codec::{conversion_error, encode_ts, parse_ts};
use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::Chat;
use crate::remaps::record_remap;

const CHAT_COLUMNS: &str = "id, participants, last_message_id, status, is_online, user_name,
     consent1, consent2, unread_count, created_at, updated_at, is_synced,
     sync_attempts, last_sync_error";

const UPSERT_CHAT_SQL: &str = "INSERT INTO chats (id, participants, last_message_id, status,
        is_online, user_name, consent1, consent2, unread_count, created_at, updated_at,
        is_synced, sync_attempts, last_sync_error)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
     ON CONFLICT(id) DO UPDATE SET
        participants    = excluded.participants,
        last_message_id = excluded.last_message_id,
        status          = excluded.status,
        is_online       = excluded.is_online,
        user_name       = excluded.user_name,
        consent1        = excluded.consent1,
        consent2        = excluded.consent2,
        unread_count    = excluded.unread_count,
        created_at      = excluded.created_at,
        updated_at      = excluded.updated_at,
        is_synced       = excluded.is_synced,
        sync_attempts   = excluded.sync_attempts,
        last_sync_error = excluded.last_sync_error";

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert a chat, or overwrite the row with the same id.
    pub fn upsert_chat(&self, chat: &Chat) -> Result<()> {
        upsert_chat_with(self.conn(), chat)
    }

    /// Upsert a batch of chats in a single transaction.
    pub fn upsert_chats(&mut self, chats: &[Chat]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        for chat in chats {
            upsert_chat_with(&tx, chat)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Point a chat at its newest message.
    pub fn set_chat_last_message(&self, id: &ChatId, message_id: &MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats SET last_message_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![message_id.as_str(), encode_ts(&Utc::now()), id.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Replace a temporary chat id with the one the server assigned.
    ///
    /// Runs in one transaction: the chat row is renamed (or dropped when a
    /// row with `server_id` was already pulled from the server), marked
    /// synced, its messages follow the new id, and the remap is recorded.
    /// Returns `false` if no chat with `temp_id` exists.
    pub fn confirm_chat(&mut self, temp_id: &ChatId, server_id: &ChatId) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        if !row_exists(&tx, "SELECT 1 FROM chats WHERE id = ?1", temp_id.as_str())? {
            return Ok(false);
        }

        if temp_id != server_id {
            let server_row_exists =
                row_exists(&tx, "SELECT 1 FROM chats WHERE id = ?1", server_id.as_str())?;
            if server_row_exists {
                tx.execute("DELETE FROM chats WHERE id = ?1", params![temp_id.as_str()])?;
            } else {
                tx.execute(
                    "UPDATE chats SET id = ?1 WHERE id = ?2",
                    params![server_id.as_str(), temp_id.as_str()],
                )?;
            }

            tx.execute(
                "UPDATE messages SET chat_id = ?1 WHERE chat_id = ?2",
                params![server_id.as_str(), temp_id.as_str()],
            )?;
            record_remap(&tx, temp_id.as_str(), server_id.as_str(), RecordKind::Chat)?;
        }

        tx.execute(
            "UPDATE chats SET is_synced = 1, sync_attempts = 0, last_sync_error = NULL
             WHERE id = ?1",
            params![server_id.as_str()],
        )?;

        tx.commit()?;
        tracing::debug!(temp = %temp_id, server = %server_id, "chat confirmed");
        Ok(true)
    }

    /// Count a failed confirmation attempt; the chat stays unsynced.
    pub fn record_chat_sync_failure(&self, id: &ChatId, error: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE chats SET sync_attempts = sync_attempts + 1, last_sync_error = ?1
             WHERE id = ?2",
            params![error, id.as_str()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_chat(&self, id: &ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id.as_str()],
                row_to_chat,
            )
            .map_err(not_found)
    }

    /// All chats, newest first.
    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        self.query_chats(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY created_at DESC"
        ))
    }

    /// Chats still waiting for server confirmation, oldest first.
    pub fn list_unsynced_chats(&self) -> Result<Vec<Chat>> {
        self.query_chats(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE is_synced = 0 ORDER BY created_at ASC"
        ))
    }

    fn query_chats(&self, sql: &str) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_chat(&self, id: &ChatId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![id.as_str()])?;
        Ok(affected > 0)
    }

    /// Drop every cached chat. Messages are left alone.
    pub fn clear_chats(&self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM chats", [])?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn upsert_chat_with(conn: &Connection, chat: &Chat) -> Result<()> {
    let participants = serde_json::to_string(&chat.participants)?;
    conn.execute(
        UPSERT_CHAT_SQL,
        params![
            chat.id.as_str(),
            participants,
            chat.last_message_id.as_ref().map(|m| m.as_str()),
            chat.status,
            chat.is_online,
            chat.user_name,
            chat.consent1,
            chat.consent2,
            chat.unread_count,
            encode_ts(&chat.created_at),
            encode_ts(&chat.updated_at),
            chat.is_synced,
            chat.sync_attempts,
            chat.last_sync_error,
        ],
    )?;
    Ok(())
}

pub(crate) fn row_exists(conn: &Connection, sql: &str, id: &str) -> Result<bool> {
    Ok(conn
        .query_row(sql, params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let participants_json: String = row.get(1)?;
    let participants: Vec<UserId> =
        serde_json::from_str(&participants_json).map_err(|e| conversion_error(1, e))?;
    let last_message_id: Option<String> = row.get(2)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    Ok(Chat {
        id: ChatId(row.get(0)?),
        participants,
        last_message_id: last_message_id.map(MessageId),
        status: row.get(3)?,
        is_online: row.get(4)?,
        user_name: row.get(5)?,
        consent1: row.get(6)?,
        consent2: row.get(7)?,
        unread_count: row.get(8)?,
        created_at: parse_ts(9, &created_str)?,
        updated_at: parse_ts(10, &updated_str)?,
        is_synced: row.get(11)?,
        sync_attempts: row.get(12)?,
        last_sync_error: row.get(13)?,
    })
}
