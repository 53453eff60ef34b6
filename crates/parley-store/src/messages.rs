//! CRUD operations for [`Message`] records.

use rusqlite::{params, Connection};

use parley_shared::types::{ChatId, DeliveryStatus, MessageId, RecordKind, UserId};

use crate::chats::row_exists;
use crate::codec::{conversion_error, encode_ts, parse_ts};
use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::Message;
use crate::remaps::record_remap;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, text, status, is_deleted,
     created_at, updated_at, is_synced, sync_attempts, last_sync_error";

impl Database {
    /// Insert a message, or overwrite the row with the same id.
    pub fn upsert_message(&self, msg: &Message) -> Result<()> {
        upsert_message_with(self.conn(), msg)
    }

    /// Upsert a batch of messages in a single transaction.
    pub fn upsert_messages(&mut self, msgs: &[Message]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        for msg in msgs {
            upsert_message_with(&tx, msg)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_message(&self, id: &MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.as_str()],
                row_to_message,
            )
            .map_err(not_found)
    }

    /// Messages of a chat, newest first.
    pub fn list_messages_for_chat(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE chat_id = ?1 ORDER BY created_at DESC"
            ),
            params![chat_id.as_str()],
        )
    }

    /// Messages still waiting for server confirmation, oldest first.
    pub fn list_unsynced_messages(&self) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE is_synced = 0 ORDER BY created_at ASC"
            ),
            [],
        )
    }

    fn query_messages<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_message)?;

        let mut msgs = Vec::new();
        for row in rows {
            msgs.push(row?);
        }
        Ok(msgs)
    }

    /// Replace a temporary message id with the server-assigned one.
    ///
    /// Same shape as [`Database::confirm_chat`]: one transaction renames the
    /// row (or drops it when the server copy is already cached), rewrites
    /// `chats.last_message_id` and records the remap.
    pub fn confirm_message(&mut self, temp_id: &MessageId, server_id: &MessageId) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        if !row_exists(&tx, "SELECT 1 FROM messages WHERE id = ?1", temp_id.as_str())? {
            return Ok(false);
        }

        if temp_id != server_id {
            let server_row_exists =
                row_exists(&tx, "SELECT 1 FROM messages WHERE id = ?1", server_id.as_str())?;
            if server_row_exists {
                tx.execute("DELETE FROM messages WHERE id = ?1", params![temp_id.as_str()])?;
            } else {
                tx.execute(
                    "UPDATE messages SET id = ?1 WHERE id = ?2",
                    params![server_id.as_str(), temp_id.as_str()],
                )?;
            }

            tx.execute(
                "UPDATE chats SET last_message_id = ?1 WHERE last_message_id = ?2",
                params![server_id.as_str(), temp_id.as_str()],
            )?;
            record_remap(&tx, temp_id.as_str(), server_id.as_str(), RecordKind::Message)?;
        }

        tx.execute(
            "UPDATE messages SET is_synced = 1, sync_attempts = 0, last_sync_error = NULL
             WHERE id = ?1",
            params![server_id.as_str()],
        )?;

        tx.commit()?;
        tracing::debug!(temp = %temp_id, server = %server_id, "message confirmed");
        Ok(true)
    }

    pub fn record_message_sync_failure(&self, id: &MessageId, error: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE messages SET sync_attempts = sync_attempts + 1, last_sync_error = ?1
             WHERE id = ?2",
            params![error, id.as_str()],
        )?;
        Ok(())
    }

    /// Soft-delete; the row stays so the chat history keeps its shape.
    pub fn mark_message_deleted(&self, id: &MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_deleted = 1 WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(affected > 0)
    }
}

fn upsert_message_with(conn: &Connection, msg: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, chat_id, sender_id, text, status, is_deleted,
            created_at, updated_at, is_synced, sync_attempts, last_sync_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            chat_id         = excluded.chat_id,
            sender_id       = excluded.sender_id,
            text            = excluded.text,
            status          = excluded.status,
            is_deleted      = excluded.is_deleted,
            created_at      = excluded.created_at,
            updated_at      = excluded.updated_at,
            is_synced       = excluded.is_synced,
            sync_attempts   = excluded.sync_attempts,
            last_sync_error = excluded.last_sync_error",
        params![
            msg.id.as_str(),
            msg.chat_id.as_str(),
            msg.sender_id.as_str(),
            msg.text,
            msg.status.as_str(),
            msg.is_deleted,
            encode_ts(&msg.created_at),
            encode_ts(&msg.updated_at),
            msg.is_synced,
            msg.sync_attempts,
            msg.last_sync_error,
        ],
    )?;
    Ok(())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let status_str: String = row.get(4)?;
    let status: DeliveryStatus = status_str.parse().map_err(|e| conversion_error(4, e))?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Message {
        id: MessageId(row.get(0)?),
        chat_id: ChatId(row.get(1)?),
        sender_id: UserId(row.get(2)?),
        text: row.get(3)?,
        status,
        is_deleted: row.get(5)?,
        created_at: parse_ts(6, &created_str)?,
        updated_at: parse_ts(7, &updated_str)?,
        is_synced: row.get(8)?,
        sync_attempts: row.get(9)?,
        last_sync_error: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::Chat;
    use chrono::{Duration, Utc};

    fn msg_in(chat: &ChatId, text: &str) -> Message {
        Message::new_local(chat.clone(), UserId::from("me"), text.into())
    }

    #[test]
    fn test_list_for_chat_newest_first() {
        let mut db = Database::open_in_memory().unwrap();
        let chat = ChatId::from("c1");
        let mut first = msg_in(&chat, "first");
        first.created_at = Utc::now() - Duration::seconds(30);
        let second = msg_in(&chat, "second");
        let elsewhere = msg_in(&ChatId::from("c2"), "other chat");
        db.upsert_messages(&[first, second, elsewhere]).unwrap();

        let texts: Vec<String> = db
            .list_messages_for_chat(&chat)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn test_status_survives_storage() {
        let db = Database::open_in_memory().unwrap();
        let mut msg = msg_in(&ChatId::from("c1"), "seen");
        msg.status = DeliveryStatus::Read;
        db.upsert_message(&msg).unwrap();
        assert_eq!(db.get_message(&msg.id).unwrap().status, DeliveryStatus::Read);
    }

    #[test]
    fn test_confirm_replaces_id_without_duplicate() {
        let mut db = Database::open_in_memory().unwrap();
        let mut chat = Chat::new_local(UserId::from("me"), UserId::from("you"), "A,B".into());
        chat.id = ChatId::from("c1");
        chat.is_synced = true;
        db.upsert_chat(&chat).unwrap();

        let msg = msg_in(&chat.id, "hello");
        db.upsert_message(&msg).unwrap();
        db.set_chat_last_message(&chat.id, &msg.id).unwrap();

        let server_id = MessageId::from("srv-msg-1");
        assert!(db.confirm_message(&msg.id, &server_id).unwrap());

        let msgs = db.list_messages_for_chat(&chat.id).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, server_id);
        assert!(msgs[0].is_synced);
        assert!(matches!(db.get_message(&msg.id), Err(StoreError::NotFound)));
        assert!(db.list_unsynced_messages().unwrap().is_empty());

        let chat = db.get_chat(&chat.id).unwrap();
        assert_eq!(chat.last_message_id, Some(server_id.clone()));
        assert_eq!(db.resolve_message_id(&msg.id).unwrap(), server_id);
    }

    #[test]
    fn test_failed_send_leaves_single_unsynced_row() {
        let db = Database::open_in_memory().unwrap();
        let msg = msg_in(&ChatId::from("c1"), "offline");
        db.upsert_message(&msg).unwrap();
        db.record_message_sync_failure(&msg.id, "connection refused").unwrap();
        db.record_message_sync_failure(&msg.id, "connection refused").unwrap();

        let unsynced = db.list_unsynced_messages().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].sync_attempts, 2);
        assert_eq!(unsynced[0].last_sync_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_soft_delete() {
        let db = Database::open_in_memory().unwrap();
        let msg = msg_in(&ChatId::from("c1"), "oops");
        db.upsert_message(&msg).unwrap();
        assert!(db.mark_message_deleted(&msg.id).unwrap());
        assert!(db.get_message(&msg.id).unwrap().is_deleted);
        assert!(!db.mark_message_deleted(&MessageId::from("missing")).unwrap());
    }
}
