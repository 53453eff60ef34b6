//! Temporary-to-server id remapping.
//!
//! A UI may still hold a `tmp-` id after reconciliation swapped it out;
//! these lookups translate it to the live id.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use parley_shared::types::{ChatId, MessageId, RecordKind};

use crate::codec::{conversion_error, encode_ts, parse_ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::IdRemap;

impl Database {
    /// The live id for `id`: the server id if it was remapped, else `id`.
    pub fn resolve_chat_id(&self, id: &ChatId) -> Result<ChatId> {
        Ok(self
            .lookup_remap(id.as_str(), RecordKind::Chat)?
            .map(ChatId)
            .unwrap_or_else(|| id.clone()))
    }

    pub fn resolve_message_id(&self, id: &MessageId) -> Result<MessageId> {
        Ok(self
            .lookup_remap(id.as_str(), RecordKind::Message)?
            .map(MessageId)
            .unwrap_or_else(|| id.clone()))
    }

    /// Every recorded remap, oldest first.
    pub fn list_remaps(&self) -> Result<Vec<IdRemap>> {
        let mut stmt = self.conn().prepare(
            "SELECT temp_id, server_id, kind, remapped_at
             FROM id_remaps ORDER BY remapped_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(2)?;
            let ts_str: String = row.get(3)?;
            Ok(IdRemap {
                temp_id: row.get(0)?,
                server_id: row.get(1)?,
                kind: kind_str.parse().map_err(|e| conversion_error(2, e))?,
                remapped_at: parse_ts(3, &ts_str)?,
            })
        })?;

        let mut remaps = Vec::new();
        for row in rows {
            remaps.push(row?);
        }
        Ok(remaps)
    }

    fn lookup_remap(&self, temp_id: &str, kind: RecordKind) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT server_id FROM id_remaps WHERE temp_id = ?1 AND kind = ?2",
                params![temp_id, kind.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}

/// Called inside the confirm transactions.
pub(crate) fn record_remap(
    conn: &Connection,
    temp_id: &str,
    server_id: &str,
    kind: RecordKind,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO id_remaps (temp_id, server_id, kind, remapped_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![temp_id, server_id, kind.as_str(), encode_ts(&Utc::now())],
    )?;
    Ok(())
}
