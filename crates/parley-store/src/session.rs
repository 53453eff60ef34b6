//! Persistence of the logged-in [`Session`].

use rusqlite::{params, OptionalExtension};

use parley_shared::types::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::Session;

const KEY_USER_ID: &str = "user_id";
const KEY_TOKEN: &str = "token";

impl Database {
    pub fn save_session(&self, session: &Session) -> Result<()> {
        let mut stmt = self.conn().prepare(
            "INSERT INTO session (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )?;
        stmt.execute(params![KEY_USER_ID, session.user_id.as_str()])?;
        stmt.execute(params![KEY_TOKEN, session.token])?;
        Ok(())
    }

    /// `None` unless both the user id and the token are stored.
    pub fn load_session(&self) -> Result<Option<Session>> {
        let user_id = self.session_value(KEY_USER_ID)?;
        let token = self.session_value(KEY_TOKEN)?;
        Ok(match (user_id, token) {
            (Some(user_id), Some(token)) => Some(Session {
                user_id: UserId(user_id),
                token,
            }),
            _ => None,
        })
    }

    pub fn clear_session(&self) -> Result<()> {
        self.conn().execute("DELETE FROM session", [])?;
        Ok(())
    }

    fn session_value(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM session WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }
}
