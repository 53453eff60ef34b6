//! CRUD operations for [`User`] records.

use rusqlite::{params, OptionalExtension};

use parley_shared::types::UserId;

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::models::User;

impl Database {
    /// Insert or replace a user by id.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, first_name, last_name, email, profile_pic)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                first_name  = excluded.first_name,
                last_name   = excluded.last_name,
                email       = excluded.email,
                profile_pic = excluded.profile_pic",
            params![
                user.id.as_str(),
                user.first_name,
                user.last_name,
                user.email,
                user.profile_pic,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, first_name, last_name, email, profile_pic
                 FROM users WHERE id = ?1",
                params![id.as_str()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// The user named by the stored session, if logged in.
    pub fn current_user(&self) -> Result<Option<User>> {
        let Some(session) = self.load_session()? else {
            return Ok(None);
        };
        self.conn()
            .query_row(
                "SELECT id, first_name, last_name, email, profile_pic
                 FROM users WHERE id = ?1",
                params![session.user_id.as_str()],
                row_to_user,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Returns `true` if the user existed.
    pub fn update_user_email(&self, id: &UserId, email: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET email = ?1 WHERE id = ?2",
            params![email, id.as_str()],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_user(&self, id: &UserId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.as_str()])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        profile_pic: row.get(4)?,
    })
}
