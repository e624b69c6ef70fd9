//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use parley_shared::types::UserId;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert or update a user record.  The auth collaborator owns identity
    /// creation; this is how its records land in the shared store.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, username, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 avatar_url = excluded.avatar_url",
            params![
                user.id.as_str(),
                user.username,
                user.avatar_url,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, avatar_url, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.as_str()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List every user except the viewer, ordered by username.
    ///
    /// This backs the client's user directory (sidebar).
    pub fn list_users_except(&self, viewer: &UserId) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, avatar_url, created_at
             FROM users
             WHERE id != ?1
             ORDER BY username ASC",
        )?;

        let rows = stmt.query_map(params![viewer.as_str()], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let username: String = row.get(1)?;
    let avatar_url: Option<String> = row.get(2)?;
    let created_str: String = row.get(3)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: UserId::new(id),
        username,
        avatar_url,
        created_at,
    })
}
