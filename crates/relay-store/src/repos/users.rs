//! User repository — account rows and presence flags.

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;

/// One row of the `users` table.
#[derive(Clone, Debug)]
pub struct UserRow {
    /// Database-assigned user id.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Whether the user is currently marked online.
    pub online: bool,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

/// User repository — stateless, every method takes `&Connection`.
pub struct UserRepo;

impl UserRepo {
    /// Create a user and return the stored row.
    pub fn create(
        conn: &Connection,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO users (username, display_name, password_hash, online, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![username, display_name, password_hash, now],
        )?;
        let id = conn.last_insert_rowid();
        Ok(UserRow {
            id,
            username: username.to_owned(),
            display_name: display_name.to_owned(),
            online: false,
            created_at: now,
        })
    }

    /// Look up a user by login name.
    pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
        let row = conn
            .query_row(
                "SELECT id, username, display_name, online, created_at
                 FROM users WHERE username = ?1",
                [username],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Display name of a user, if the user exists.
    pub fn display_name(conn: &Connection, user_id: i64) -> Result<Option<String>> {
        let name = conn
            .query_row(
                "SELECT display_name FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// Set the persisted presence flag. Returns false if the user is unknown.
    pub fn set_online(conn: &Connection, user_id: i64, online: bool) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE users SET online = ?1 WHERE id = ?2",
            params![i32::from(online), user_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            online: row.get::<_, i32>(3)? != 0,
            created_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::pool::{ConnectionConfig, new_in_memory};

    fn conn() -> crate::pool::PooledConnection {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn create_and_find() {
        let conn = conn();
        let user = UserRepo::create(&conn, "ada", "Ada Lovelace", "x").unwrap();
        assert!(user.id > 0);
        assert!(!user.online);

        let found = UserRepo::find_by_username(&conn, "ada").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.display_name, "Ada Lovelace");
    }

    #[test]
    fn find_unknown_returns_none() {
        let conn = conn();
        assert!(UserRepo::find_by_username(&conn, "ghost").unwrap().is_none());
        assert!(UserRepo::display_name(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let conn = conn();
        let _ = UserRepo::create(&conn, "ada", "Ada", "x").unwrap();
        assert!(UserRepo::create(&conn, "ada", "Other Ada", "y").is_err());
    }

    #[test]
    fn set_online_roundtrip() {
        let conn = conn();
        let user = UserRepo::create(&conn, "ada", "Ada", "x").unwrap();
        assert!(UserRepo::set_online(&conn, user.id, true).unwrap());
        let found = UserRepo::find_by_username(&conn, "ada").unwrap().unwrap();
        assert!(found.online);
        assert!(UserRepo::set_online(&conn, user.id, false).unwrap());
    }

    #[test]
    fn set_online_unknown_user() {
        let conn = conn();
        assert!(!UserRepo::set_online(&conn, 12345, true).unwrap());
    }
}
