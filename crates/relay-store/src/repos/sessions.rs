//! Session repository — opaque token issuance and lookup.
//!
//! Token verification (expiry, user match) belongs to `relay-auth`; this
//! repository only stores and retrieves rows.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::Result;

/// One row of the `sessions` table.
#[derive(Clone, Debug)]
pub struct SessionRow {
    /// Opaque session token.
    pub token: String,
    /// Owning user.
    pub user_id: i64,
    /// Issuance timestamp, RFC 3339.
    pub created_at: String,
    /// Expiry timestamp, RFC 3339.
    pub expires_at: String,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Issue a session token for a user, valid for `ttl`.
    pub fn create(
        conn: &Connection,
        user_id: i64,
        ttl: chrono::Duration,
    ) -> Result<SessionRow> {
        let token = format!("tok_{}", Uuid::now_v7());
        let now = chrono::Utc::now();
        let row = SessionRow {
            token,
            user_id,
            created_at: now.to_rfc3339(),
            expires_at: (now + ttl).to_rfc3339(),
        };
        let _ = conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.token, row.user_id, row.created_at, row.expires_at],
        )?;
        Ok(row)
    }

    /// Look up a session by token.
    pub fn find(conn: &Connection, token: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                [token],
                |row| {
                    Ok(SessionRow {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
