//! Conversation repository — thread rows and participant membership.

use rusqlite::{Connection, params};

use crate::error::Result;

/// Conversation repository — stateless, every method takes `&Connection`.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Create a conversation with the given participants inside one
    /// transaction, returning its id.
    pub fn create(conn: &Connection, participant_ids: &[i64]) -> Result<i64> {
        let tx = conn.unchecked_transaction()?;
        let _ = tx.execute(
            "INSERT INTO conversations (created_at) VALUES (?1)",
            [chrono::Utc::now().to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        for user_id in participant_ids {
            let _ = tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                params![id, user_id],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Whether a conversation exists.
    pub fn exists(conn: &Connection, conversation_id: i64) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Participant ids of a conversation, sorted ascending. Empty when the
    /// conversation does not exist.
    pub fn participants_of(conn: &Connection, conversation_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM conversation_participants
             WHERE conversation_id = ?1 ORDER BY user_id",
        )?;
        let ids = stmt
            .query_map([conversation_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }
}
