//! Message repository — append and read-receipt operations.

use relay_core::StoredMessage;
use rusqlite::{Connection, params};

use crate::error::Result;

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message and return the persisted row joined with the
    /// sender's display name.
    pub fn insert(
        conn: &Connection,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage> {
        let sent_at = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO messages (conversation_id, sender_id, content, sent_at, is_read)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![conversation_id, sender_id, content, sent_at],
        )?;
        let id = conn.last_insert_rowid();
        let sender_name: String = conn.query_row(
            "SELECT display_name FROM users WHERE id = ?1",
            [sender_id],
            |row| row.get(0),
        )?;
        Ok(StoredMessage {
            message_id: id,
            conversation_id,
            sender_id,
            sender_name,
            content: content.to_owned(),
            sent_at,
            is_read: false,
        })
    }

    /// Mark every unread message from other senders in the conversation as
    /// read. Returns the number of rows flipped.
    pub fn mark_conversation_read(
        conn: &Connection,
        conversation_id: i64,
        reader_id: i64,
    ) -> Result<usize> {
        let flipped = conn.execute(
            "UPDATE messages SET is_read = 1
             WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![conversation_id, reader_id],
        )?;
        Ok(flipped)
    }

    /// Number of unread messages in a conversation from senders other than
    /// `reader_id`.
    pub fn unread_count(conn: &Connection, conversation_id: i64, reader_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![conversation_id, reader_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::pool::{ConnectionConfig, new_in_memory};
    use crate::repos::conversations::ConversationRepo;
    use crate::repos::users::UserRepo;

    fn setup() -> (crate::pool::PooledConnection, i64, i64, i64) {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        let _ = run_migrations(&conn).unwrap();
        let a = UserRepo::create(&conn, "ada", "Ada", "x").unwrap().id;
        let b = UserRepo::create(&conn, "bob", "Bob", "x").unwrap().id;
        let convo = ConversationRepo::create(&conn, &[a, b]).unwrap();
        (conn, a, b, convo)
    }

    #[test]
    fn insert_returns_populated_row() {
        let (conn, a, _b, convo) = setup();
        let stored = MessageRepo::insert(&conn, convo, a, "hello").unwrap();
        assert!(stored.message_id > 0);
        assert_eq!(stored.conversation_id, convo);
        assert_eq!(stored.sender_id, a);
        assert_eq!(stored.sender_name, "Ada");
        assert_eq!(stored.content, "hello");
        assert!(!stored.is_read);
    }

    #[test]
    fn insert_with_unknown_sender_fails() {
        let (conn, _a, _b, convo) = setup();
        assert!(MessageRepo::insert(&conn, convo, 999, "hello").is_err());
    }

    #[test]
    fn insert_with_unknown_conversation_fails() {
        let (conn, a, _b, _convo) = setup();
        assert!(MessageRepo::insert(&conn, 999, a, "hello").is_err());
    }

    #[test]
    fn mark_read_flips_only_other_senders() {
        let (conn, a, b, convo) = setup();
        let _ = MessageRepo::insert(&conn, convo, a, "from ada").unwrap();
        let _ = MessageRepo::insert(&conn, convo, b, "from bob").unwrap();

        // Bob reads: only Ada's message flips.
        let flipped = MessageRepo::mark_conversation_read(&conn, convo, b).unwrap();
        assert_eq!(flipped, 1);
        assert_eq!(MessageRepo::unread_count(&conn, convo, b).unwrap(), 0);
        // Bob's own message is still unread from Ada's point of view.
        assert_eq!(MessageRepo::unread_count(&conn, convo, a).unwrap(), 1);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (conn, a, b, convo) = setup();
        let _ = MessageRepo::insert(&conn, convo, a, "hi").unwrap();
        assert_eq!(MessageRepo::mark_conversation_read(&conn, convo, b).unwrap(), 1);
        assert_eq!(MessageRepo::mark_conversation_read(&conn, convo, b).unwrap(), 0);
    }
}
