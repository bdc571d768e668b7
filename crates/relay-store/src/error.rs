//! Error types for the persistence layer.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(i64),

    /// Referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// The user is not a participant of the conversation.
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        /// Conversation involved.
        conversation_id: i64,
        /// User who attempted the operation.
        user_id: i64,
    },
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_not_found_display() {
        let err = StoreError::ConversationNotFound(7);
        assert_eq!(err.to_string(), "conversation not found: 7");
    }

    #[test]
    fn not_participant_display() {
        let err = StoreError::NotParticipant {
            conversation_id: 7,
            user_id: 3,
        };
        assert!(err.to_string().contains("user 3"));
        assert!(err.to_string().contains("conversation 7"));
    }

    #[test]
    fn sqlite_error_converts() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().starts_with("sqlite error"));
    }
}
