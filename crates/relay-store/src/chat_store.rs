//! `ChatStore` — the narrow persistence interface the hub calls.
//!
//! Wraps the connection pool and exposes exactly the operations the hub and
//! its collaborators need: conversation creation, message append, mark-read,
//! presence, and display-name resolution. Everything else (user and session
//! provisioning) exists for bootstrap and tests.

use relay_core::StoredMessage;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::pool::ConnectionPool;
use crate::repos::{ConversationRepo, MessageRepo, SessionRepo, SessionRow, UserRepo, UserRow};

/// Display name used when a lookup fails. A missing name is a non-fatal
/// degradation, never an error.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Pool-backed persistence facade.
pub struct ChatStore {
    pool: ConnectionPool,
}

impl ChatStore {
    /// Wrap an already-migrated connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create a conversation with exactly the given participants and return
    /// its id. Every participant must be a known user.
    pub fn create_conversation(&self, participant_ids: &[i64]) -> Result<i64> {
        let conn = self.pool.get()?;
        for &user_id in participant_ids {
            if UserRepo::display_name(&conn, user_id)?.is_none() {
                return Err(StoreError::UserNotFound(user_id));
            }
        }
        ConversationRepo::create(&conn, participant_ids)
    }

    /// Append a message to an existing conversation and return the persisted
    /// row (assigned id, resolved sender name, sent-at).
    pub fn append_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage> {
        let conn = self.pool.get()?;
        if !ConversationRepo::exists(&conn, conversation_id)? {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        MessageRepo::insert(&conn, conversation_id, sender_id, content)
    }

    /// Mark a conversation read by `reader_id` and return the other
    /// participants' ids (the notify list).
    ///
    /// Marking a conversation the reader is not part of is an error.
    pub fn mark_read(&self, conversation_id: i64, reader_id: i64) -> Result<Vec<i64>> {
        let conn = self.pool.get()?;
        let participants = ConversationRepo::participants_of(&conn, conversation_id)?;
        if participants.is_empty() {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        if !participants.contains(&reader_id) {
            return Err(StoreError::NotParticipant {
                conversation_id,
                user_id: reader_id,
            });
        }
        let _ = MessageRepo::mark_conversation_read(&conn, conversation_id, reader_id)?;
        Ok(participants.into_iter().filter(|&id| id != reader_id).collect())
    }

    /// Persist a user's presence flag.
    pub fn set_presence(&self, user_id: i64, online: bool) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = UserRepo::set_online(&conn, user_id, online)?;
        Ok(())
    }

    /// Resolve a user's display name, falling back to a placeholder when
    /// the user is unknown or the lookup fails.
    pub fn resolve_display_name(&self, user_id: i64) -> String {
        let lookup = self
            .pool
            .get()
            .map_err(StoreError::from)
            .and_then(|conn| UserRepo::display_name(&conn, user_id));
        match lookup {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_DISPLAY_NAME.to_owned(),
            Err(e) => {
                warn!(user_id, error = %e, "display name lookup failed");
                UNKNOWN_DISPLAY_NAME.to_owned()
            }
        }
    }

    /// Create a user (bootstrap and tests).
    pub fn create_user(
        &self,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let conn = self.pool.get()?;
        UserRepo::create(&conn, username, display_name, password_hash)
    }

    /// Issue a session token for a user (bootstrap and tests).
    pub fn create_session(&self, user_id: i64, ttl: chrono::Duration) -> Result<SessionRow> {
        let conn = self.pool.get()?;
        SessionRepo::create(&conn, user_id, ttl)
    }

    /// Look up a session row by token.
    pub fn find_session(&self, token: &str) -> Result<Option<SessionRow>> {
        let conn = self.pool.get()?;
        SessionRepo::find(&conn, token)
    }
}
