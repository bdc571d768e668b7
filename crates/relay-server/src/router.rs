//! Private-message persistence routing.
//!
//! The hub hands a validated private frame to the router, which resolves or
//! creates the conversation, persists the message, and reports the stored
//! row plus whether a conversation was created along the way. Store failures
//! are mapped to protocol error codes here so the hub only ever reports
//! typed errors to the sender.

use relay_core::{StoredMessage, codes};
use relay_store::{ChatStore, StoreError};
use tracing::error;

/// Result of persisting one private message.
#[derive(Debug)]
pub struct RoutedMessage {
    /// The persisted row, ready for delivery to both participants.
    pub stored: StoredMessage,
    /// Set when this message opened a new conversation.
    pub created_conversation: Option<CreatedConversation>,
}

/// A conversation created as a side effect of routing.
#[derive(Debug)]
pub struct CreatedConversation {
    /// Newly assigned id.
    pub conversation_id: i64,
    /// Both participant ids, sender first.
    pub participants: [i64; 2],
}

/// Why a private message could not be persisted, expressed as a protocol
/// error code plus a message for the sender.
#[derive(Debug)]
pub struct RouteError {
    /// Code from [`codes`].
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl RouteError {
    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::ConversationNotFound(id) => Self {
                code: codes::CONVERSATION_NOT_FOUND,
                message: format!("conversation {id} does not exist"),
            },
            StoreError::UserNotFound(id) => Self {
                code: codes::INVALID_RECIPIENT,
                message: format!("user {id} does not exist"),
            },
            other => {
                error!(error = %other, "message persistence failed");
                Self {
                    code: codes::DATABASE_ERROR,
                    message: "message could not be persisted".to_owned(),
                }
            }
        }
    }
}

/// Store-backed router for private messages.
pub struct Router {
    store: ChatStore,
}

impl Router {
    /// Wrap the store.
    pub fn new(store: ChatStore) -> Self {
        Self { store }
    }

    /// Access the underlying store (presence, display names, read receipts).
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Persist one validated private message.
    ///
    /// When `conversation_id` is `None` a fresh conversation between sender
    /// and recipient is created first.
    pub fn persist_private(
        &self,
        sender_id: i64,
        recipient_id: i64,
        conversation_id: Option<i64>,
        content: &str,
    ) -> Result<RoutedMessage, RouteError> {
        let (conversation_id, created_conversation) = match conversation_id {
            Some(id) => (id, None),
            None => {
                let id = self
                    .store
                    .create_conversation(&[sender_id, recipient_id])
                    .map_err(RouteError::from_store)?;
                (
                    id,
                    Some(CreatedConversation {
                        conversation_id: id,
                        participants: [sender_id, recipient_id],
                    }),
                )
            }
        };

        let stored = self
            .store
            .append_message(conversation_id, sender_id, content)
            .map_err(RouteError::from_store)?;

        Ok(RoutedMessage {
            stored,
            created_conversation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::migrations::run_migrations;
    use relay_store::pool::{ConnectionConfig, new_in_memory};

    fn router_with_users(n: usize) -> (Router, Vec<i64>) {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = run_migrations(&conn).unwrap();
        }
        let store = ChatStore::new(pool);
        let ids = (0..n)
            .map(|i| {
                store
                    .create_user(&format!("user{i}"), &format!("User {i}"), "x")
                    .unwrap()
                    .id
            })
            .collect();
        (Router::new(store), ids)
    }

    #[test]
    fn persist_into_existing_conversation() {
        let (router, users) = router_with_users(2);
        let convo = router.store().create_conversation(&users).unwrap();

        let routed = router
            .persist_private(users[0], users[1], Some(convo), "hello")
            .unwrap();
        assert_eq!(routed.stored.conversation_id, convo);
        assert_eq!(routed.stored.sender_id, users[0]);
        assert!(routed.created_conversation.is_none());
    }

    #[test]
    fn persist_creates_conversation_when_asked() {
        let (router, users) = router_with_users(2);
        let routed = router
            .persist_private(users[0], users[1], None, "first")
            .unwrap();

        let created = routed.created_conversation.unwrap();
        assert_eq!(created.participants, [users[0], users[1]]);
        assert_eq!(routed.stored.conversation_id, created.conversation_id);
    }

    #[test]
    fn missing_conversation_maps_to_protocol_code() {
        let (router, users) = router_with_users(2);
        let err = router
            .persist_private(users[0], users[1], Some(404), "hi")
            .unwrap_err();
        assert_eq!(err.code, codes::CONVERSATION_NOT_FOUND);
    }

    #[test]
    fn unknown_recipient_on_new_conversation() {
        let (router, users) = router_with_users(1);
        let err = router
            .persist_private(users[0], 999, None, "hi")
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_RECIPIENT);
    }
}
