//! Machine-readable error codes carried by `error` frames.
//!
//! Codes are stable strings: clients switch on them, so renaming one is a
//! breaking protocol change.

/// Private or typing message addressed to a user with no live connection.
pub const RECIPIENT_OFFLINE: &str = "RECIPIENT_OFFLINE";
/// Recipient id missing or non-positive.
pub const INVALID_RECIPIENT: &str = "INVALID_RECIPIENT";
/// Content missing or empty where required.
pub const EMPTY_CONTENT: &str = "EMPTY_CONTENT";
/// Conversation id missing or non-positive on an existing-conversation message.
pub const INVALID_CONVERSATION: &str = "INVALID_CONVERSATION";
/// Referenced conversation does not exist in the store.
pub const CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
/// Persistence failed for a reason other than a missing conversation.
pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
/// Frame kind exists but may only be produced by the server.
pub const SERVER_GENERATED: &str = "SERVER_GENERATED";
/// Frame kind is not part of the protocol.
pub const UNKNOWN_TYPE: &str = "UNKNOWN_TYPE";
/// Typing action was neither `start` nor `stop`.
pub const INVALID_ACTION: &str = "INVALID_ACTION";
/// Frame could not be parsed as a protocol envelope.
pub const MALFORMED_FRAME: &str = "MALFORMED_FRAME";
/// A private message could not be enqueued to the recipient.
pub const DELIVERY_FAILED: &str = "DELIVERY_FAILED";
