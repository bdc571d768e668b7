//! Typed message frames.
//!
//! [`Frame`] is the internal representation of one protocol message — one
//! variant per kind, carrying exactly the fields that kind uses. Frames are
//! lowered to the flat [`Envelope`] only when written to the transport.
//! The reverse direction (envelope to frame) lives with inbound validation
//! in the server, because several kinds need liveness lookups to accept.

use std::str::FromStr;

use crate::envelope::Envelope;

/// Current server timestamp in RFC 3339 format.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Typing indicator action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingAction {
    /// The sender began typing.
    Start,
    /// The sender stopped typing.
    Stop,
}

impl TypingAction {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl FromStr for TypingAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            _ => Err(()),
        }
    }
}

/// A private message as persisted by the store — the fully-populated shape
/// delivered to both the recipient and the sender.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredMessage {
    /// Database-assigned message id.
    pub message_id: i64,
    /// Conversation the message belongs to.
    pub conversation_id: i64,
    /// Authenticated sender id.
    pub sender_id: i64,
    /// Sender display name at persist time.
    pub sender_name: String,
    /// Message body.
    pub content: String,
    /// Persisted sent-at timestamp.
    pub sent_at: String,
    /// Read flag (always false when freshly persisted).
    pub is_read: bool,
}

/// One protocol message, typed by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Inbound private message, validated and server-stamped.
    Private {
        /// Authenticated sender.
        sender_id: i64,
        /// Addressed recipient.
        recipient_id: i64,
        /// Existing conversation id; `None` only when `is_new_conversation`.
        conversation_id: Option<i64>,
        /// Whether this message opens a new conversation.
        is_new_conversation: bool,
        /// Message body.
        content: String,
        /// Server receive timestamp.
        timestamp: String,
    },
    /// Outbound persisted private message.
    PrivateDelivery(StoredMessage),
    /// Message for every connected client.
    Broadcast {
        /// Authenticated sender.
        sender_id: i64,
        /// Message body.
        content: String,
        /// Server receive timestamp.
        timestamp: String,
    },
    /// Server or operator announcement for every connected client.
    Notification {
        /// Authenticated sender.
        sender_id: i64,
        /// Announcement body.
        content: String,
        /// Server receive timestamp.
        timestamp: String,
    },
    /// Typing indicator for a single recipient.
    Typing {
        /// User who is typing.
        sender_id: i64,
        /// User watching the indicator.
        recipient_id: i64,
        /// Start or stop.
        action: TypingAction,
        /// Sender display name, resolved at delivery time.
        sender_name: Option<String>,
        /// Server receive timestamp.
        timestamp: String,
    },
    /// Presence change for one user, fanned out to everyone else.
    UserStatus {
        /// Subject user.
        user_id: i64,
        /// True when the user came online, false when they left.
        online: bool,
        /// Server timestamp.
        timestamp: String,
    },
    /// Snapshot of currently connected user ids.
    OnlineUsers {
        /// Online user ids, sorted ascending.
        users: Vec<i64>,
        /// Server timestamp.
        timestamp: String,
    },
    /// A conversation was just created for the recipient's benefit.
    NewConversation {
        /// Newly assigned conversation id.
        conversation_id: i64,
        /// Both participant ids.
        participants: [i64; 2],
        /// Server timestamp.
        timestamp: String,
    },
    /// A participant read a conversation.
    ReadStatus {
        /// Conversation that was read.
        conversation_id: i64,
        /// User who read it.
        reader_id: i64,
        /// Reader display name.
        reader_name: String,
        /// Server timestamp.
        timestamp: String,
    },
    /// Application-level keepalive reply.
    Pong {
        /// Server timestamp.
        timestamp: String,
    },
    /// Typed error reported back to a sender.
    Error {
        /// Machine-readable code from [`crate::codes`].
        code: String,
        /// Human-readable description.
        message: String,
        /// Server timestamp.
        timestamp: String,
    },
}

impl Frame {
    /// Wire kind string for this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Private { .. } | Self::PrivateDelivery(_) => "private",
            Self::Broadcast { .. } => "broadcast",
            Self::Notification { .. } => "notification",
            Self::Typing { .. } => "typing",
            Self::UserStatus { .. } => "user_status",
            Self::OnlineUsers { .. } => "online_users",
            Self::NewConversation { .. } => "new_conversation",
            Self::ReadStatus { .. } => "read_status",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }

    /// Build an error frame with the current timestamp.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_owned(),
            message: message.into(),
            timestamp: now_timestamp(),
        }
    }

    /// Build a pong frame with the current timestamp.
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: now_timestamp(),
        }
    }

    /// Build a presence frame with the current timestamp.
    pub fn user_status(user_id: i64, online: bool) -> Self {
        Self::UserStatus {
            user_id,
            online,
            timestamp: now_timestamp(),
        }
    }

    /// Build an online-users snapshot with the current timestamp.
    pub fn online_users(mut users: Vec<i64>) -> Self {
        users.sort_unstable();
        Self::OnlineUsers {
            users,
            timestamp: now_timestamp(),
        }
    }

    /// Lower this frame to its flat wire envelope.
    pub fn to_envelope(&self) -> Envelope {
        let mut env = Envelope::of_kind(self.kind());
        match self {
            Self::Private {
                sender_id,
                recipient_id,
                conversation_id,
                is_new_conversation,
                content,
                timestamp,
            } => {
                env.from = Some(*sender_id);
                env.recipient_id = Some(*recipient_id);
                env.conversation_id = *conversation_id;
                env.is_new_conversation = Some(*is_new_conversation);
                env.content = Some(content.clone());
                env.timestamp = Some(timestamp.clone());
            }
            Self::PrivateDelivery(stored) => {
                env.message_id = Some(stored.message_id);
                env.conversation_id = Some(stored.conversation_id);
                env.sender_id = Some(stored.sender_id);
                env.sender_name = Some(stored.sender_name.clone());
                env.content = Some(stored.content.clone());
                env.sent_at = Some(stored.sent_at.clone());
                env.is_read = Some(stored.is_read);
                env.timestamp = Some(stored.sent_at.clone());
            }
            Self::Broadcast {
                sender_id,
                content,
                timestamp,
            }
            | Self::Notification {
                sender_id,
                content,
                timestamp,
            } => {
                env.from = Some(*sender_id);
                env.content = Some(content.clone());
                env.timestamp = Some(timestamp.clone());
            }
            Self::Typing {
                sender_id,
                recipient_id,
                action,
                sender_name,
                timestamp,
            } => {
                env.from = Some(*sender_id);
                env.to = Some(*recipient_id);
                env.action = Some(action.as_str().to_owned());
                env.sender_name.clone_from(sender_name);
                env.timestamp = Some(timestamp.clone());
            }
            Self::UserStatus {
                user_id,
                online,
                timestamp,
            } => {
                env.user_id = Some(*user_id);
                env.data = Some(serde_json::json!({
                    "status": if *online { "online" } else { "offline" },
                }));
                env.timestamp = Some(timestamp.clone());
            }
            Self::OnlineUsers { users, timestamp } => {
                env.data = Some(serde_json::json!({ "users": users }));
                env.timestamp = Some(timestamp.clone());
            }
            Self::NewConversation {
                conversation_id,
                participants,
                timestamp,
            } => {
                env.conversation_id = Some(*conversation_id);
                env.data = Some(serde_json::json!({ "participants": participants }));
                env.timestamp = Some(timestamp.clone());
            }
            Self::ReadStatus {
                conversation_id,
                reader_id,
                reader_name,
                timestamp,
            } => {
                env.conversation_id = Some(*conversation_id);
                env.user_id = Some(*reader_id);
                env.sender_name = Some(reader_name.clone());
                env.timestamp = Some(timestamp.clone());
            }
            Self::Pong { timestamp } => {
                env.timestamp = Some(timestamp.clone());
            }
            Self::Error {
                code,
                message,
                timestamp,
            } => {
                env.code = Some(code.clone());
                env.content = Some(message.clone());
                env.timestamp = Some(timestamp.clone());
            }
        }
        env
    }

    /// Serialize this frame to one wire frame.
    pub fn to_json(&self) -> crate::Result<String> {
        self.to_envelope().to_json()
    }
}
