//! Flat JSON wire envelope.
//!
//! Every frame on the wire is one JSON object of this shape. All fields
//! except `type` are optional and kind-dependent; absent fields are omitted
//! from the serialized output entirely rather than written as `null`.

use serde::{Deserialize, Serialize};

/// The flat wire shape carrying any frame kind.
///
/// This struct exists only at the serialization boundary — decode into a
/// [`crate::Frame`] immediately on receipt, and build one of these only when
/// writing to the transport.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Message kind discriminator. The only mandatory field.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sending user id (server-stamped on inbound frames).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    /// Addressed user id, where the kind targets a single user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    /// Text content for private/broadcast/notification/error frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Server timestamp, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Subject user id for presence frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Recipient user id on inbound private/typing frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<i64>,
    /// Structured payload for status/online-users/new-conversation frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Marks a private message as opening a new conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_conversation: Option<bool>,
    /// Conversation the message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    /// Machine-readable code on `error` frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Generic id field (kind-dependent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Database-assigned id of a persisted message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Persisted sender id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    /// Resolved display name of the sender/reader.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Persisted sent-at timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    /// Read flag on persisted private messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    /// Typing action: `start` or `stop`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Envelope {
    /// Build an empty envelope of the given kind.
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            ..Self::default()
        }
    }

    /// Decode an envelope from one wire frame.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to a single wire frame.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
