//! Protocol error type for envelope decoding and frame conversion.

use thiserror::Error;

/// Errors produced while decoding a wire envelope into a typed frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or not a protocol envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `type` field named a kind the protocol does not define.
    #[error("unknown message type: {0}")]
    UnknownKind(String),

    /// A field the kind requires was absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field was present but carried an unusable value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Envelope field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_display() {
        let err = ProtocolError::UnknownKind("weird".into());
        assert_eq!(err.to_string(), "unknown message type: weird");
    }

    #[test]
    fn missing_field_display() {
        let err = ProtocolError::MissingField("recipient_id");
        assert!(err.to_string().contains("recipient_id"));
    }

    #[test]
    fn malformed_from_serde() {
        let serde_err = serde_json::from_str::<String>("{").unwrap_err();
        let err = ProtocolError::from(serde_err);
        assert!(err.to_string().starts_with("malformed frame"));
    }

    #[test]
    fn invalid_field_display() {
        let err = ProtocolError::InvalidField {
            field: "action",
            reason: "expected start or stop".into(),
        };
        assert!(err.to_string().contains("action"));
        assert!(err.to_string().contains("start or stop"));
    }
}
