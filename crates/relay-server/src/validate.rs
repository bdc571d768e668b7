//! Inbound frame classification.
//!
//! Every decoded envelope is turned into a discriminated result: forward to
//! the hub, answer inline from the read loop, or reject with a typed error
//! code. Rejection never terminates the connection — the read loop reports
//! the error to the sender and keeps reading.

use relay_core::{Envelope, Frame, TypingAction, codes, frame::now_timestamp};

use crate::registry::RegistryHandle;

/// What the read loop should do with one inbound envelope.
#[derive(Debug, PartialEq)]
pub enum InboundAction {
    /// Validated; submit to the hub's inbound queue.
    Forward(Frame),
    /// Answered inline; enqueue this reply on the sender's own queue,
    /// bypassing the hub entirely.
    Reply(Frame),
    /// Invalid; report this code and message to the sender.
    Reject {
        /// Machine-readable code from [`codes`].
        code: &'static str,
        /// Human-readable description.
        message: String,
    },
}

fn reject(code: &'static str, message: impl Into<String>) -> InboundAction {
    InboundAction::Reject {
        code,
        message: message.into(),
    }
}

/// Classify an inbound envelope from an authenticated sender.
///
/// The sender id and server timestamp are stamped here; whatever `from` or
/// `timestamp` the client wrote is discarded.
pub fn classify(env: &Envelope, sender_id: i64, registry: &RegistryHandle) -> InboundAction {
    match env.kind.as_str() {
        "private" => classify_private(env, sender_id, registry),
        "broadcast" | "notification" => {
            let Some(content) = non_empty(env.content.as_deref()) else {
                return reject(codes::EMPTY_CONTENT, "content must not be empty");
            };
            let frame = if env.kind == "broadcast" {
                Frame::Broadcast {
                    sender_id,
                    content,
                    timestamp: now_timestamp(),
                }
            } else {
                Frame::Notification {
                    sender_id,
                    content,
                    timestamp: now_timestamp(),
                }
            };
            InboundAction::Forward(frame)
        }
        "typing" => classify_typing(env, sender_id, registry),
        "user_status" | "online_users" => reject(
            codes::SERVER_GENERATED,
            format!("{} frames are server-generated", env.kind),
        ),
        "get_online_users" => InboundAction::Reply(Frame::online_users(registry.online_users())),
        "ping" => InboundAction::Reply(Frame::pong()),
        other => reject(codes::UNKNOWN_TYPE, format!("unknown message type: {other}")),
    }
}

fn classify_private(env: &Envelope, sender_id: i64, registry: &RegistryHandle) -> InboundAction {
    let Some(recipient_id) = positive(env.recipient_id) else {
        return reject(codes::INVALID_RECIPIENT, "recipient_id must be a positive user id");
    };
    let Some(content) = non_empty(env.content.as_deref()) else {
        return reject(codes::EMPTY_CONTENT, "content must not be empty");
    };
    if !registry.is_online(recipient_id) {
        return reject(
            codes::RECIPIENT_OFFLINE,
            format!("user {recipient_id} is not online"),
        );
    }

    let is_new_conversation = env.is_new_conversation.unwrap_or(false);
    let conversation_id = if is_new_conversation {
        None
    } else {
        match positive(env.conversation_id) {
            Some(id) => Some(id),
            None => {
                return reject(
                    codes::INVALID_CONVERSATION,
                    "conversation_id must be a positive id unless is_new_conversation is set",
                );
            }
        }
    };

    InboundAction::Forward(Frame::Private {
        sender_id,
        recipient_id,
        conversation_id,
        is_new_conversation,
        content,
        timestamp: now_timestamp(),
    })
}

fn classify_typing(env: &Envelope, sender_id: i64, registry: &RegistryHandle) -> InboundAction {
    let Some(recipient_id) = positive(env.recipient_id) else {
        return reject(codes::INVALID_RECIPIENT, "recipient_id must be a positive user id");
    };
    let action = match env.action.as_deref().map(str::parse::<TypingAction>) {
        Some(Ok(action)) => action,
        _ => return reject(codes::INVALID_ACTION, "action must be `start` or `stop`"),
    };
    if !registry.is_online(recipient_id) {
        return reject(
            codes::RECIPIENT_OFFLINE,
            format!("user {recipient_id} is not online"),
        );
    }
    InboundAction::Forward(Frame::Typing {
        sender_id,
        recipient_id,
        action,
        sender_name: None,
        timestamp: now_timestamp(),
    })
}

fn positive(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use tokio::sync::mpsc;

    fn registry_with_online(users: &[i64]) -> RegistryHandle {
        let registry = RegistryHandle::new();
        for &user_id in users {
            let (tx, rx) = mpsc::channel(8);
            // Keep receivers alive for the duration of the test.
            std::mem::forget(rx);
            let client = Client::new(user_id, tx);
            let mut members = registry.write();
            let _ = members.clients.insert(client.id.clone(), client.clone());
            let _ = members.by_user.insert(user_id, client);
        }
        registry
    }

    fn env(json: &str) -> Envelope {
        Envelope::from_json(json).unwrap()
    }

    fn rejected_code(action: InboundAction) -> &'static str {
        match action {
            InboundAction::Reject { code, .. } => code,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn valid_private_forwards_with_stamp() {
        let registry = registry_with_online(&[2]);
        let action = classify(
            &env(r#"{"type":"private","recipient_id":2,"conversation_id":7,"content":"hi"}"#),
            1,
            &registry,
        );
        match action {
            InboundAction::Forward(Frame::Private {
                sender_id,
                recipient_id,
                conversation_id,
                is_new_conversation,
                content,
                ..
            }) => {
                assert_eq!(sender_id, 1);
                assert_eq!(recipient_id, 2);
                assert_eq!(conversation_id, Some(7));
                assert!(!is_new_conversation);
                assert_eq!(content, "hi");
            }
            other => panic!("expected forward, got {other:?}"),
        }
    }

    #[test]
    fn new_conversation_needs_no_conversation_id() {
        let registry = registry_with_online(&[2]);
        let action = classify(
            &env(r#"{"type":"private","recipient_id":2,"is_new_conversation":true,"content":"hi"}"#),
            1,
            &registry,
        );
        assert!(matches!(
            action,
            InboundAction::Forward(Frame::Private {
                conversation_id: None,
                is_new_conversation: true,
                ..
            })
        ));
    }

    #[test]
    fn private_requires_positive_recipient() {
        let registry = registry_with_online(&[2]);
        for json in [
            r#"{"type":"private","content":"hi"}"#,
            r#"{"type":"private","recipient_id":0,"content":"hi"}"#,
            r#"{"type":"private","recipient_id":-3,"content":"hi"}"#,
        ] {
            let code = rejected_code(classify(&env(json), 1, &registry));
            assert_eq!(code, codes::INVALID_RECIPIENT);
        }
    }

    #[test]
    fn private_requires_content() {
        let registry = registry_with_online(&[2]);
        for json in [
            r#"{"type":"private","recipient_id":2}"#,
            r#"{"type":"private","recipient_id":2,"content":""}"#,
            r#"{"type":"private","recipient_id":2,"content":"   "}"#,
        ] {
            let code = rejected_code(classify(&env(json), 1, &registry));
            assert_eq!(code, codes::EMPTY_CONTENT);
        }
    }

    #[test]
    fn private_to_offline_recipient_rejected() {
        let registry = registry_with_online(&[]);
        let code = rejected_code(classify(
            &env(r#"{"type":"private","recipient_id":2,"conversation_id":1,"content":"hi"}"#),
            1,
            &registry,
        ));
        assert_eq!(code, codes::RECIPIENT_OFFLINE);
    }

    #[test]
    fn existing_conversation_requires_positive_id() {
        let registry = registry_with_online(&[2]);
        for json in [
            r#"{"type":"private","recipient_id":2,"content":"hi"}"#,
            r#"{"type":"private","recipient_id":2,"conversation_id":0,"content":"hi"}"#,
        ] {
            let code = rejected_code(classify(&env(json), 1, &registry));
            assert_eq!(code, codes::INVALID_CONVERSATION);
        }
    }

    #[test]
    fn broadcast_requires_content() {
        let registry = registry_with_online(&[]);
        let code = rejected_code(classify(&env(r#"{"type":"broadcast","content":""}"#), 1, &registry));
        assert_eq!(code, codes::EMPTY_CONTENT);

        let action = classify(&env(r#"{"type":"broadcast","content":"all hands"}"#), 1, &registry);
        assert!(matches!(action, InboundAction::Forward(Frame::Broadcast { .. })));
    }

    #[test]
    fn notification_forwards() {
        let registry = registry_with_online(&[]);
        let action = classify(&env(r#"{"type":"notification","content":"maintenance"}"#), 1, &registry);
        assert!(matches!(
            action,
            InboundAction::Forward(Frame::Notification { .. })
        ));
    }

    #[test]
    fn typing_validated() {
        let registry = registry_with_online(&[2]);
        let action = classify(
            &env(r#"{"type":"typing","recipient_id":2,"action":"start"}"#),
            1,
            &registry,
        );
        assert!(matches!(
            action,
            InboundAction::Forward(Frame::Typing {
                action: TypingAction::Start,
                ..
            })
        ));

        let code = rejected_code(classify(
            &env(r#"{"type":"typing","recipient_id":2,"action":"hover"}"#),
            1,
            &registry,
        ));
        assert_eq!(code, codes::INVALID_ACTION);
    }

    #[test]
    fn typing_to_offline_recipient_rejected_before_hub() {
        let registry = registry_with_online(&[]);
        let code = rejected_code(classify(
            &env(r#"{"type":"typing","recipient_id":9,"action":"start"}"#),
            1,
            &registry,
        ));
        assert_eq!(code, codes::RECIPIENT_OFFLINE);
    }

    #[test]
    fn server_generated_kinds_rejected_inbound() {
        let registry = registry_with_online(&[]);
        for json in [r#"{"type":"user_status"}"#, r#"{"type":"online_users"}"#] {
            let code = rejected_code(classify(&env(json), 1, &registry));
            assert_eq!(code, codes::SERVER_GENERATED);
        }
    }

    #[test]
    fn ping_answered_inline() {
        let registry = registry_with_online(&[]);
        let action = classify(&env(r#"{"type":"ping"}"#), 1, &registry);
        assert!(matches!(action, InboundAction::Reply(Frame::Pong { .. })));
    }

    #[test]
    fn get_online_users_answered_inline() {
        let registry = registry_with_online(&[4, 2]);
        let action = classify(&env(r#"{"type":"get_online_users"}"#), 1, &registry);
        match action {
            InboundAction::Reply(Frame::OnlineUsers { users, .. }) => {
                assert_eq!(users, vec![2, 4]);
            }
            other => panic!("expected online users reply, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let registry = registry_with_online(&[]);
        let code = rejected_code(classify(&env(r#"{"type":"teleport"}"#), 1, &registry));
        assert_eq!(code, codes::UNKNOWN_TYPE);
    }
}
