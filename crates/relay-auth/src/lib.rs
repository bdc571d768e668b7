//! # relay-auth
//!
//! Authentication collaborator: verifies that a session token belongs to
//! the user id a connection claims. Token issuance lives in `relay-store`;
//! this crate only verifies.

use std::sync::Arc;

use relay_store::{ChatStore, StoreError};
use thiserror::Error;
use tracing::debug;

/// Errors returned by credential validation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session exists for the presented token.
    #[error("invalid session token")]
    InvalidToken,

    /// The session exists but has expired.
    #[error("session expired at {expired_at}")]
    Expired {
        /// Expiry timestamp of the rejected session.
        expired_at: String,
    },

    /// The token is valid but belongs to a different user than claimed.
    /// A mismatch is a hard rejection, never a silent correction.
    #[error("token belongs to user {actual}, not claimed user {claimed}")]
    UserMismatch {
        /// User id the connection claimed.
        claimed: i64,
        /// User id the token actually authenticates.
        actual: i64,
    },

    /// The session lookup itself failed.
    #[error("session lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Validates session tokens against the store's `sessions` table.
pub struct SessionAuthenticator {
    store: Arc<ChatStore>,
}

impl SessionAuthenticator {
    /// Build an authenticator over the given store.
    pub fn new(store: Arc<ChatStore>) -> Self {
        Self { store }
    }

    /// Confirm that `token` authenticates `claimed_user_id`.
    ///
    /// Returns the authenticated user id on success, which always equals
    /// the claimed id.
    pub fn validate(&self, token: &str, claimed_user_id: i64) -> Result<i64, AuthError> {
        let Some(session) = self.store.find_session(token)? else {
            debug!(claimed_user_id, "unknown session token");
            return Err(AuthError::InvalidToken);
        };

        let expired = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
            .map(|t| t <= chrono::Utc::now())
            // An unparseable expiry never grants access.
            .unwrap_or(true);
        if expired {
            return Err(AuthError::Expired {
                expired_at: session.expires_at,
            });
        }

        if session.user_id != claimed_user_id {
            return Err(AuthError::UserMismatch {
                claimed: claimed_user_id,
                actual: session.user_id,
            });
        }

        Ok(session.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::{ConnectionConfig, new_in_memory, run_migrations};

    fn authenticator_with_user() -> (SessionAuthenticator, Arc<ChatStore>, i64) {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = run_migrations(&conn).unwrap();
        }
        let store = Arc::new(ChatStore::new(pool));
        let user = store.create_user("ada", "Ada", "x").unwrap();
        (SessionAuthenticator::new(store.clone()), store, user.id)
    }

    #[test]
    fn valid_token_authenticates() {
        let (auth, store, user_id) = authenticator_with_user();
        let session = store
            .create_session(user_id, chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(auth.validate(&session.token, user_id).unwrap(), user_id);
    }

    #[test]
    fn unknown_token_rejected() {
        let (auth, _store, user_id) = authenticator_with_user();
        let err = auth.validate("tok_bogus", user_id).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn expired_session_rejected() {
        let (auth, store, user_id) = authenticator_with_user();
        let session = store
            .create_session(user_id, chrono::Duration::seconds(-10))
            .unwrap();
        let err = auth.validate(&session.token, user_id).unwrap_err();
        assert!(matches!(err, AuthError::Expired { .. }));
    }

    #[test]
    fn user_mismatch_is_hard_rejection() {
        let (auth, store, user_id) = authenticator_with_user();
        let other = store.create_user("bob", "Bob", "x").unwrap();
        let session = store
            .create_session(other.id, chrono::Duration::hours(1))
            .unwrap();
        let err = auth.validate(&session.token, user_id).unwrap_err();
        match err {
            AuthError::UserMismatch { claimed, actual } => {
                assert_eq!(claimed, user_id);
                assert_eq!(actual, other.id);
            }
            other => panic!("expected UserMismatch, got {other:?}"),
        }
    }
}
