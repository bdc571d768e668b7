//! Lock-guarded membership view.
//!
//! The maps are mutated only by the hub's event loop; everything else reads
//! through narrow accessors that hold the read lock for the duration of one
//! lookup. The maps themselves are never exposed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relay_core::Frame;

use crate::client::Client;

#[derive(Default)]
pub(crate) struct Membership {
    /// All registered clients by connection id.
    pub clients: HashMap<String, Arc<Client>>,
    /// The single client currently representing each user.
    pub by_user: HashMap<i64, Arc<Client>>,
}

/// Shared handle to the membership maps.
#[derive(Clone, Default)]
pub struct RegistryHandle {
    inner: Arc<RwLock<Membership>>,
}

impl RegistryHandle {
    /// New empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write access for the hub loop only.
    pub(crate) fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Membership> {
        self.inner.write()
    }

    /// Whether a user currently has a live connection.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.inner.read().by_user.contains_key(&user_id)
    }

    /// Ids of all currently connected users.
    pub fn online_users(&self) -> Vec<i64> {
        self.inner.read().by_user.keys().copied().collect()
    }

    /// The client currently representing a user, if any.
    pub fn client_for(&self, user_id: i64) -> Option<Arc<Client>> {
        self.inner.read().by_user.get(&user_id).cloned()
    }

    /// Enqueue a frame to a user's connection. Returns `false` when the
    /// user is offline or the queue rejected the frame.
    pub fn send_to_user(&self, user_id: i64, frame: Frame) -> bool {
        match self.client_for(user_id) {
            Some(client) => client.enqueue(frame),
            None => false,
        }
    }

    /// All registered clients.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.inner.read().clients.values().cloned().collect()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner.read().clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(registry: &RegistryHandle, user_id: i64) -> (Arc<Client>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        let client = Client::new(user_id, tx);
        let mut members = registry.write();
        let _ = members.clients.insert(client.id.clone(), client.clone());
        let _ = members.by_user.insert(user_id, client.clone());
        (client, rx)
    }

    #[test]
    fn empty_registry() {
        let registry = RegistryHandle::new();
        assert!(!registry.is_online(1));
        assert!(registry.online_users().is_empty());
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.client_for(1).is_none());
    }

    #[test]
    fn online_after_insert() {
        let registry = RegistryHandle::new();
        let (_c1, _rx1) = connect(&registry, 1);
        let (_c2, _rx2) = connect(&registry, 2);
        assert!(registry.is_online(1));
        assert!(registry.is_online(2));
        assert!(!registry.is_online(3));
        let mut users = registry.online_users();
        users.sort_unstable();
        assert_eq!(users, vec![1, 2]);
        assert_eq!(registry.connection_count(), 2);
    }

    #[tokio::test]
    async fn send_to_user_reaches_queue() {
        let registry = RegistryHandle::new();
        let (_client, mut rx) = connect(&registry, 5);
        assert!(registry.send_to_user(5, Frame::pong()));
        assert!(matches!(rx.recv().await.unwrap(), Frame::Pong { .. }));
    }

    #[test]
    fn send_to_offline_user_fails() {
        let registry = RegistryHandle::new();
        assert!(!registry.send_to_user(9, Frame::pong()));
    }

    #[test]
    fn send_to_full_queue_fails_without_blocking() {
        let registry = RegistryHandle::new();
        let (tx, _rx) = mpsc::channel(1);
        let client = Client::new(4, tx);
        {
            let mut members = registry.write();
            let _ = members.by_user.insert(4, client.clone());
        }
        assert!(registry.send_to_user(4, Frame::pong()));
        assert!(!registry.send_to_user(4, Frame::pong()));
        assert_eq!(client.drop_count(), 1);
    }
}
