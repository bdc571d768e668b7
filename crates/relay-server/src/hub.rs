//! The hub: a single serial event loop owning connection membership.
//!
//! All membership mutation happens on this loop. Everything else talks to it
//! through three bounded queues (register, unregister, dispatch) exposed on
//! [`HubHandle`], or reads membership through the registry's lock-guarded
//! accessors. Serial processing is what makes routing race-free without
//! fine-grained locking.

use std::sync::Arc;

use metrics::{counter, gauge};
use relay_core::{Frame, codes, frame::now_timestamp};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::RelayConfig;
use crate::metrics as metric_names;
use crate::registry::RegistryHandle;
use crate::router::Router;
use crate::stats::{HubStats, StatsSnapshot};

/// Work submitted to the hub's dispatch queue.
pub enum Dispatch {
    /// A validated inbound frame from a connected client.
    Inbound {
        /// The submitting connection, used for error reporting.
        sender: Arc<Client>,
        /// The validated, server-stamped frame.
        frame: Frame,
    },
    /// A conversation was marked read in the store; fan out the receipt.
    ConversationRead {
        /// Conversation that was read.
        conversation_id: i64,
        /// User who read it.
        reader_id: i64,
    },
    /// Deliver a server-originated frame to every connected client.
    Announce(Frame),
}

/// Cloneable handle for submitting work to the hub.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Arc<Client>>,
    unregister_tx: mpsc::Sender<Arc<Client>>,
    dispatch_tx: mpsc::Sender<Dispatch>,
    registry: RegistryHandle,
    stats: Arc<HubStats>,
}

impl HubHandle {
    /// Submit a freshly accepted client for registration.
    ///
    /// Returns `false` when the register queue is full; the caller must
    /// close the connection rather than leave it half-initialized.
    pub fn register(&self, client: Arc<Client>) -> bool {
        if self.register_tx.try_send(client).is_ok() {
            true
        } else {
            counter!(metric_names::HUB_QUEUE_DROPS_TOTAL).increment(1);
            false
        }
    }

    /// Submit a client for unregistration. Idempotent at the hub.
    pub fn unregister(&self, client: Arc<Client>) {
        if self.unregister_tx.try_send(client).is_err() {
            // Should not happen with a sanely sized queue; the membership
            // entry would leak until process restart, so shout about it.
            counter!(metric_names::HUB_QUEUE_DROPS_TOTAL).increment(1);
            warn!("unregister queue full, membership entry may leak");
        }
    }

    /// Submit a validated inbound frame. Returns `false` when the dispatch
    /// queue is full and the frame was dropped.
    pub fn submit(&self, sender: Arc<Client>, frame: Frame) -> bool {
        self.dispatch(Dispatch::Inbound { sender, frame })
    }

    /// Ask the hub to fan out a read receipt for a conversation already
    /// marked read in the store. Returns `false` when not submitted.
    pub fn mark_conversation_read(&self, conversation_id: i64, reader_id: i64) -> bool {
        self.dispatch(Dispatch::ConversationRead {
            conversation_id,
            reader_id,
        })
    }

    /// Deliver a server-originated frame to every connected client.
    /// Returns `false` when not submitted.
    pub fn broadcast_to_all(&self, frame: Frame) -> bool {
        self.dispatch(Dispatch::Announce(frame))
    }

    fn dispatch(&self, event: Dispatch) -> bool {
        if self.dispatch_tx.try_send(event).is_ok() {
            true
        } else {
            counter!(metric_names::HUB_QUEUE_DROPS_TOTAL).increment(1);
            warn!("hub dispatch queue full, event dropped");
            false
        }
    }

    /// Enqueue a frame directly on one user's connection, bypassing the hub
    /// loop. Returns `false` when the user is offline or the queue is full.
    pub fn send_to_user(&self, user_id: i64, frame: Frame) -> bool {
        self.registry.send_to_user(user_id, frame)
    }

    /// Whether a user currently has a live connection.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.registry.is_online(user_id)
    }

    /// Ids of all currently connected users.
    pub fn online_users(&self) -> Vec<i64> {
        self.registry.online_users()
    }

    /// The shared membership view.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// The event loop state. Constructed once, consumed by [`Hub::run`].
pub struct Hub {
    register_rx: mpsc::Receiver<Arc<Client>>,
    unregister_rx: mpsc::Receiver<Arc<Client>>,
    dispatch_rx: mpsc::Receiver<Dispatch>,
    registry: RegistryHandle,
    router: Router,
    stats: Arc<HubStats>,
    max_connections: usize,
    shutdown: CancellationToken,
}

impl Hub {
    /// Build the hub and its handle.
    pub fn new(router: Router, config: &RelayConfig, shutdown: CancellationToken) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(config.hub_queue_size);
        let (unregister_tx, unregister_rx) = mpsc::channel(config.hub_queue_size);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.hub_queue_size);
        let registry = RegistryHandle::new();
        let stats = Arc::new(HubStats::default());

        let handle = HubHandle {
            register_tx,
            unregister_tx,
            dispatch_tx,
            registry: registry.clone(),
            stats: stats.clone(),
        };
        let hub = Self {
            register_rx,
            unregister_rx,
            dispatch_rx,
            registry,
            router,
            stats,
            max_connections: config.max_connections,
            shutdown,
        };
        (hub, handle)
    }

    /// Run the serial event loop until shutdown.
    pub async fn run(mut self) {
        info!(max_connections = self.max_connections, "hub started");
        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => self.handle_register(client),
                Some(client) = self.unregister_rx.recv() => self.handle_unregister(&client),
                Some(event) = self.dispatch_rx.recv() => self.handle_dispatch(event),
                () = self.shutdown.cancelled() => break,
            }
        }
        // Close every remaining connection; their sessions observe the
        // signal and tear down without routing back through the hub.
        for client in self.registry.clients() {
            let _ = client.begin_close();
        }
        info!("hub stopped");
    }

    fn handle_register(&mut self, client: Arc<Client>) {
        let user_id = client.user_id;
        let replaced = {
            let mut members = self.registry.write();
            if members.clients.len() >= self.max_connections
                && !members.by_user.contains_key(&user_id)
            {
                drop(members);
                warn!(user_id, max = self.max_connections, "connection limit reached, rejecting");
                // The hub wins the close race, so the session skips its
                // own unregister and no membership entry ever existed.
                let _ = client.begin_close();
                self.stats.error();
                return;
            }

            // At most one live connection per user: evict the prior one
            // inline, without an offline broadcast, before installing the
            // replacement.
            let replaced = members.by_user.remove(&user_id).map(|old| {
                let _ = members.clients.remove(&old.id);
                old
            });
            let _ = members.clients.insert(client.id.clone(), client.clone());
            let _ = members.by_user.insert(user_id, client.clone());
            replaced
        };

        if let Some(old) = &replaced {
            info!(user_id, old_conn = %old.id, new_conn = %client.id, "replacing live connection");
            let _ = old.begin_close();
            self.stats.connection_closed();
            counter!(metric_names::CONNECTIONS_CLOSED_TOTAL).increment(1);
            gauge!(metric_names::CONNECTIONS_ACTIVE).decrement(1.0);
        } else {
            info!(user_id, conn = %client.id, "client registered");
        }

        self.stats.connection_opened();
        counter!(metric_names::CONNECTIONS_OPENED_TOTAL).increment(1);
        gauge!(metric_names::CONNECTIONS_ACTIVE).increment(1.0);

        if let Err(e) = self.router.store().set_presence(user_id, true) {
            warn!(user_id, error = %e, "failed to persist online presence");
        }

        self.fan_out_excluding(Frame::user_status(user_id, true), Some(user_id));

        // One-time snapshot, delivered only to the new connection.
        let _ = self.deliver(&client, Frame::online_users(self.registry.online_users()));
    }

    fn handle_unregister(&mut self, client: &Arc<Client>) {
        let user_id = client.user_id;
        let removed = {
            let mut members = self.registry.write();
            if members.clients.remove(&client.id).is_some() {
                // by_user may already point at a replacement connection.
                let is_live = members.by_user.get(&user_id).is_some_and(|c| c.id == client.id);
                if is_live {
                    let _ = members.by_user.remove(&user_id);
                }
                is_live
            } else {
                false
            }
        };

        if !removed {
            debug!(user_id, conn = %client.id, "unregister for unknown connection ignored");
            return;
        }

        info!(user_id, conn = %client.id, "client unregistered");
        if let Err(e) = self.router.store().set_presence(user_id, false) {
            warn!(user_id, error = %e, "failed to persist offline presence");
        }
        self.fan_out_excluding(Frame::user_status(user_id, false), Some(user_id));
        self.stats.connection_closed();
        counter!(metric_names::CONNECTIONS_CLOSED_TOTAL).increment(1);
        gauge!(metric_names::CONNECTIONS_ACTIVE).decrement(1.0);
    }

    fn handle_dispatch(&mut self, event: Dispatch) {
        match event {
            Dispatch::Inbound { sender, frame } => {
                self.stats.message_received();
                counter!(metric_names::MESSAGES_RECEIVED_TOTAL).increment(1);
                self.route_inbound(&sender, frame);
            }
            Dispatch::ConversationRead {
                conversation_id,
                reader_id,
            } => self.fan_out_read_status(conversation_id, reader_id),
            Dispatch::Announce(frame) => self.fan_out_excluding(frame, None),
        }
    }

    fn route_inbound(&mut self, sender: &Arc<Client>, frame: Frame) {
        match frame {
            Frame::Private {
                sender_id,
                recipient_id,
                conversation_id,
                content,
                ..
            } => self.route_private(sender, sender_id, recipient_id, conversation_id, &content),
            Frame::Typing {
                sender_id,
                recipient_id,
                action,
                timestamp,
                ..
            } => {
                // Display name resolution is best-effort at delivery time.
                let sender_name = Some(self.router.store().resolve_display_name(sender_id));
                let frame = Frame::Typing {
                    sender_id,
                    recipient_id,
                    action,
                    sender_name,
                    timestamp,
                };
                if !self.registry.send_to_user(recipient_id, frame) {
                    debug!(sender_id, recipient_id, "typing indicator not delivered");
                }
            }
            frame @ (Frame::Broadcast { .. } | Frame::Notification { .. }) => {
                self.fan_out_excluding(frame, None);
            }
            other => debug!(kind = other.kind(), "unroutable frame dropped"),
        }
    }

    /// Persist and deliver one private message: the recipient gets the
    /// stored row, the sender gets exactly one confirmation copy.
    fn route_private(
        &mut self,
        sender: &Arc<Client>,
        sender_id: i64,
        recipient_id: i64,
        conversation_id: Option<i64>,
        content: &str,
    ) {
        // The recipient may have disconnected since validation; nothing may
        // be persisted for an offline recipient.
        let Some(recipient) = self.registry.client_for(recipient_id) else {
            self.report_error(
                sender,
                codes::RECIPIENT_OFFLINE,
                format!("user {recipient_id} is not online"),
            );
            return;
        };

        let routed = match self
            .router
            .persist_private(sender_id, recipient_id, conversation_id, content)
        {
            Ok(routed) => routed,
            Err(e) => {
                self.report_error(sender, e.code, e.message);
                return;
            }
        };

        if let Some(created) = &routed.created_conversation {
            let _ = self.deliver(
                &recipient,
                Frame::NewConversation {
                    conversation_id: created.conversation_id,
                    participants: created.participants,
                    timestamp: now_timestamp(),
                },
            );
        }

        let delivery = Frame::PrivateDelivery(routed.stored);
        if !self.deliver(&recipient, delivery.clone()) {
            self.report_error(
                sender,
                codes::DELIVERY_FAILED,
                format!("message persisted but not delivered to user {recipient_id}"),
            );
        }
        if !self.deliver(sender, delivery) {
            warn!(sender_id, "confirmation copy dropped on full queue");
        }
    }

    fn fan_out_read_status(&mut self, conversation_id: i64, reader_id: i64) {
        let others = match self.router.store().mark_read(conversation_id, reader_id) {
            Ok(others) => others,
            Err(e) => {
                warn!(conversation_id, reader_id, error = %e, "mark-read failed");
                self.stats.error();
                return;
            }
        };
        let frame = Frame::ReadStatus {
            conversation_id,
            reader_id,
            reader_name: self.router.store().resolve_display_name(reader_id),
            timestamp: now_timestamp(),
        };
        for user_id in others {
            if let Some(client) = self.registry.client_for(user_id) {
                let _ = self.deliver(&client, frame.clone());
            }
        }
    }

    /// Deliver a frame to every connected client, skipping `except` (the
    /// subject of presence events never sees its own status change).
    fn fan_out_excluding(&mut self, frame: Frame, except: Option<i64>) {
        for client in self.registry.clients() {
            if except == Some(client.user_id) {
                continue;
            }
            let _ = self.deliver(&client, frame.clone());
        }
    }

    /// Enqueue with accounting. A full queue is non-fatal to the caller's
    /// wider operation; the drop is counted and logged.
    fn deliver(&self, client: &Arc<Client>, frame: Frame) -> bool {
        if client.enqueue(frame) {
            self.stats.message_sent();
            counter!(metric_names::MESSAGES_ROUTED_TOTAL).increment(1);
            true
        } else {
            counter!(metric_names::DELIVERY_DROPS_TOTAL).increment(1);
            self.stats.error();
            warn!(user_id = client.user_id, conn = %client.id, "delivery dropped on full queue");
            false
        }
    }

    fn report_error(&self, sender: &Arc<Client>, code: &'static str, message: String) {
        warn!(user_id = sender.user_id, code, "routing error reported to sender");
        self.stats.error();
        let _ = sender.enqueue(Frame::error(code, message));
    }
}
