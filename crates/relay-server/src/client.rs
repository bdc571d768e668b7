//! One live client connection.
//!
//! A `Client` owns the sending half of its connection's outbound queue and
//! a tri-state lifecycle flag. The queue is the only path by which any
//! other task reaches this connection's write loop; enqueueing is
//! non-blocking and drops on overflow rather than stalling the hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Connection lifecycle. Transitions are monotonic; `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Registered (or registering) and processing messages.
    Active,
    /// Close has been triggered; unregistration is in flight.
    Closing,
    /// Fully torn down.
    Closed,
}

/// A connected client bound to an authenticated user.
pub struct Client {
    /// Unique connection id.
    pub id: String,
    /// Authenticated user id. Immutable after creation.
    pub user_id: i64,
    tx: mpsc::Sender<Frame>,
    lifecycle: Mutex<Lifecycle>,
    close_signal: CancellationToken,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
}

impl Client {
    /// Create a client for a user with the sending half of its outbound
    /// queue.
    pub fn new(user_id: i64, tx: mpsc::Sender<Frame>) -> Arc<Self> {
        Arc::new(Self {
            id: format!("conn_{}", Uuid::now_v7()),
            user_id,
            tx,
            lifecycle: Mutex::new(Lifecycle::Active),
            close_signal: CancellationToken::new(),
            last_seen: Mutex::new(Instant::now()),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue a frame for delivery.
    ///
    /// Returns `false` if the queue is full or the connection is gone, and
    /// increments the dropped counter. Never blocks.
    pub fn enqueue(&self, frame: Frame) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped on this connection's queue.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Refresh the liveness timestamp (pong or any inbound activity).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last sign of life.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Begin closing this connection.
    ///
    /// Atomically transitions `Active` to `Closing` and fires the close
    /// signal. Returns `true` for exactly one caller regardless of how many
    /// paths race to close (timeout, read error, forced replacement) — that
    /// caller is responsible for sending the hub's unregister event.
    pub fn begin_close(&self) -> bool {
        let mut state = self.lifecycle.lock();
        if *state == Lifecycle::Active {
            *state = Lifecycle::Closing;
            self.close_signal.cancel();
            true
        } else {
            false
        }
    }

    /// Mark teardown complete. Idempotent.
    pub fn finish_close(&self) {
        let mut state = self.lifecycle.lock();
        if *state != Lifecycle::Closed {
            *state = Lifecycle::Closed;
            // Covers callers that skip begin_close (never-registered clients).
            self.close_signal.cancel();
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Token cancelled when the connection should shut down. The write loop
    /// listens on this to send the final close frame.
    pub fn close_signal(&self) -> CancellationToken {
        self.close_signal.clone()
    }
}
