//! Bounded drain of the hub loop at shutdown.
//!
//! The server shares one `CancellationToken` between the accept loop, the
//! hub loop, and every client session. Once the accept loop has stopped,
//! [`drain`] cancels that token and waits a limited time for the hub task
//! to flush its queues and exit.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`drain`] waits for the hub loop before giving up on it.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Cancel `token` and wait up to `timeout` for the hub task to finish.
pub async fn drain(token: &CancellationToken, hub_task: JoinHandle<()>, timeout: Duration) {
    token.cancel();
    info!(timeout_secs = timeout.as_secs(), "draining hub loop");
    match tokio::time::timeout(timeout, hub_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "hub task failed during shutdown"),
        Err(_) => warn!("hub loop still running after {timeout:?}, abandoning it"),
    }
}
