//! Per-connection session: one read loop, one write loop.
//!
//! The read loop decodes and classifies inbound frames; the write loop
//! drains the outbound queue one frame at a time and owns transport-level
//! keepalive. Either loop ending closes the connection, and whichever close
//! path wins the lifecycle race sends the hub exactly one unregister.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use relay_core::{Envelope, Frame, codes};
use tracing::{debug, instrument, warn};

use crate::client::Client;
use crate::config::RelayConfig;
use crate::hub::HubHandle;
use crate::metrics as metric_names;
use crate::validate::{InboundAction, classify};

/// Drive one authenticated WebSocket connection to completion.
///
/// Registers with the hub, runs both loops, and guarantees exactly one
/// unregister on the way out regardless of which side ended first.
#[instrument(skip_all, fields(user_id, conn_id))]
pub async fn run_client_session(
    socket: WebSocket,
    user_id: i64,
    hub: HubHandle,
    config: Arc<RelayConfig>,
) {
    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(config.outbound_queue_size);
    let client = Client::new(user_id, outbound_tx);
    let _ = tracing::Span::current().record("user_id", user_id);
    let _ = tracing::Span::current().record("conn_id", client.id.as_str());

    let (mut sink, stream) = socket.split();

    // Non-blocking registration: a full register queue means the connection
    // is refused outright, never left half-initialized.
    if !hub.register(client.clone()) {
        warn!("hub register queue full, refusing connection");
        let _ = sink.send(Message::Close(None)).await;
        return;
    }

    let started = Instant::now();
    let write_task = tokio::spawn(write_loop(
        sink,
        outbound_rx,
        client.clone(),
        Duration::from_secs(config.ping_interval_secs),
        Duration::from_secs(config.pong_timeout_secs),
    ));

    read_loop(stream, &client, &hub).await;

    // Whichever loop won the close race owns the unregister; if neither did
    // (hub-initiated close), the hub already handled membership itself.
    let read_won = client.begin_close();
    let write_won = write_task.await.unwrap_or(false);
    if read_won || write_won {
        hub.unregister(client.clone());
    }
    client.finish_close();
    histogram!(metric_names::CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    debug!("session ended");
}

/// Read until the transport errors, the peer closes, or the close signal
/// fires (replacement or server shutdown).
async fn read_loop(mut stream: SplitStream<WebSocket>, client: &Arc<Client>, hub: &HubHandle) {
    let closed = client.close_signal();
    loop {
        let message = tokio::select! {
            () = closed.cancelled() => break,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => handle_text(text.as_str(), client, hub),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => client.mark_alive(),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => debug!("non-text frame ignored"),
        }
    }
}

/// Decode, classify, and act on one inbound text frame. Invalid input is
/// reported to the sender; the connection stays open.
fn handle_text(text: &str, client: &Arc<Client>, hub: &HubHandle) {
    client.mark_alive();
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            counter!(metric_names::VALIDATION_REJECTS_TOTAL, "code" => codes::MALFORMED_FRAME)
                .increment(1);
            let _ = client.enqueue(Frame::error(codes::MALFORMED_FRAME, e.to_string()));
            return;
        }
    };

    match classify(&envelope, client.user_id, hub.registry()) {
        InboundAction::Forward(frame) => {
            if !hub.submit(client.clone(), frame) {
                warn!(kind = %envelope.kind, "inbound frame dropped, hub queue full");
            }
        }
        InboundAction::Reply(frame) => {
            let _ = client.enqueue(frame);
        }
        InboundAction::Reject { code, message } => {
            counter!(metric_names::VALIDATION_REJECTS_TOTAL, "code" => code).increment(1);
            debug!(kind = %envelope.kind, code, "inbound frame rejected");
            let _ = client.enqueue(Frame::error(code, message));
        }
    }
}

/// Drain the outbound queue, serializing one frame at a time, and keep the
/// transport alive with periodic pings. The ping interval is shorter than
/// the liveness window, so this loop pre-empts the timeout.
///
/// Returns `true` when this loop won the close race and the caller must
/// send the unregister.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: tokio::sync::mpsc::Receiver<Frame>,
    client: Arc<Client>,
    ping_interval: Duration,
    pong_timeout: Duration,
) -> bool {
    let closed = client.close_signal();
    let mut ping_tick = tokio::time::interval(ping_interval);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it.
    let _ = ping_tick.tick().await;

    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                match frame.to_json() {
                    Ok(json) => {
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(kind = frame.kind(), error = %e, "frame serialization failed"),
                }
            }
            _ = ping_tick.tick() => {
                if client.last_seen_elapsed() > pong_timeout {
                    warn!(user_id = client.user_id, "liveness window expired, closing");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    // Ends the read loop too, in case this side broke first.
    client.begin_close()
}
