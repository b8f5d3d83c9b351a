//! Client send loop: periodic `Ping`, and a best-effort `Leave` on
//! shutdown.

use crate::error::Result;
use crate::protocol::{self, HeartbeatMessage, MessageType};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, warn};

pub async fn run(
    socket: &UdpSocket,
    sequence: &AtomicI64,
    node_id: &str,
    heartbeat_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = interval(heartbeat_interval);
    // The first tick fires immediately; the Join already sent by the
    // caller stands in for it, so skip it here.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("send loop received shutdown signal, emitting best-effort Leave");
                    send_one(socket, sequence, node_id, MessageType::Leave).await;
                    return Ok(());
                }
            }
            _ = ticker.tick() => {
                send_one(socket, sequence, node_id, MessageType::Ping).await;
            }
        }
    }
}

async fn send_one(socket: &UdpSocket, sequence: &AtomicI64, node_id: &str, message_type: MessageType) {
    let sequence_number = sequence.fetch_add(1, Ordering::SeqCst);
    let message = HeartbeatMessage::new(message_type, node_id, sequence_number, Default::default());
    match protocol::encode(&message) {
        Ok(bytes) => {
            if let Err(e) = socket.send(&bytes).await {
                warn!(error = %e, "failed to send {:?}", message_type);
            }
        }
        Err(e) => warn!(error = %e, "failed to encode {:?}", message_type),
    }
}
