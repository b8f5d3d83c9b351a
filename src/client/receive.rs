//! Client receive loop: consume `Pong` responses, maintain the
//! connected/disconnected flag, and record latency samples.

use crate::client::{ClientEvent, LATENCY_HISTORY_CAPACITY};
use crate::error::{Error, Result};
use crate::protocol::{self, MessageType};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tracing::debug;

const RECV_BUFFER_SIZE: usize = 2048;

pub async fn run(
    socket: &UdpSocket,
    connected: &AtomicBool,
    latencies: &Mutex<VecDeque<Duration>>,
    events_tx: &broadcast::Sender<ClientEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    connected.store(false, Ordering::Release);
                    let _ = events_tx.send(ClientEvent::Disconnected);
                    debug!("receive loop received shutdown signal");
                    return Ok(());
                }
            }
            received = socket.recv(&mut buf) => {
                match received {
                    Ok(len) => handle_datagram(&buf[..len], connected, latencies, events_tx),
                    Err(e) if is_transient(&e) => {
                        debug!(error = %e, "transient error receiving datagram");
                    }
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        }
    }
}

fn handle_datagram(
    bytes: &[u8],
    connected: &AtomicBool,
    latencies: &Mutex<VecDeque<Duration>>,
    events_tx: &broadcast::Sender<ClientEvent>,
) {
    let message = match protocol::decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "dropping undecodable datagram");
            return;
        }
    };

    if message.message_type != MessageType::Pong {
        return;
    }

    if !connected.swap(true, Ordering::AcqRel) {
        let _ = events_tx.send(ClientEvent::Connected);
    }

    let latency = now_millis().saturating_sub(message.timestamp).max(0);
    let mut history = latencies.lock().unwrap();
    if history.len() == LATENCY_HISTORY_CAPACITY {
        history.pop_front();
    }
    history.push_back(Duration::from_millis(latency as u64));
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn is_transient(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::TimedOut
    )
}
