//! The client half of pulsewatch: a symmetric heartbeat emitter that joins
//! on start, pings periodically, tracks connection state from the
//! server's pongs, and leaves on shutdown.

mod receive;
mod send;

use crate::common::Metadata;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, HeartbeatMessage, MessageType};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tracing::info;

/// How many recent latency samples `latencies()` retains.
pub(crate) const LATENCY_HISTORY_CAPACITY: usize = 64;

/// Connection-state notifications the client fires as the server's pongs
/// arrive or stop arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
}

pub struct Client {
    config: ClientConfig,
    socket: Arc<UdpSocket>,
    sequence: AtomicI64,
    connected: AtomicBool,
    latencies: Mutex<VecDeque<Duration>>,
    events_tx: broadcast::Sender<ClientEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Client {
    /// Bind an ephemeral local socket and connect it to the configured
    /// server endpoint. `connect` on a UDP socket just fixes the remote
    /// peer for `send`/`recv`; no handshake happens here.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|source| Error::Bind {
                addr: "0.0.0.0:0".to_string(),
                source,
            })?;
        let server: SocketAddr = format!("{}:{}", config.server_address, config.server_port)
            .parse()
            .map_err(|_| {
                Error::Configuration(format!(
                    "invalid server address {}:{}",
                    config.server_address, config.server_port
                ))
            })?;
        socket.connect(server).await.map_err(Error::Io)?;
        info!(node_id = %config.node_id, %server, "client connecting");

        let (events_tx, _) = broadcast::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            socket: Arc::new(socket),
            sequence: AtomicI64::new(0),
            connected: AtomicBool::new(false),
            latencies: Mutex::new(VecDeque::with_capacity(LATENCY_HISTORY_CAPACITY)),
            events_tx,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// Recent round-trip latency samples, oldest first, bounded to the
    /// last `LATENCY_HISTORY_CAPACITY` pongs.
    pub fn latencies(&self) -> Vec<Duration> {
        self.latencies.lock().unwrap().iter().copied().collect()
    }

    /// Emit a single `Health` message with caller-supplied metadata.
    /// Periodic health reporting is application-driven — the client only
    /// provides the primitive.
    pub async fn send_health(&self, metadata: Metadata) -> Result<()> {
        self.send_message(MessageType::Health, metadata).await
    }

    /// Run the send and receive loops until `shutdown()` is called.
    pub async fn run(&self) -> Result<()> {
        self.send_message(MessageType::Join, self.config.metadata.clone())
            .await?;

        let send_loop = send::run(
            &self.socket,
            &self.sequence,
            &self.config.node_id,
            self.config.heartbeat_interval,
            self.shutdown_rx.clone(),
        );
        let receive_loop = receive::run(
            &self.socket,
            &self.connected,
            &self.latencies,
            &self.events_tx,
            self.shutdown_rx.clone(),
        );

        let (send_result, receive_result) = tokio::join!(send_loop, receive_loop);
        send_result?;
        receive_result?;
        Ok(())
    }

    /// Signal both loops to terminate promptly at their next suspension
    /// point. The send loop's own shutdown reaction emits a best-effort
    /// `Leave`; the receive loop's reaction flips `connected` to false and
    /// fires `Disconnected` — each loop owns the state it was already
    /// managing, rather than one loop reaching into the other's.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn send_message(&self, message_type: MessageType, metadata: Metadata) -> Result<()> {
        let sequence_number = self.sequence.fetch_add(1, Ordering::SeqCst);
        let message = HeartbeatMessage::new(message_type, self.config.node_id.clone(), sequence_number, metadata);
        let bytes = protocol::encode(&message)?;
        self.socket
            .send(&bytes)
            .await
            .map_err(|e| Error::Send(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latencies_starts_empty() {
        let config = ClientConfig {
            server_port: 1, // never actually connected in this unit test
            ..ClientConfig::default()
        };
        // connect() requires a real (if unreachable) UDP endpoint; 127.0.0.1
        // with any port is fine since UDP connect does no handshake.
        let client = Client::connect(config).await.unwrap();
        assert!(client.latencies().is_empty());
        assert!(!client.is_connected());
    }
}
