//! The server ingress loop: receive a datagram, decode it, dispatch by
//! message type, mutate the registry, and publish at-most-once lifecycle
//! events.

use crate::common::Metadata;
use crate::error::{Error, Result};
use crate::events::{EventBus, LifecycleEvent};
use crate::protocol::{self, HeartbeatMessage, MessageType};
use crate::registry::{NodeRegistry, NodeStatus};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, warn};

const RECV_BUFFER_SIZE: usize = 2048;

/// Run until `shutdown_rx` reports `true`. Fatal I/O errors propagate;
/// transient ones are logged and the loop keeps going; decode failures
/// are dropped silently save for a debug log.
pub async fn run(
    socket: Arc<UdpSocket>,
    registry: Arc<NodeRegistry>,
    events: Arc<EventBus>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("ingress loop received shutdown signal");
                    return Ok(());
                }
            }
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((len, peer)) => {
                        handle_datagram(&buf[..len], peer, &socket, &registry, &events).await;
                    }
                    Err(e) if is_transient(&e) => {
                        warn!(error = %e, "transient error receiving datagram");
                    }
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        }
    }
}

async fn handle_datagram(
    bytes: &[u8],
    peer: SocketAddr,
    socket: &UdpSocket,
    registry: &NodeRegistry,
    events: &EventBus,
) {
    let message = match protocol::decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, peer = %peer, "dropping undecodable datagram");
            return;
        }
    };

    match message.message_type {
        MessageType::Join => {
            let (record, was_new, previous) =
                registry.add_or_update(message.node_id, peer.ip().to_string(), peer.port(), message.metadata);
            publish_join_event(events, previous, was_new, record);
            reply_pong(socket, peer, message.sequence_number).await;
        }
        MessageType::Ping => {
            let (record, was_new, previous) =
                registry.add_or_update(message.node_id, peer.ip().to_string(), peer.port(), message.metadata);
            publish_ping_event(events, previous, was_new, record);
            reply_pong(socket, peer, message.sequence_number).await;
        }
        MessageType::Health => {
            let (record, was_new, previous) =
                registry.add_or_update(message.node_id, peer.ip().to_string(), peer.port(), message.metadata);
            let _ = was_new;
            publish_health_event(events, previous, record);
        }
        MessageType::Leave => {
            if let Some(record) = registry.remove(&message.node_id) {
                events.publish(LifecycleEvent::NodeLeft(record));
            }
        }
        MessageType::Pong => {
            // The server never consumes its own echoes.
        }
    }
}

fn was_suspected_or_dead(status: NodeStatus) -> bool {
    matches!(status, NodeStatus::Suspected | NodeStatus::Dead)
}

fn publish_join_event(
    events: &EventBus,
    previous: NodeStatus,
    _was_new: bool,
    record: crate::registry::NodeRecord,
) {
    if was_suspected_or_dead(previous) {
        events.publish(LifecycleEvent::NodeRevived(record));
    } else {
        events.publish(LifecycleEvent::NodeJoined(record));
    }
}

fn publish_ping_event(
    events: &EventBus,
    previous: NodeStatus,
    was_new: bool,
    record: crate::registry::NodeRecord,
) {
    if was_suspected_or_dead(previous) {
        events.publish(LifecycleEvent::NodeRevived(record));
    } else if was_new {
        events.publish(LifecycleEvent::NodeJoined(record));
    }
}

fn publish_health_event(events: &EventBus, previous: NodeStatus, record: crate::registry::NodeRecord) {
    if was_suspected_or_dead(previous) {
        events.publish(LifecycleEvent::NodeRevived(record));
    }
}

async fn reply_pong(socket: &UdpSocket, peer: SocketAddr, sequence_number: i64) {
    let pong = HeartbeatMessage::pong_for(sequence_number);
    let bytes = match protocol::encode(&pong) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to encode pong reply");
            return;
        }
    };
    if let Err(e) = socket.send_to(&bytes, peer).await {
        warn!(error = %e, peer = %peer, "failed to send pong reply");
    }
}

/// Heuristic classification of which I/O errors are worth tolerating
/// versus which should bring the loop down. UDP recv errors are rarely
/// fatal; anything not in this set is treated as fatal by the caller.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeStatus;

    fn sample_record(registry: &NodeRegistry) -> crate::registry::NodeRecord {
        registry.add_or_update("n1", "127.0.0.1", 1, Metadata::new()).0
    }

    #[tokio::test]
    async fn join_from_alive_or_unknown_emits_joined() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut rx = events.subscribe_joined();

        let record = sample_record(&registry);
        publish_join_event(&events, NodeStatus::Unknown, true, record);

        assert!(matches!(rx.recv().await.unwrap(), LifecycleEvent::NodeJoined(_)));
    }

    #[tokio::test]
    async fn join_from_dead_emits_revived_not_joined() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut rx = events.subscribe_revived();

        let record = sample_record(&registry);
        publish_join_event(&events, NodeStatus::Dead, false, record);

        assert!(matches!(rx.recv().await.unwrap(), LifecycleEvent::NodeRevived(_)));
    }

    #[tokio::test]
    async fn ping_from_existing_alive_node_emits_nothing() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut joined_rx = events.subscribe_joined();
        let mut revived_rx = events.subscribe_revived();

        let record = sample_record(&registry);
        publish_ping_event(&events, NodeStatus::Alive, false, record);

        assert!(joined_rx.try_recv().is_err());
        assert!(revived_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ping_from_never_seen_node_emits_joined() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut rx = events.subscribe_joined();

        let record = sample_record(&registry);
        publish_ping_event(&events, NodeStatus::Unknown, true, record);

        assert!(matches!(rx.recv().await.unwrap(), LifecycleEvent::NodeJoined(_)));
    }

    #[tokio::test]
    async fn health_from_alive_node_emits_nothing_even_when_new() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut rx = events.subscribe_joined();

        let record = sample_record(&registry);
        publish_health_event(&events, NodeStatus::Unknown, record);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn health_from_suspected_node_emits_revived() {
        let registry = NodeRegistry::new();
        let events = EventBus::new(16);
        let mut rx = events.subscribe_revived();

        let record = sample_record(&registry);
        publish_health_event(&events, NodeStatus::Suspected, record);

        assert!(matches!(rx.recv().await.unwrap(), LifecycleEvent::NodeRevived(_)));
    }
}
