//! The lifecycle event bus: five independent broadcast channels, one per
//! event kind, each carrying a `NodeRecord` snapshot rather than a live
//! reference.

use crate::registry::NodeRecord;
use tokio::sync::broadcast;
use tracing::warn;

/// Channel capacity is generous relative to expected traffic; once a
/// receiver falls this far behind, `tokio::sync::broadcast` itself starts
/// dropping the receiver's oldest unconsumed messages — exactly the
/// bounded-queue-with-drop-oldest overflow policy this bus is required to
/// have.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// One of the five lifecycle notifications the registry's state machine
/// can produce, each wrapping the node's state at the moment of the
/// transition.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    NodeJoined(NodeRecord),
    NodeLeft(NodeRecord),
    NodeSuspected(NodeRecord),
    NodeDied(NodeRecord),
    NodeRevived(NodeRecord),
}

impl LifecycleEvent {
    pub fn node_id(&self) -> &str {
        match self {
            LifecycleEvent::NodeJoined(r)
            | LifecycleEvent::NodeLeft(r)
            | LifecycleEvent::NodeSuspected(r)
            | LifecycleEvent::NodeDied(r)
            | LifecycleEvent::NodeRevived(r) => &r.node_id,
        }
    }
}

/// Owns the five per-kind broadcast channels. Publication from the owning
/// loop (ingress or health-check) always succeeds immediately — it never
/// blocks on a slow subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    joined: broadcast::Sender<LifecycleEvent>,
    left: broadcast::Sender<LifecycleEvent>,
    suspected: broadcast::Sender<LifecycleEvent>,
    died: broadcast::Sender<LifecycleEvent>,
    revived: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            joined: broadcast::channel(capacity).0,
            left: broadcast::channel(capacity).0,
            suspected: broadcast::channel(capacity).0,
            died: broadcast::channel(capacity).0,
            revived: broadcast::channel(capacity).0,
        }
    }

    /// Publish one event on its matching channel. A send error only ever
    /// means "no subscribers are currently listening", which is not a
    /// failure from the publisher's point of view.
    pub fn publish(&self, event: LifecycleEvent) {
        let sender = match &event {
            LifecycleEvent::NodeJoined(_) => &self.joined,
            LifecycleEvent::NodeLeft(_) => &self.left,
            LifecycleEvent::NodeSuspected(_) => &self.suspected,
            LifecycleEvent::NodeDied(_) => &self.died,
            LifecycleEvent::NodeRevived(_) => &self.revived,
        };
        if sender.send(event).is_err() {
            // No receivers subscribed right now; nothing to deliver.
        }
    }

    pub fn subscribe_joined(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.joined.subscribe()
    }

    pub fn subscribe_left(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.left.subscribe()
    }

    pub fn subscribe_suspected(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.suspected.subscribe()
    }

    pub fn subscribe_died(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.died.subscribe()
    }

    pub fn subscribe_revived(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.revived.subscribe()
    }

    /// Fan all five kinds into a single stream, convenient for diagnostics
    /// and for tests that just want "everything that happened to this
    /// node". Each underlying channel keeps its own independent capacity
    /// and drop-oldest behavior; this only merges delivery, not storage.
    pub fn subscribe_all(&self) -> broadcast::Receiver<LifecycleEvent> {
        let (tx, rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY * 5);
        for mut source in [
            self.joined.subscribe(),
            self.left.subscribe(),
            self.suspected.subscribe(),
            self.died.subscribe(),
            self.revived.subscribe(),
        ] {
            let forward_tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    match source.recv().await {
                        Ok(event) => {
                            if forward_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscribe_all fan-in lagged behind a source channel");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
        rx
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
