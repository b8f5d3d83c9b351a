//! The server health-check loop: periodically scan the registry, age out
//! silent nodes, and publish `NodeSuspected`/`NodeDied` transitions.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{EventBus, LifecycleEvent};
use crate::registry::{HealthTransition, NodeRegistry};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::debug;

/// Run until `shutdown_rx` reports `true`. Each tick's decisions are based
/// on a single snapshot of the registry taken at tick start — the registry
/// itself stays live and mutable under the ingress loop throughout, but
/// this loop's notion of "now" doesn't shift mid-tick.
pub async fn run(
    registry: Arc<NodeRegistry>,
    events: Arc<EventBus>,
    config: ServerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = interval(config.health_check_interval);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("health-check loop received shutdown signal");
                    return Ok(());
                }
            }
            _ = ticker.tick() => {
                run_one_tick(&registry, &events, &config);
            }
        }
    }
}

fn run_one_tick(registry: &NodeRegistry, events: &EventBus, config: &ServerConfig) {
    let now = Instant::now();
    let snapshot = registry.get_all();

    for record in snapshot {
        let transition = registry.tick(
            &record.node_id,
            now,
            config.heartbeat_timeout,
            config.suspect_threshold,
            config.max_missed_heartbeats,
        );

        match transition {
            Some(HealthTransition::Suspected(record)) => {
                events.publish(LifecycleEvent::NodeSuspected(record));
            }
            Some(HealthTransition::Died(record)) => {
                events.publish(LifecycleEvent::NodeDied(record));
            }
            None => {}
        }
    }
}
