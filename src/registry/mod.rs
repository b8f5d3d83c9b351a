//! The concurrent node registry: nodeId → node record, with a small set of
//! method-level-atomic operations. No raw map access escapes this module —
//! callers only ever see the operations below.

use crate::common::{Metadata, NodeId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Liveness classification. `Unknown` is notional — it is synthesised as
/// the "previous status" of a brand-new record and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Unknown,
    Alive,
    Suspected,
    Dead,
}

/// Server-side per-node state. `last_heartbeat` is intentionally not
/// serialized — an `Instant` has no stable external representation — so a
/// snapshot handed to a diagnostic layer gets a synthetic "now" instead of
/// a meaningless value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub address: String,
    pub port: u16,
    pub status: NodeStatus,
    #[serde(skip, default = "Instant::now")]
    pub last_heartbeat: Instant,
    pub missed_heartbeats: u32,
    pub metadata: Metadata,
}

impl NodeRecord {
    pub fn time_since_last_heartbeat(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_heartbeat)
    }
}

/// What happened to a node as a result of one health-check tick. The health
/// loop turns this into a `LifecycleEvent`; the registry itself knows
/// nothing about the event bus.
#[derive(Debug, Clone)]
pub enum HealthTransition {
    Suspected(NodeRecord),
    Died(NodeRecord),
}

/// Concurrent nodeId → `NodeRecord` map. Every public method here is atomic
/// with respect to concurrent callers: a `DashMap::entry` call (or the
/// equivalent single-shard-lock `get_mut`) is the unit of atomicity, never
/// a separate read followed by a write.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    inner: DashMap<NodeId, NodeRecord>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Insert a fresh `Alive` record if absent, otherwise refresh
    /// `address`/`port`/`metadata`, reset `missedHeartbeats` to 0, and set
    /// `status = Alive`. Returns the post-update record, whether it was
    /// newly created, and the status the record held *before* this call
    /// (`Unknown` for a new record) — all captured in the same critical
    /// section so a concurrent health-check tick cannot slip in between
    /// the read of the previous status and the write of the new one.
    pub fn add_or_update(
        &self,
        node_id: impl Into<NodeId>,
        address: impl Into<String>,
        port: u16,
        metadata: Metadata,
    ) -> (NodeRecord, bool, NodeStatus) {
        let node_id = node_id.into();
        match self.inner.entry(node_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous_status = occupied.get().status;
                let record = occupied.get_mut();
                record.address = address.into();
                record.port = port;
                record.metadata = metadata;
                record.status = NodeStatus::Alive;
                record.last_heartbeat = Instant::now();
                record.missed_heartbeats = 0;
                (record.clone(), false, previous_status)
            }
            Entry::Vacant(vacant) => {
                let record = NodeRecord {
                    node_id,
                    address: address.into(),
                    port,
                    status: NodeStatus::Alive,
                    last_heartbeat: Instant::now(),
                    missed_heartbeats: 0,
                    metadata,
                };
                vacant.insert(record.clone());
                (record, true, NodeStatus::Unknown)
            }
        }
    }

    /// Increment the miss counter. No-op returning 0 if the node is absent.
    pub fn increment_missed(&self, node_id: &str) -> u32 {
        match self.inner.get_mut(node_id) {
            Some(mut record) => {
                record.missed_heartbeats += 1;
                record.missed_heartbeats
            }
            None => 0,
        }
    }

    /// Force a status and return the previous one. No-op returning
    /// `Unknown` if the node is absent.
    pub fn set_status(&self, node_id: &str, status: NodeStatus) -> NodeStatus {
        match self.inner.get_mut(node_id) {
            Some(mut record) => std::mem::replace(&mut record.status, status),
            None => NodeStatus::Unknown,
        }
    }

    pub fn remove(&self, node_id: &str) -> Option<NodeRecord> {
        self.inner.remove(node_id).map(|(_, record)| record)
    }

    pub fn get(&self, node_id: &str) -> Option<NodeRecord> {
        self.inner.get(node_id).map(|r| r.clone())
    }

    /// A snapshot safe to iterate while other operations mutate the
    /// registry concurrently: each record is cloned out under its own
    /// shard lock, so structural modification mid-iteration can neither
    /// crash nor duplicate/skip a record that existed throughout.
    pub fn get_all(&self) -> Vec<NodeRecord> {
        self.inner.iter().map(|r| r.value().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    /// One health-check tick for a single node, performed as a single
    /// critical section so it cannot race with a concurrent `add_or_update`
    /// (the revival path): if the node went silent for longer than
    /// `heartbeat_timeout`, bump `missedHeartbeats`; then classify in
    /// priority order — Dead takes precedence over Suspected — with the
    /// at-most-once guards (`status != Dead`, `status == Alive`) that keep
    /// a transition from firing twice in a row. Returns `None` if the node
    /// is absent or no transition occurred this tick.
    pub fn tick(
        &self,
        node_id: &str,
        now: Instant,
        heartbeat_timeout: Duration,
        suspect_threshold: u32,
        max_missed_heartbeats: u32,
    ) -> Option<HealthTransition> {
        let mut entry = self.inner.get_mut(node_id)?;

        if entry.time_since_last_heartbeat(now) > heartbeat_timeout {
            entry.missed_heartbeats += 1;
        }

        if entry.missed_heartbeats >= max_missed_heartbeats && entry.status != NodeStatus::Dead {
            entry.status = NodeStatus::Dead;
            return Some(HealthTransition::Died(entry.clone()));
        }

        if entry.missed_heartbeats >= suspect_threshold && entry.status == NodeStatus::Alive {
            entry.status = NodeStatus::Suspected;
            return Some(HealthTransition::Suspected(entry.clone()));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_update_reports_new_record_and_unknown_previous_status() {
        let registry = NodeRegistry::new();
        let (record, was_new, previous) =
            registry.add_or_update("n1", "10.0.0.1", 9000, Metadata::new());

        assert!(was_new);
        assert_eq!(previous, NodeStatus::Unknown);
        assert_eq!(record.status, NodeStatus::Alive);
        assert_eq!(record.missed_heartbeats, 0);
    }

    #[test]
    fn add_or_update_on_existing_record_resets_missed_and_reports_previous_status() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "10.0.0.1", 9000, Metadata::new());
        registry.set_status("n1", NodeStatus::Suspected);
        registry.increment_missed("n1");

        let (record, was_new, previous) =
            registry.add_or_update("n1", "10.0.0.2", 9001, Metadata::new());

        assert!(!was_new);
        assert_eq!(previous, NodeStatus::Suspected);
        assert_eq!(record.status, NodeStatus::Alive);
        assert_eq!(record.missed_heartbeats, 0);
        assert_eq!(record.address, "10.0.0.2");
    }

    #[test]
    fn increment_missed_on_absent_node_is_a_no_op() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.increment_missed("ghost"), 0);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn set_status_on_absent_node_is_a_no_op() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.set_status("ghost", NodeStatus::Dead), NodeStatus::Unknown);
    }

    #[test]
    fn leave_then_rejoin_creates_a_fresh_record() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "10.0.0.1", 9000, Metadata::new());
        assert!(registry.remove("n1").is_some());
        assert!(registry.get("n1").is_none());

        let (_, was_new, previous) = registry.add_or_update("n1", "10.0.0.1", 9000, Metadata::new());
        assert!(was_new);
        assert_eq!(previous, NodeStatus::Unknown);
    }

    #[test]
    fn tick_is_a_no_op_for_an_absent_node() {
        let registry = NodeRegistry::new();
        let transition = registry.tick(
            "ghost",
            Instant::now(),
            Duration::from_millis(1),
            2,
            3,
        );
        assert!(transition.is_none());
    }

    #[test]
    fn boundary_exactly_at_suspect_threshold_becomes_suspected_not_earlier() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "a", 1, Metadata::new());
        let past = Instant::now() - Duration::from_secs(10);

        // One tick short of the threshold: still Alive.
        registry.increment_missed("n1");
        let none_yet = registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        assert!(matches!(none_yet, None));
        assert_eq!(registry.get("n1").unwrap().status, NodeStatus::Alive);

        // This tick pushes missed_heartbeats to 2 == suspect_threshold.
        let transition = registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        assert!(matches!(transition, Some(HealthTransition::Suspected(_))));
        assert_eq!(registry.get("n1").unwrap().status, NodeStatus::Suspected);
    }

    #[test]
    fn boundary_exactly_at_max_missed_becomes_dead() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "a", 1, Metadata::new());
        let past = Instant::now() - Duration::from_secs(10);

        for _ in 0..3 {
            registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        }

        assert_eq!(registry.get("n1").unwrap().status, NodeStatus::Dead);
        assert_eq!(registry.get("n1").unwrap().missed_heartbeats, 3);
    }

    #[test]
    fn dead_node_does_not_re_emit_died_on_subsequent_ticks() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "a", 1, Metadata::new());
        let past = Instant::now() - Duration::from_secs(10);

        for _ in 0..3 {
            registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        }
        let again = registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        assert!(again.is_none());
    }

    #[test]
    fn revival_resets_missed_and_clears_status() {
        let registry = NodeRegistry::new();
        registry.add_or_update("n1", "a", 1, Metadata::new());
        let past = Instant::now() - Duration::from_secs(10);
        for _ in 0..3 {
            registry.tick("n1", past, Duration::from_nanos(1), 2, 3);
        }
        assert_eq!(registry.get("n1").unwrap().status, NodeStatus::Dead);

        let (record, was_new, previous) = registry.add_or_update("n1", "a", 1, Metadata::new());
        assert!(!was_new);
        assert_eq!(previous, NodeStatus::Dead);
        assert_eq!(record.status, NodeStatus::Alive);
        assert_eq!(record.missed_heartbeats, 0);
    }

    #[test]
    fn get_all_snapshot_reflects_concurrent_state_without_duplication() {
        let registry = NodeRegistry::new();
        for i in 0..10 {
            registry.add_or_update(format!("n{i}"), "a", 1, Metadata::new());
        }
        let snapshot = registry.get_all();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(registry.count(), 10);
    }
}
