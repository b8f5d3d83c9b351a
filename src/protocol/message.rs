//! The on-wire heartbeat message: type, originator, sequence number,
//! timestamp, and free-form metadata.

use crate::common::{Metadata, NodeId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Message type, carried on the wire as a small integer so other encodings
/// can be layered on later without renegotiating the type space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Ping = 1,
    Pong = 2,
    Join = 3,
    Leave = 4,
    Health = 5,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::Ping),
            2 => Some(MessageType::Pong),
            3 => Some(MessageType::Join),
            4 => Some(MessageType::Leave),
            5 => Some(MessageType::Health),
            _ => None,
        }
    }
}

/// A heartbeat datagram, decoded into its logical fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub node_id: NodeId,
    pub sequence_number: i64,
    pub timestamp: i64,
    pub metadata: Metadata,
}

impl HeartbeatMessage {
    pub fn new(
        message_type: MessageType,
        node_id: impl Into<NodeId>,
        sequence_number: i64,
        metadata: Metadata,
    ) -> Self {
        Self {
            message_type,
            node_id: node_id.into(),
            sequence_number,
            timestamp: now_millis(),
            metadata,
        }
    }

    /// Build the server's `Pong` reply, echoing the peer's sequence number.
    pub fn pong_for(sequence_number: i64) -> Self {
        Self {
            message_type: MessageType::Pong,
            node_id: crate::common::SERVER_NODE_ID.to_string(),
            sequence_number,
            timestamp: now_millis(),
            metadata: Metadata::new(),
        }
    }
}

/// Current unix time in milliseconds, clamped to zero rather than panicking
/// if the system clock is somehow before the epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// Manual Serialize/Deserialize for MessageType so it round-trips as the
// small integer the wire format calls for, instead of serde's default
// tagged-string representation for unit enum variants.
impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        MessageType::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown message type code {value}")))
    }
}
