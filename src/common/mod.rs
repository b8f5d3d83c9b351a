//! Shared types used across the ingress, registry, and event-bus modules.

use std::collections::HashMap;

/// Node identifier. A plain string is sufficient here: the wire format
/// carries it as a UTF-8 string and the registry keys off it directly.
pub type NodeId = String;

/// Free-form key/value metadata attached to a heartbeat message or node
/// record. Keys are unique within a single map by construction (it's a
/// `HashMap`).
pub type Metadata = HashMap<String, String>;

/// Reserved node id the server uses when it is itself the originator of a
/// message (currently only `Pong` responses).
pub const SERVER_NODE_ID: &str = "SERVER";

/// Datagrams above this size are rejected by the codec before they ever hit
/// the wire, keeping every logical message inside a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 1200;

/// Maximum length, in bytes, of a `nodeId` string per the wire format.
pub const MAX_NODE_ID_LEN: usize = 128;

/// Typical cap on the number of metadata entries in a single message.
/// Not enforced as a hard limit by the codec (the wire format calls it
/// "typical"), but used to size default buffers.
pub const TYPICAL_MAX_METADATA_ENTRIES: usize = 64;
