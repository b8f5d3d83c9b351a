//! Encode/decode the heartbeat message to/from a UDP datagram payload.
//!
//! JSON is the chosen wire encoding (spec-sanctioned default: datagrams stay
//! well under typical MTU even with modest metadata). Nothing downstream
//! should assume JSON specifically though — `MessageType` round-trips as a
//! small integer precisely so a future binary encoding is a drop-in swap.

use crate::common::{MAX_DATAGRAM_SIZE, MAX_NODE_ID_LEN};
use crate::error::{Error, Result};
use crate::protocol::message::HeartbeatMessage;

/// Encode a message to bytes, rejecting anything that would not fit in a
/// single UDP datagram under the configured size ceiling.
pub fn encode(message: &HeartbeatMessage) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(Error::DatagramTooLarge {
            len: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(bytes)
}

/// Decode a datagram payload. Any malformed or unrecognized payload yields
/// an `Err` rather than panicking — callers are expected to log it at debug
/// and drop the datagram, never let a hostile peer take the ingress loop
/// down. A `nodeId` outside the wire format's `1..=128` byte bound fails to
/// decode into the message shape just as much as malformed JSON does.
pub fn decode(bytes: &[u8]) -> Result<HeartbeatMessage> {
    let message: HeartbeatMessage = serde_json::from_slice(bytes).map_err(Error::from)?;
    validate_node_id(&message.node_id)?;
    Ok(message)
}

fn validate_node_id(node_id: &str) -> Result<()> {
    let len = node_id.len();
    if len == 0 || len > MAX_NODE_ID_LEN {
        return Err(Error::InvalidNodeId(format!(
            "nodeId must be 1..={MAX_NODE_ID_LEN} bytes, got {len}"
        )));
    }
    Ok(())
}
