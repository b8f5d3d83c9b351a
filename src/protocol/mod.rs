//! Wire format: the heartbeat message shape and its datagram codec.

pub mod codec;
pub mod message;

pub use codec::{decode, encode};
pub use message::{now_millis, HeartbeatMessage, MessageType};
