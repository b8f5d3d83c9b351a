//! `pulsewatch` — a UDP-based failure-detection service.
//!
//! A server maintains a registry of remote nodes, ingests heartbeat
//! datagrams, classifies liveness through Alive → Suspected → Dead (with
//! revival), and publishes lifecycle events. A symmetric client emits
//! pings and tracks connection state against the server.

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::Server;
