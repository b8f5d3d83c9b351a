//! The server half of pulsewatch: binds a UDP socket and runs the ingress
//! and health-check loops concurrently against a shared registry.

mod health;
mod ingress;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::registry::NodeRegistry;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::info;

pub struct Server {
    config: ServerConfig,
    registry: Arc<NodeRegistry>,
    events: Arc<EventBus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            registry: Arc::new(NodeRegistry::new()),
            events: Arc::new(EventBus::new(config.event_channel_capacity)),
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Bind the UDP socket and run the ingress and health-check loops
    /// until `shutdown()` is called (or either loop hits a fatal error).
    /// Returns once both loops have exited.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.listen_port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, "pulsewatch server listening");
        let socket = Arc::new(socket);

        let ingress_task = tokio::spawn(ingress::run(
            socket,
            self.registry.clone(),
            self.events.clone(),
            self.shutdown_rx.clone(),
        ));
        let health_task = tokio::spawn(health::run(
            self.registry.clone(),
            self.events.clone(),
            self.config.clone(),
            self.shutdown_rx.clone(),
        ));

        let (ingress_result, health_result) = tokio::join!(ingress_task, health_task);
        ingress_result.map_err(join_error)??;
        health_result.map_err(join_error)??;
        Ok(())
    }

    /// Signal every loop to terminate promptly at its next suspension
    /// point. Does not block; call `run` to wait for the loops to exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(e))
}
