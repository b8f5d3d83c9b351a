use clap::Parser;
use pulsewatch::{Client, ClientConfig};
use std::process::ExitCode;
use tracing::{error, info};

/// pulsewatch heartbeat client.
#[derive(Parser, Debug)]
#[command(name = "pulsewatch-client", version, about)]
struct Cli {
    /// Node identifier to announce to the server. Random if omitted.
    node_id: Option<String>,
    /// Server address to connect to.
    server_address: Option<String>,
    /// Server UDP port.
    server_port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::default();
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(server_address) = cli.server_address {
        config.server_address = server_address;
    }
    if let Some(server_port) = cli.server_port {
        config.server_port = server_port;
    }

    let client = match Client::connect(config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to start client");
            return ExitCode::FAILURE;
        }
    };

    let client = std::sync::Arc::new(client);
    let signal_client = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            signal_client.shutdown();
        }
    });

    match client.run().await {
        Ok(()) => {
            info!("client shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "client exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}
