use clap::Parser;
use pulsewatch::{Server, ServerConfig};
use std::process::ExitCode;
use tracing::{error, info};

/// pulsewatch failure-detection server.
#[derive(Parser, Debug)]
#[command(name = "pulsewatch-server", version, about)]
struct Cli {
    /// UDP port to listen on.
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::default();
    if let Some(port) = cli.port {
        config.listen_port = port;
    }

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "invalid server configuration");
            return ExitCode::FAILURE;
        }
    };

    let shutdown_server = std::sync::Arc::new(server);
    let signal_server = shutdown_server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            signal_server.shutdown();
        }
    });

    match shutdown_server.run().await {
        Ok(()) => {
            info!("server shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}
