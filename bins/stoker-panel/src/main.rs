use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use stoker_management::{InstanceManager, PanelConfig, StaticPasswordVerifier};
use stoker_rcon::RconServer;

/// Stoker - multi-instance game server panel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// RCON listen address (overrides config)
    #[arg(long)]
    rcon_listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    info!("Starting Stoker panel");
    info!("Config file: {}", args.config);

    let mut config = PanelConfig::load_from_file(&args.config)?;
    if let Some(listen) = args.rcon_listen {
        config.panel.rcon.listen = listen;
    }

    // Loading the registry reattaches to any instances a previous
    // panel process left running.
    let instances = InstanceManager::load(&config)?;
    info!("Loaded {} instances", instances.len());
    for handle in instances.handles() {
        info!(id = %handle.id, name = %handle.name, state = %handle.supervisor.state(), "instance");
    }

    let verifier = Arc::new(StaticPasswordVerifier::new(config.panel.rcon.password.clone()));
    let rcon = RconServer::bind(&config.panel.rcon.listen, verifier, instances).await?;

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(rcon.serve(shutdown.clone()));

    wait_for_shutdown_signal().await;
    info!("Shutting down");
    shutdown.cancel();
    server.await??;

    // Instances are deliberately left running; the next panel process
    // reattaches through their PID files.
    info!("Panel shut down");
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to create SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to create SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
