use anyhow::{Context, Result};
use tokio::signal;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use poolwatch::config::ListenerConfig;
use poolwatch::ingest::{ConnectionState, ListenerExit, PoolListener, WsTransport};
use poolwatch::transport::{forward_to, ConsoleReporter, PoolBus};
use poolwatch::util::init_tracing;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = ListenerConfig::load().context("failed to load listener configuration")?;
    let _guard = init_tracing(&config.logging)?;

    match &source {
        Some(path) => info!("📄 Loaded configuration from {}", path.display()),
        None => info!("📄 No configuration file found, using defaults"),
    }
    info!(
        endpoint = %config.wss_endpoint,
        program = %config.program_address,
        watched_tokens = config.token_watchlist.len(),
        max_reconnect_attempts = config.max_reconnect_attempts,
        reconnect_delay_ms = config.reconnect_delay_ms,
        "🚀 Raydium pool initialization listener starting"
    );
    if config.token_watchlist.is_empty() {
        info!("Token watchlist is empty; every detected pool will be reported");
    }

    let bus = PoolBus::default();
    let reporter = tokio::spawn(forward_to(bus.subscribe(), ConsoleReporter));

    let transport = WsTransport::new(config.connect_timeout(), config.heartbeat_interval());
    let mut listener = PoolListener::new(&config, transport, bus)
        .context("invalid listener configuration")?;

    let exit = tokio::select! {
        exit = listener.run() => exit,
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down");
            listener.shutdown();
            if listener.state() == ConnectionState::Closing {
                match timeout(SHUTDOWN_GRACE, listener.run()).await {
                    Ok(exit) => exit,
                    Err(_) => {
                        warn!("Connection did not close within {:?}", SHUTDOWN_GRACE);
                        ListenerExit::Stopped
                    }
                }
            } else {
                ListenerExit::Stopped
            }
        }
    };

    let stats = listener.stats().clone();
    info!(
        connections_opened = stats.connections_opened,
        frames_received = stats.frames_received,
        frames_dropped = stats.frames_dropped,
        relevant_logs = stats.relevant_logs,
        pools_emitted = stats.pools_emitted,
        pools_skipped = stats.pools_skipped,
        extraction_rejects = stats.extraction_rejects,
        rpc_errors = stats.rpc_errors,
        "Listener statistics"
    );

    // Dropping the listener drops the bus sender and ends the reporter
    drop(listener);
    if let Err(e) = reporter.await {
        error!("Pool reporter task failed: {}", e);
    }

    match exit {
        ListenerExit::Exhausted { attempts } => {
            error!(
                attempts,
                "❌ Listener stopped after exhausting reconnect attempts; restart required"
            );
            Ok(())
        }
        ListenerExit::TransportEnded => {
            warn!("Transport ended unexpectedly");
            Ok(())
        }
        ListenerExit::Stopped => {
            info!("✅ Listener shut down cleanly");
            Ok(())
        }
    }
}
