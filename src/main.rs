//! Ticket pool simulation runner
//!
//! # Architecture
//! - **core**: Data model (TicketRecord, TransactionEvent, ActorId)
//! - **pool**: Coordinator monitor, vendor/customer workers, shutdown
//! - **storage**: Ticket record store and transaction log sinks
//! - **manager**: Configuration surface for one simulation
//! - **infrastructure**: Config, logging, metrics
//!
//! Runs one simulation from config.toml and exits once it stops, either on
//! its own (capacity sold out) or on Ctrl-C.

use std::sync::Arc;
use std::time::Duration;
use ticket_pool::infrastructure::{config::Config, logging::init_logging};
use ticket_pool::{Result, SimError, SimulationManager};

/// How often the runner logs pool status
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for the final flush after the run stops
const SHUTDOWN_WAIT: Duration = Duration::from_secs(30);

/// Run a blocking manager call off the async workers
async fn blocking<T, F>(manager: &Arc<SimulationManager>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&SimulationManager) -> T + Send + 'static,
{
    let manager = manager.clone();
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| SimError::Runtime(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load config or use defaults
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}; using defaults", e);
        Config::default()
    });
    let _guards = init_logging(&config.logging)?;

    let manager = Arc::new(SimulationManager::from_config(&config)?);
    let run_id = manager.start()?;
    tracing::info!("Simulation {} running", run_id);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status_interval = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Stop requested");
                blocking(&manager, |m| m.stop()).await?;
                break;
            }
            _ = status_interval.tick() => {
                let status = manager.status();
                if !status.running {
                    break;
                }
                tracing::info!(
                    "Pool: issued {}/{}, remaining {}, {:.1} tickets/s",
                    status.issued,
                    status.max_capacity,
                    status.remaining,
                    status.metrics.ticket_rate
                );
            }
        }
    }

    if !blocking(&manager, |m| m.wait_for_shutdown(SHUTDOWN_WAIT)).await? {
        tracing::warn!("Shutdown did not finish within {:?}", SHUTDOWN_WAIT);
    }

    let status = manager.status();
    let events = manager.get_transaction_log()?;
    tracing::info!(
        "Simulation {} finished: {} tickets issued, {} retrieved, {} left, {} log entries",
        run_id,
        status.metrics.tickets_added,
        status.metrics.tickets_retrieved,
        status.remaining,
        events.len()
    );

    Ok(())
}
