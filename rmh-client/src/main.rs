//! Session simulator (rmh-session) - Main entry point
//!
//! Runs every configured participant as an in-process client connected
//! through a [`LocalHub`], plays a short scripted hand-raise and X-card
//! sequence, and logs what each client's renderer would show.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rmh_client::config::{SimulatorConfig, CONFIG_ENV_VAR};
use rmh_client::{LocalHub, SessionClient, SignalOutcome};
use rmh_common::store::{MemoryConfigStore, SqliteConfigStore};
use rmh_common::{ConfigStore, SessionRoster, UserId};

/// Command-line arguments for rmh-session
#[derive(Parser, Debug)]
#[command(name = "rmh-session")]
#[command(about = "In-process raise-hand session simulator")]
#[command(version)]
struct Args {
    /// Simulator config file (TOML)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// SQLite settings database, overrides the config file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Exit after the scripted sequence instead of waiting for Ctrl+C
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = SimulatorConfig::load(args.config.as_deref())
        .context("Failed to load simulator configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        participants = config.participants.len(),
        "Starting raise-hand session simulator"
    );

    let store = open_store(args.database.or(config.database.clone())).await?;

    let roster = Arc::new(SessionRoster::new());
    for participant in &config.participants {
        roster.upsert(participant.to_user_info());
    }
    let hub = Arc::new(LocalHub::new(roster.clone()));

    let mut clients = Vec::with_capacity(config.participants.len());
    for participant in &config.participants {
        let mut client = SessionClient::builder(
            participant.id.as_str(),
            roster.clone(),
            store.clone(),
        )
        .event_capacity(config.event_capacity)
        .build();
        spawn_event_logger(&client);
        client.join(&hub);
        clients.push(client);
    }
    info!(connected = hub.connected_count(), "All clients joined");

    run_script(&clients, store.as_ref())
        .await
        .context("Scripted sequence failed")?;

    if !args.once {
        info!("Scripted sequence done, press Ctrl+C to exit");
        shutdown_signal().await;
    }

    for client in &mut clients {
        client.shutdown().await;
    }
    info!("Simulator shutdown complete");
    Ok(())
}

async fn open_store(database: Option<PathBuf>) -> Result<Arc<dyn ConfigStore>> {
    match database {
        Some(path) => {
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let store = SqliteConfigStore::connect(&url)
                .await
                .with_context(|| format!("Failed to open settings database {}", path.display()))?;
            info!(path = %path.display(), "Using SQLite settings store");
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory settings store");
            Ok(Arc::new(MemoryConfigStore::new()))
        }
    }
}

/// Log every event a client's renderer would receive
fn spawn_event_logger(client: &SessionClient) {
    let mut events = client.subscribe_events();
    let user_id = client.local_id().clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    info!(
                        client = %user_id,
                        event = event.event_type(),
                        subject = ?event.user_id(),
                        "Render"
                    );
                    match serde_json::to_string(&event) {
                        Ok(json) => debug!(client = %user_id, payload = %json, "Render payload"),
                        Err(e) => warn!(client = %user_id, error = %e, "Failed to encode event"),
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(client = %user_id, skipped, "Event logger lagged")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn run_script(clients: &[SessionClient], store: &dyn ConfigStore) -> Result<()> {
    let player = clients
        .iter()
        .find(|c| !c.state().is_local_privileged())
        .or_else(|| clients.first())
        .context("No participants configured")?;
    let moderator = clients.iter().find(|c| c.state().is_local_privileged());

    // Short debounce so the script does not have to wait
    store.set_notification_timeout(1).await?;

    let outcome = player.hand().toggle(true).await?;
    log_outcome(player.local_id(), "raise hand", &outcome);
    settle().await;

    let outcome = match moderator {
        Some(moderator) => {
            let outcome = moderator.hand().lower_for_user(player.local_id()).await?;
            log_outcome(moderator.local_id(), "lower hand for player", &outcome);
            outcome
        }
        None => {
            let outcome = player.hand().toggle(false).await?;
            log_outcome(player.local_id(), "lower hand", &outcome);
            outcome
        }
    };
    if !outcome.is_dispatched() {
        warn!("Hand was not lowered");
    }
    settle().await;

    let mut xcard = store.xcard().await?;
    xcard.enabled = true;
    xcard.anonymize = true;
    store.set_xcard(xcard).await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let outcome = player.safety().trigger().await?;
    log_outcome(player.local_id(), "X-card", &outcome);
    settle().await;

    Ok(())
}

fn log_outcome(user_id: &UserId, action: &str, outcome: &SignalOutcome) {
    match outcome.report() {
        Some(report) => info!(
            user_id = %user_id,
            action,
            completed = ?report.completed,
            failed = report.failed.len(),
            "Signal dispatched"
        ),
        None => info!(user_id = %user_id, action, outcome = ?outcome, "Signal not dispatched"),
    }
}

/// Give listeners time to drain their inboxes
async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
