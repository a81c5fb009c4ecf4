use chatflows::database;
use chatflows::providers::{
    DocumentExtractor, HttpDocumentExtractor, HttpMessageSender, HttpQrRenderer,
    InMemoryDriverLocator, InMemoryRecordStore, LogMessageSender, MessageSender,
};
use chatflows::services::conversation::{Collaborators, Dispatcher, FlowSettings};
use chatflows::services::extraction::{InMemoryJobQueue, JobQueue};
use chatflows::services::sessions::{InMemorySessionStore, PgSessionStore, SessionStore};
use chatflows::{AppState, build_router, load_config, workers};
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,chatflows=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    tracing::info!("Loaded configuration:\n{}", config);

    let sessions: Arc<dyn SessionStore> = if config.database.enabled {
        let pool = database::connect(&config.database).await?;
        Arc::new(PgSessionStore::new(pool))
    } else {
        tracing::warn!("Database disabled, sessions are kept in memory");
        Arc::new(InMemorySessionStore::new())
    };

    let messages: Arc<dyn MessageSender> = if config.whatsapp.api_base_url.is_empty() {
        tracing::warn!("No messaging API configured, outbound messages are only logged");
        Arc::new(LogMessageSender)
    } else {
        Arc::new(HttpMessageSender::new(&config.whatsapp)?)
    };

    let drivers = Arc::new(InMemoryDriverLocator::new());
    if config.drivers.seed_file.is_empty() {
        tracing::warn!("No driver seed file configured, nearby searches find no drivers");
    } else {
        let seed = std::fs::read_to_string(&config.drivers.seed_file)?;
        let loaded = drivers.seed_from_json(&seed).await?;
        tracing::info!(loaded, path = %config.drivers.seed_file, "Driver positions loaded");
    }

    let jobs: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let services = Collaborators {
        messages,
        drivers,
        jobs: jobs.clone(),
        qr: Arc::new(HttpQrRenderer::new(&config.qr)?),
        records: Arc::new(InMemoryRecordStore::new()),
    };
    let dispatcher = Arc::new(Dispatcher::new(
        sessions,
        services,
        FlowSettings::from_config(&config.flows),
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut worker_handles = Vec::new();

    let (outcome_tx, outcome_rx) = mpsc::channel(64);
    if config.extractor.endpoint.is_empty() {
        tracing::warn!("No extractor endpoint configured, document uploads will stay pending");
    } else {
        let extractor: Arc<dyn DocumentExtractor> =
            Arc::new(HttpDocumentExtractor::new(&config.extractor)?);
        worker_handles.push(tokio::spawn(workers::extraction_worker(
            jobs,
            extractor,
            outcome_tx,
            Duration::from_secs(config.flows.extraction_poll_interval_seconds),
            shutdown_tx.subscribe(),
        )));
    }
    worker_handles.push(tokio::spawn(workers::extraction_outcome_worker(
        dispatcher.clone(),
        outcome_rx,
        shutdown_tx.subscribe(),
    )));
    worker_handles.push(tokio::spawn(workers::session_maintenance_worker(
        dispatcher.clone(),
        Duration::from_secs(config.flows.lock_prune_interval_seconds),
        TimeDelta::seconds(config.flows.dedup_retention_seconds),
        shutdown_tx.subscribe(),
    )));

    let bind_address = config.server.bind_address();
    let app = build_router(AppState::new(config, dispatcher));

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!("chatflows listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    for handle in worker_handles {
        if let Err(e) = handle.await {
            tracing::warn!("Worker task ended abnormally: {}", e);
        }
    }
    tracing::info!("chatflows stopped");
    Ok(())
}
