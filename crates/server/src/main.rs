use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldreport_core::{
    load_config,
    queue::SqliteTicketQueue,
    storage::{migrate_local_to_remote, LocalBackend, MigrationOptions, S3Backend},
    validate_config, BacklogNotifier, Config, DocumentOrchestrator, FileLibrary, ObjectStore,
    Prefix, ReportStore, SqliteFileStore, SqliteReportStore, SqliteTicketStore, TicketIntake,
    TicketService, TicketStore, TicketWorker,
};

use fieldreport_server::api::create_router;
use fieldreport_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("FIELDREPORT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("migrate") => migrate(&config, &args[1..]).await,
        Some(other) => bail!("Unknown command: {}", other),
        None => serve(config).await,
    }
}

/// Copy local objects into the configured bucket, then exit.
async fn migrate(config: &Config, args: &[String]) -> Result<()> {
    let mut options = MigrationOptions::default();
    for arg in args {
        match arg.as_str() {
            "--verify" => options.verify_checksums = true,
            "--dry-run" => options.dry_run = true,
            other => bail!("Unknown migrate option: {}", other),
        }
    }

    let Some(remote_config) = &config.storage.remote else {
        bail!("storage.remote must be configured to migrate");
    };

    let local = LocalBackend::new(&config.storage.local_root);
    let remote = S3Backend::connect(remote_config)
        .await
        .context("Failed to connect to remote storage")?;

    info!(
        root = %config.storage.local_root.display(),
        bucket = %remote.bucket(),
        dry_run = options.dry_run,
        verify = options.verify_checksums,
        "Starting storage migration"
    );
    let report = migrate_local_to_remote(&local, &remote, &Prefix::ALL, options)
        .await
        .context("Storage migration failed")?;

    let totals = report.totals();
    info!(
        total = totals.total,
        uploaded = totals.uploaded,
        skipped = totals.skipped,
        refreshed = totals.refreshed,
        failed = totals.failed,
        "Storage migration finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    if totals.failed > 0 {
        bail!("{} objects failed to migrate", totals.failed);
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    // Object storage
    let objects = Arc::new(ObjectStore::from_config(&config.storage).await);

    tokio::fs::create_dir_all(&config.generation.staging_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {:?}",
                config.generation.staging_dir
            )
        })?;

    // SQLite stores
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    let report_store: Arc<dyn ReportStore> = Arc::new(
        SqliteReportStore::new(&config.database.path).context("Failed to create report store")?,
    );
    info!("Report store initialized");

    let file_store = Arc::new(
        SqliteFileStore::new(&config.database.path).context("Failed to create file store")?,
    );
    let library = FileLibrary::new(file_store, Arc::clone(&objects));
    info!("File library initialized");

    let queue = Arc::new(
        SqliteTicketQueue::new(
            &config.database.path,
            config.queue.name.clone(),
            Duration::from_secs(config.queue.lease_secs),
            config.queue.max_deliveries,
        )
        .context("Failed to create ticket queue")?,
    );
    info!(queue = %config.queue.name, "Ticket queue initialized");

    // Backlog notifier
    let notifier = Arc::new(BacklogNotifier::from_config(
        &config.notifier,
        Arc::clone(&ticket_store),
    ));

    // Document generation
    let orchestrator = DocumentOrchestrator::from_config(
        &config.generation,
        Arc::clone(&objects),
        Arc::clone(&report_store),
        Arc::clone(&ticket_store),
    )
    .context("Failed to create generation backends")?;
    if orchestrator.backend_names().is_empty() {
        warn!("No generation backends configured, report generation is disabled");
    } else {
        info!(backends = ?orchestrator.backend_names(), "Document orchestrator initialized");
    }

    let tickets = TicketService::new(Arc::clone(&ticket_store), Arc::clone(&objects))
        .with_notifier(Arc::clone(&notifier));
    let intake = TicketIntake::new(Arc::clone(&objects), queue.clone())
        .with_notifier(Arc::clone(&notifier))
        .with_publish_timeout(Duration::from_secs(config.queue.publish_timeout_secs));

    // Start the queue worker
    let worker = Arc::new(
        TicketWorker::new(queue, Arc::clone(&ticket_store))
            .with_notifier(Arc::clone(&notifier))
            .with_poll_interval(Duration::from_millis(config.queue.poll_interval_ms)),
    );
    worker.start();
    info!("Ticket worker started");

    // Periodic backlog check
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let notifier_handle = if config.notifier.enabled {
        Some(notifier.spawn_periodic(
            Duration::from_secs(config.notifier.interval_secs),
            shutdown_tx.subscribe(),
        ))
    } else {
        info!("Backlog notifier disabled in config");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        objects,
        Arc::new(tickets),
        report_store,
        Arc::new(library),
        Arc::new(orchestrator),
        Arc::new(intake),
        notifier,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    info!("Stopping ticket worker...");
    worker.stop().await;
    info!("Ticket worker stopped");

    let _ = shutdown_tx.send(());
    if let Some(handle) = notifier_handle {
        let _ = handle.await;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
