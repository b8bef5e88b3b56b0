//! Dance Studio Management Platform - Backend Server

use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dance_studio_backend::external::{NotificationClient, Notifier, PaymentProviderClient};
use dance_studio_backend::{background, create_app, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(&config);

    tracing::info!("Starting Dance Studio Management Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let notifier: Arc<dyn Notifier> = Arc::new(NotificationClient::new(&config.notifications)?);
    let payments = PaymentProviderClient::new(&config.billing);
    if !payments.is_configured() {
        tracing::warn!("Payment provider secret key is not set; provider calls will fail");
    }

    // Create application state
    let state = AppState {
        db: db_pool.clone(),
        config: Arc::new(config.clone()),
        payments,
        notifier: notifier.clone(),
    };

    // In-process scheduler
    let scheduler_cancel = CancellationToken::new();
    let scheduler_handle = if config.scheduler.enabled {
        Some(tokio::spawn(background::scheduler::run(
            db_pool,
            notifier,
            config.scheduler.interval_secs,
            scheduler_cancel.clone(),
        )))
    } else {
        tracing::info!("In-process scheduler disabled; relying on cron endpoints");
        None
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped accepting connections, cleaning up");
    scheduler_cancel.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        tracing::info!("Scheduler stopped");
    }
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Initialize tracing with a pretty or JSON formatter
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dance_studio_backend=debug,studio_server=debug,tower_http=debug,sqlx=warn".into());

    let (pretty, json) = if config.logging.format.eq_ignore_ascii_case("json") {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
