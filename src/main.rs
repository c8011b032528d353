use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use mockwire::blob::{BlobStore, HttpBlobStore, MemoryBlobStore};
use mockwire::config::Config;
use mockwire::engine::cache::MemoryCache;
use mockwire::notify::{LimitNotifier, NoopNotifier, SmtpNotifier};
use mockwire::store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting Mockwire");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations applied");

    let store = Arc::new(PgStore::new(pool));
    let cache = Arc::new(MemoryCache::new());

    let blob: Arc<dyn BlobStore> = match &config.blob_url {
        Some(url) => {
            tracing::info!("File uploads delegated to {url}");
            Arc::new(HttpBlobStore::new(url.clone()))
        }
        None => {
            tracing::warn!("No blob service configured, uploads held in memory");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let notifier: Arc<dyn LimitNotifier> = match config.smtp.as_ref() {
        Some(smtp) => match SmtpNotifier::new(smtp) {
            Ok(notifier) => {
                tracing::info!("SMTP notifications configured");
                Arc::new(notifier)
            }
            Err(e) => {
                tracing::warn!("SMTP not available: {e}");
                Arc::new(NoopNotifier)
            }
        },
        None => Arc::new(NoopNotifier),
    };

    let addr = SocketAddr::new(config.host, config.port);
    let state = mockwire::build_state(config, store, cache.clone(), blob, notifier);

    // Janitor: drop stale rate-limiter slots and expired cache entries.
    let janitor_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            janitor_state.rate_limiter.cleanup(Duration::from_secs(300));
            cache.sweep();
        }
    });

    let app = mockwire::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
