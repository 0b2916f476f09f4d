use std::sync::Arc;

use chrono::Utc;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventease_server::config::{Config, StorageBackend};
use eventease_server::routes::{create_routes, AppState};
use eventease_server::scheduling::{Context, Engine};
use eventease_server::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let ctx = match config.storage {
        StorageBackend::Postgres => {
            let store = PgStore::connect(
                &config.database_url,
                config.max_connections,
                config.store_timeout,
            )
            .await?;
            tracing::info!("Successfully connected to database");

            store.migrate().await?;
            tracing::info!("Migrations run successfully");

            let store = Arc::new(store);
            Context::new(store.clone(), store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            match &config.seed_users_file {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path).await?;
                    let count = store.seed_users_json(&json, Utc::now()).await?;
                    tracing::info!(count, path = %path.display(), "Seeded user directory");
                }
                None => tracing::warn!(
                    "SEED_USERS_FILE not set, the user directory is empty and event creation will be refused"
                ),
            }
            Context::new(store.clone(), store)
        }
    }
    .with_timeout(config.store_timeout);

    let app = create_routes(AppState::new(Engine::new(ctx)), &config);

    tracing::info!("Server running at http://{}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
