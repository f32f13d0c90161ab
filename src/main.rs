use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutoring::api::router;
use tutoring::clock::SystemClock;
use tutoring::config::{AppConfig, StoreBackend};
use tutoring::db::{self, SqliteStore};
use tutoring::state::AppState;
use tutoring::store::{MemoryStore, SlotStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tutoring=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let store: Arc<dyn SlotStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            let pool = db::connect(&config.database_url, config.database_max_connections).await?;
            Arc::new(SqliteStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("using in-memory store, bookings will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = config.bind_addr;
    let state = AppState::new(store, Arc::new(SystemClock), config);

    let app = router(state);

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
