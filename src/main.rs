use anyhow::{Context, Result};
use guitar_deals::api::{router, AppState};
use guitar_deals::config::AppConfig;
use guitar_deals::deals::engine::DealEngine;
use guitar_deals::deals::postgres::PgStore;
use guitar_deals::deals::reference::{ReferenceLookup, StaticCatalog};
use guitar_deals::deals::store::{MarketStore, MemoryStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.logging.init();

    info!("Starting guitar deals API server...");

    let store: Arc<dyn MarketStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url)
                .await
                .context("Failed to connect to database")?,
        ),
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let reference: Arc<dyn ReferenceLookup> = match &config.catalog_path {
        Some(path) => Arc::new(
            StaticCatalog::from_csv_path(path)
                .with_context(|| format!("Failed to load catalog {:?}", path))?,
        ),
        None => {
            info!("CATALOG_PATH not set, using built-in reference catalog");
            Arc::new(StaticCatalog::builtin())
        }
    };

    let engine = DealEngine::new(store, reference, config.engine.clone());
    let app = router(AppState {
        engine: Arc::new(engine),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
