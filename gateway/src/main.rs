use std::{fs::read_to_string, sync::Arc};

use anyhow::{Context, Result};
use chef_core::{Brain, Orchestrator};
use chef_gateway::{config::Config, cors, router, shutdown_signal, AppState};
use chef_tools::{catalog_registry, CatalogStore, SqliteCatalog};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("SmartChef Gateway Initializing...");
    let config = Config::load()?;

    info!("Opening catalog...");
    let catalog = SqliteCatalog::connect(&config.database_url).await?;
    catalog.migrate().await?;
    if let Some(path) = &config.catalog_seed_file {
        if catalog.is_empty().await? {
            let sql = read_to_string(path)
                .with_context(|| format!("failed to read seed file {}", path.display()))?;
            catalog.seed(&sql).await?;
            info!("Seeded catalog from {}", path.display());
        } else {
            info!("Catalog already populated, skipping seed");
        }
    }

    let store: Arc<dyn CatalogStore> = Arc::new(catalog);
    let registry = catalog_registry(store, config.card_style())?;
    info!("Loaded {} tools available for the Brain.", registry.len());

    let brain = Brain::new(&config.llm);
    match brain.say_hello().await {
        Ok(msg) => info!("Brain Status: {}", msg),
        Err(e) => error!("Brain is online but unresponsive: {e:#}"),
    }

    let orchestrator = Orchestrator::new(Arc::new(brain), Arc::new(registry), config.assistant()?);
    let app = router(AppState::new(orchestrator)).layer(cors(&config.client_url)?);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Gateway listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}
