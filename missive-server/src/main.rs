//! missive-server
//!
//! Serves the users/messages GraphQL API.
//!
//! Usage:
//!   API_PORT=4000 missive-server
//!   DATABASE_URL=sqlite://missive.db?mode=rwc missive-server

#![deny(warnings)]
#![deny(missing_docs)]

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use missive_server::{EntityStore, Executor, MemoryStore, SeaOrmStore, ServerConfig, schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn EntityStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let store = SeaOrmStore::connect(url).await?;
            tracing::info!("Database connected!");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, serving in-memory demo data");
            Arc::new(MemoryStore::demo())
        }
    };

    tracing::debug!("schema:\n{}", schema::sdl());

    let executor = Arc::new(Executor::new(store).with_store_timeout(config.store_timeout));
    missive_server::serve(&config, executor).await?;

    Ok(())
}
