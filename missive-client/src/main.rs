//! missive-client
//!
//! Fetches every user with their messages and prints each rendered state.
//!
//! Usage:
//!   API_URL=http://localhost:4000/graphql missive-client

#![deny(warnings)]
#![deny(missing_docs)]

use std::sync::Arc;

use serde_json::Map;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use missive_client::query::GET_USERS;
use missive_client::{Client, ClientConfig, ClientError, HttpTransport, render};

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

    let config = ClientConfig::from_env()?;
    tracing::info!("Querying {}", config.api_url);

    let transport = HttpTransport::new(config.api_url.clone(), config.timeout)?;
    let client = Client::new(Arc::new(transport)).with_timeout(config.timeout);
    let variables = Map::new();

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut rx = client.subscribe(GET_USERS, &variables);
    let printer = tokio::spawn(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let view = render(&snapshot);
            if !view.is_empty() {
                print!("{view}");
            }
            if snapshot.state.is_terminal() || rx.changed().await.is_err() {
                break;
            }
        }
    });

    match client.execute_with_cancel(GET_USERS, &variables, &token).await {
        Ok(result) => {
            printer.await?;
            if result.is_error() {
                tracing::warn!("query finished with errors");
            }
        }
        Err(ClientError::Cancelled) => {
            printer.abort();
            tracing::info!("Cancelled");
        }
    }

    Ok(())
}
