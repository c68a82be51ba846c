//! HTTP surface
//!
//! `POST /graphql` executes a request; `GET /graphql` and `GET /` serve an
//! in-browser sandbox pointed at the endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ExecutionError;
use crate::executor::Executor;
use crate::response::{Request, Response};

/// Build the application router
pub fn router(executor: Arc<Executor>) -> Router {
    Router::new()
        .route("/graphql", get(sandbox).post(graphql_handler))
        .route("/", get(sandbox))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(executor)
}

/// Bind the configured port and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, executor: Arc<Executor>) -> std::io::Result<()> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("GraphQL server ready at http://localhost:{}/graphql", config.port);

    axum::serve(listener, router(executor))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// GraphQL handler
async fn graphql_handler(
    State(executor): State<Arc<Executor>>,
    payload: Result<Json<Request>, JsonRejection>,
) -> (StatusCode, Json<Response>) {
    match payload {
        Ok(Json(request)) => (StatusCode::OK, Json(executor.execute(&request).await)),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejecting request body");
            (
                rejection.status(),
                Json(Response::rejected(ExecutionError::validation(rejection.body_text()))),
            )
        }
    }
}

/// Apollo Sandbox handler
async fn sandbox() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Missive - Apollo Sandbox</title>
    <style>body { margin: 0; overflow: hidden; }</style>
</head>
<body>
    <div id="sandbox" style="width: 100vw; height: 100vh;"></div>
    <script src="https://embeddable-sandbox.cdn.apollographql.com/_latest/embeddable-sandbox.umd.production.min.js"></script>
    <script>
        new window.EmbeddedSandbox({
            target: '#sandbox',
            initialEndpoint: window.location.origin + '/graphql',
        });
    </script>
</body>
</html>"#,
    )
}
