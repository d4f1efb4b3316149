//! Thin HTTP front-end over the forge orchestration engine. All routes
//! delegate straight to `forge_core::engine` — no orchestration logic lives
//! here.

pub mod error;
pub mod routes;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use model_gateway::ChatBackend;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf, backend: Arc<dyn ChatBackend>) -> Router {
    let app_state = state::AppState::new(root, backend);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/tasks", get(routes::list_tasks))
        .route("/api/memory", get(routes::list_memory))
        .route("/api/generate", post(routes::generate))
        .route("/api/edit", post(routes::edit))
        .route("/api/project", post(routes::build_project))
        .route("/api/meta", post(routes::meta_build))
        .route("/api/tests", post(routes::run_tests))
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server on `port` (0 = OS-assigned).
pub async fn serve(
    root: PathBuf,
    backend: Arc<dyn ChatBackend>,
    port: u16,
) -> anyhow::Result<()> {
    let router = build_router(root, backend);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "forge server listening");
    println!("forge server listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
