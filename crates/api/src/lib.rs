pub mod panel;
pub mod routes;
pub mod state;
pub mod view;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

pub use state::AppState;

/// Build the Axum application router.
///
/// Failed responses are traced at WARN; handlers log their own causes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(panel::panel_routes())
        .nest("/api", routes::api_routes())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .on_failure(DefaultOnFailure::new().level(Level::WARN)),
        )
        .with_state(state)
}

/// Start the panel server.
pub async fn start_server(state: Arc<AppState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Order desk listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
