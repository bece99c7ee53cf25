//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, bearer auth,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use labkeeper_core::error::LabError;

use crate::handlers;
use crate::state::AppState;

/// Origins allowed by CORS: localhost on the API port, plus configured extras.
fn allowed_origins(state: &AppState) -> Vec<HeaderValue> {
    let port = state.config.general.port;
    let mut origins = vec![
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ];
    origins.extend(state.config.api.cors_origins.iter().cloned());

    origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state)))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route(
            "/chat/context",
            get(handlers::get_context).delete(handlers::clear_context),
        )
        .route("/chat/history", get(handlers::chat_history))
        .route("/chemicals/{id}/usage", post(handlers::log_usage))
        .route("/borrowings", post(handlers::create_borrowing))
        .route("/schedules/{id}/status", put(handlers::update_schedule_status))
        .route("/schedules/stream", get(handlers::schedule_stream))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on 127.0.0.1 at the configured port until `shutdown`
/// resolves, then close all schedule streams.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), LabError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let registry = state.schedule_clients.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LabError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            // Open SSE streams would otherwise hold graceful shutdown open.
            registry.shutdown();
        })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
