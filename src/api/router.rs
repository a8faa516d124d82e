use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes, no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes: require Bearer token when API_TOKEN is set
    let protected = Router::new()
        // Position sizing
        .route("/api/risk/position-size", post(handlers::sizing::position_size))
        // Accounts
        .route("/api/accounts", get(handlers::accounts::list))
        .route("/api/accounts/:id", get(handlers::accounts::detail))
        .route("/api/accounts/:id/alerts", get(handlers::accounts::alerts))
        // Monitoring cycle
        .route("/api/monitor/run", post(handlers::monitor::run))
        .route("/api/monitor/status", get(handlers::monitor::status))
        // WebSocket
        .route("/ws", get(handlers::ws::handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
