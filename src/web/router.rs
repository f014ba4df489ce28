//! Web application router and middleware setup.

use super::{handlers, websocket, AppState};
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the axum application with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let mut app = Router::new()
        // API routes
        .route("/api/health", get(handlers::health_check))
        .route("/api/channels", get(handlers::list_channels))
        // WebSocket route
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state);

    if enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
