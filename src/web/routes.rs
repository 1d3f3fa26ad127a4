use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::control_ws::control_ws_handler;
use super::handlers;
use super::static_files::static_handler;
use super::video_ws::video_ws_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/hostname", get(handlers::hostname))
        .route("/config", get(handlers::client_config))
        // Video settings & control
        .route("/settings", get(handlers::settings_get))
        .route("/settings/update", post(handlers::settings_update))
        .route("/video/start", post(handlers::video_start))
        .route("/video/stop", post(handlers::video_stop))
        .route("/camera-modes", get(handlers::camera_modes))
        // HID
        .route("/hid/reset", post(handlers::hid_reset))
        .route("/ws", any(control_ws_handler));

    // Video endpoints, one per pipeline
    let stream_routes = Router::new()
        .route("/stream", get(handlers::mjpeg_stream))
        .route("/video-stream", any(video_ws_handler));

    Router::new()
        .merge(api_routes)
        .merge(stream_routes)
        .fallback(static_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
