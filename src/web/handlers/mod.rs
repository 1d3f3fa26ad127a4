use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::VideoSettings;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::video::mjpeg::{multipart_part, BOUNDARY};
use crate::video::CameraMode;

/// `{"status": "..."}` acknowledgement
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    fn json(status: &'static str) -> Json<Self> {
        Json(Self { status })
    }
}

// ============================================================================
// Health & Info
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct HostnameResponse {
    pub hostname: String,
}

pub async fn hostname() -> Result<Json<HostnameResponse>> {
    let hostname = nix::unistd::gethostname()
        .map_err(|e| AppError::Internal(format!("Failed to get hostname: {}", e)))?
        .to_string_lossy()
        .into_owned();
    Ok(Json(HostnameResponse { hostname }))
}

/// Client configuration
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Port the browser should load ustreamer's MJPEG from
    pub ustreamer_port: String,
}

pub async fn client_config(State(state): State<Arc<AppState>>) -> Json<ClientConfig> {
    Json(ClientConfig {
        ustreamer_port: state.config.video.ustreamer.address.port().to_string(),
    })
}

// ============================================================================
// Video settings & control
// ============================================================================

pub async fn settings_get(State(state): State<Arc<AppState>>) -> Json<VideoSettings> {
    Json(state.settings.get())
}

/// Validate and store new settings; they apply on the next ustreamer start.
pub async fn settings_update(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VideoSettings>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let Json(settings) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
    state.settings.set(settings)?;
    Ok(StatusResponse::json("updated"))
}

pub async fn video_start(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    state.ustreamer()?.start().await?;
    Ok(StatusResponse::json("started"))
}

pub async fn video_stop(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    state.ustreamer()?.stop().await;
    info!("Video stopped by request");
    Ok(StatusResponse::json("stopped"))
}

pub async fn camera_modes(State(state): State<Arc<AppState>>) -> Json<Vec<CameraMode>> {
    Json(state.camera_modes.clone())
}

// ============================================================================
// HID
// ============================================================================

/// Release every held key and button
pub async fn hid_reset(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    state.hid.reset().await?;
    Ok(StatusResponse::json("reset"))
}

// ============================================================================
// MJPEG streaming
// ============================================================================

/// Multipart MJPEG stream for the single viewer.
///
/// The capture session starts with the request and stops when the client
/// goes away or capture ends.
pub async fn mjpeg_stream(State(state): State<Arc<AppState>>) -> Result<Response> {
    let mut subscription = state.mjpeg()?.subscribe().await?;
    let viewer_id = subscription.viewer_id();
    info!("MJPEG client {} connected", viewer_id);

    let body_stream = async_stream::stream! {
        let mut window_start = Instant::now();
        let mut window_frames = 0u32;

        while let Some(frame) = subscription.next_frame().await {
            yield Ok::<bytes::Bytes, std::io::Error>(multipart_part(&frame));

            window_frames += 1;
            let elapsed = window_start.elapsed();
            if elapsed >= Duration::from_secs(1) {
                debug!(
                    "MJPEG client {}: {:.1} fps, {} frames dropped",
                    viewer_id,
                    window_frames as f64 / elapsed.as_secs_f64(),
                    subscription.dropped_frames()
                );
                window_start = Instant::now();
                window_frames = 0;
            }
        }

        info!("MJPEG stream for client {} ended", viewer_id);
        subscription.close().await;
    };

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
            ),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        Body::from_stream(body_stream),
    )
        .into_response())
}
