//! Keyboard and mouse control channel
//!
//! Text frames carry one JSON input event each. Events are applied in
//! arrival order; a failing event is logged and the next one is processed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// WebSocket upgrade handler for `/ws`
pub async fn control_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_control_socket(socket, state))
}

/// Throttle key for an event failure
fn error_key(e: &AppError) -> &'static str {
    match e {
        AppError::DecodeFailed(_) => "decode_failed",
        AppError::UnknownEventType => "unknown_event",
        AppError::DeviceUnavailable { .. } => "hid_unavailable",
        AppError::WriteFailed { .. } => "hid_write_failed",
        _ => "hid_error",
    }
}

async fn handle_control_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let log_throttler = LogThrottler::with_secs(5);

    info!("Control WebSocket connected");

    loop {
        let msg = tokio::select! {
            _ = state.shutdown.cancelled() => {
                debug!("Shutdown requested, closing control WebSocket");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            msg = receiver.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                if let Err(e) = state.hid.handle_message(&text).await {
                    warn_throttled!(log_throttler, error_key(&e), "Input event failed: {}", e);
                }
            }
            Some(Ok(Message::Binary(data))) => {
                warn_throttled!(
                    log_throttler,
                    "binary_message",
                    "Ignoring binary control message ({} bytes)",
                    data.len()
                );
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = sender.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Control WebSocket closed by client");
                break;
            }
            Some(Err(e)) => {
                warn!("Control WebSocket error: {}", e);
                break;
            }
            Some(Ok(Message::Pong(_))) => {}
        }
    }

    // Release any held keys/buttons
    if let Err(e) = state.hid.reset().await {
        warn!("Failed to reset HID on control disconnect: {}", e);
    }

    info!("Control WebSocket ended");
}
