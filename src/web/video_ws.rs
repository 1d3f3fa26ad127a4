//! H264 video WebSocket
//!
//! `/video-stream?width=&height=&framerate=` relays the raw elementary
//! stream as binary messages to the single attached viewer.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::state::AppState;
use crate::video::{CaptureParams, H264Streamer, ViewerGuard};

/// Raw query values; anything that is not a positive integer is ignored
#[derive(Debug, Default, Deserialize)]
pub struct VideoStreamQuery {
    pub width: Option<String>,
    pub height: Option<String>,
    pub framerate: Option<String>,
}

impl VideoStreamQuery {
    fn apply(&self, defaults: CaptureParams) -> CaptureParams {
        fn positive(value: &Option<String>) -> Option<u32> {
            value.as_deref().and_then(|v| v.trim().parse().ok())
        }
        defaults.with_overrides(
            positive(&self.width),
            positive(&self.height),
            positive(&self.framerate),
        )
    }
}

/// Claims the viewer slot before upgrading, so a second viewer gets a plain 409.
pub async fn video_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoStreamQuery>,
) -> Result<Response> {
    let streamer = state.h264()?.clone();
    let guard = ViewerGuard::attach(streamer.clone())?;
    let params = query.apply(streamer.default_params());

    Ok(ws.on_upgrade(move |socket| handle_video_socket(socket, state, streamer, guard, params)))
}

async fn handle_video_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    streamer: Arc<H264Streamer>,
    guard: ViewerGuard,
    params: CaptureParams,
) {
    let (mut sender, mut receiver) = socket.split();
    let viewer_id = guard.id();

    let mut feed = match streamer.open(params).await {
        Ok(feed) => feed,
        Err(e) => {
            warn!("Failed to start H264 capture for viewer {}: {}", viewer_id, e);
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "Failed to start video capture".into(),
                })))
                .await;
            guard.detach().await;
            return;
        }
    };

    info!(
        "H264 viewer {} streaming {}x{} @ {} fps",
        viewer_id, params.width, params.height, params.framerate
    );

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            chunk = feed.next_chunk() => match chunk {
                Some(chunk) => {
                    if let Err(e) = sender.send(Message::Binary(Vec::from(chunk))).await {
                        debug!("H264 viewer {} send failed: {}", viewer_id, e);
                        break;
                    }
                }
                None => {
                    info!("H264 capture ended, closing viewer {}", viewer_id);
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sender.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("H264 viewer {} disconnected", viewer_id);
                    break;
                }
                Some(Err(e)) => {
                    debug!("H264 viewer {} socket error: {}", viewer_id, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    guard.detach().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(width: Option<&str>, height: Option<&str>, framerate: Option<&str>) -> VideoStreamQuery {
        VideoStreamQuery {
            width: width.map(String::from),
            height: height.map(String::from),
            framerate: framerate.map(String::from),
        }
    }

    #[test]
    fn test_query_overrides() {
        let defaults = CaptureParams::new(1280, 720, 30);
        assert_eq!(
            query(Some("640"), Some("480"), Some("15")).apply(defaults),
            CaptureParams::new(640, 480, 15)
        );
    }

    #[test]
    fn test_query_ignores_invalid_values() {
        let defaults = CaptureParams::new(1280, 720, 30);
        assert_eq!(
            query(Some("wide"), Some("-1"), Some("0")).apply(defaults),
            defaults
        );
        assert_eq!(query(None, None, None).apply(defaults), defaults);
    }
}
