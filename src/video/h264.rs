//! H264 capture relay
//!
//! Chunks of rpicam-vid's raw H264 output are passed through untouched to
//! the single WebSocket viewer. The browser-side decoder finds NAL
//! boundaries itself. Chunks are never dropped because a gap corrupts the
//! stream, so a slow viewer backpressures the capture pipe instead.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capture::{h264_command, CaptureParams};
use super::supervisor::{ManagedProcess, ProcessSpec};
use super::viewer::{VideoSource, ViewerSlot};
use crate::error::Result;

const READ_CHUNK_SIZE: usize = 32 * 1024;
const CHUNK_CHANNEL_CAPACITY: usize = 8;

struct H264Session {
    params: CaptureParams,
    /// Cancelled only by an explicit stop; capture exit leaves it alone
    stop: CancellationToken,
    process: ManagedProcess,
    reader: JoinHandle<()>,
}

impl H264Session {
    async fn shutdown(self) {
        self.stop.cancel();
        self.process.stop().await;
        if let Err(e) = self.reader.await {
            warn!("H264 reader task failed: {}", e);
        }
    }
}

/// Runs rpicam-vid in H264 mode for a single viewer
pub struct H264Streamer {
    capture: ProcessSpec,
    defaults: CaptureParams,
    root: CancellationToken,
    session: Mutex<Option<H264Session>>,
    slot: ViewerSlot,
}

impl H264Streamer {
    /// `capture` is the capture tool; mode and geometry flags are appended per session.
    pub fn new(capture: ProcessSpec, defaults: CaptureParams, root: CancellationToken) -> Self {
        Self {
            capture,
            defaults,
            root,
            session: Mutex::new(None),
            slot: ViewerSlot::new(),
        }
    }

    /// Capture parameters used when a viewer requests none
    pub fn default_params(&self) -> CaptureParams {
        self.defaults
    }

    /// Parameters of the running session, if one is alive
    pub async fn current_params(&self) -> Option<CaptureParams> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|s| s.process.is_running())
            .map(|s| s.params)
    }

    /// Start capture at `params` and return its chunk feed.
    ///
    /// Any previous session is stopped first, under the session lock, so
    /// the stream always begins at the start of a fresh elementary stream.
    pub async fn open(&self, params: CaptureParams) -> Result<H264Feed> {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            info!(
                "Restarting H264 capture: {:?} -> {:?}",
                previous.params, params
            );
            previous.shutdown().await;
        }

        let spec = h264_command(&self.capture, &params);
        let stop = self.root.child_token();
        let (process, stdout) = ManagedProcess::spawn_piped(&spec, &stop)?;
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_chunks(stdout, tx, stop.clone()));

        info!(
            "H264 capture started: {}x{} @ {} fps",
            params.width, params.height, params.framerate
        );
        *session = Some(H264Session {
            params,
            stop,
            process,
            reader,
        });
        Ok(H264Feed { chunks: rx })
    }
}

#[async_trait]
impl VideoSource for H264Streamer {
    fn name(&self) -> &'static str {
        "h264"
    }

    fn viewer_slot(&self) -> &ViewerSlot {
        &self.slot
    }

    async fn stop(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.shutdown().await;
            info!("H264 capture stopped");
        }
    }
}

/// Runs until capture output ends or `stop` is cancelled. Dropping `chunks`
/// on return ends the viewer's feed once the channel has drained.
async fn read_chunks(mut stdout: ChildStdout, chunks: mpsc::Sender<Bytes>, stop: CancellationToken) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = tokio::select! {
            _ = stop.cancelled() => break,
            read = stdout.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("H264 capture output closed");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to read H264 capture output: {}", e);
                    break;
                }
            },
        };

        let chunk = Bytes::copy_from_slice(&buf[..n]);
        tokio::select! {
            _ = stop.cancelled() => break,
            sent = chunks.send(chunk) => {
                if sent.is_err() {
                    debug!("H264 viewer gone, stopping reader");
                    break;
                }
            }
        }
    }

    stop.cancel();
}

/// Ordered chunk feed for the attached viewer
pub struct H264Feed {
    chunks: mpsc::Receiver<Bytes>,
}

impl H264Feed {
    /// Next chunk in capture order, or `None` once the session has ended
    /// and every relayed chunk has been delivered
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.chunks.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Fake camera: ignores the appended rpicam flags and emits a recognisable byte stream
    fn fake_camera() -> ProcessSpec {
        ProcessSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                r"while :; do printf '\001\002\003\004h264'; sleep 0.05; done".to_string(),
                "fake-rpicam".to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_relays_bytes_in_order() {
        let root = CancellationToken::new();
        let streamer = H264Streamer::new(fake_camera(), CaptureParams::new(0, 0, 30), root);

        let mut feed = streamer.open(streamer.default_params()).await.unwrap();
        let mut received = Vec::new();
        while received.len() < 16 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), feed.next_chunk())
                .await
                .unwrap()
                .unwrap();
            received.extend_from_slice(&chunk);
        }
        assert!(received.starts_with(b"\x01\x02\x03\x04h264\x01\x02\x03\x04h264"));

        streamer.stop().await;
        assert!(streamer.current_params().await.is_none());
    }

    #[tokio::test]
    async fn test_reconfigure_restarts_session() {
        let root = CancellationToken::new();
        let streamer = Arc::new(H264Streamer::new(
            fake_camera(),
            CaptureParams::new(1280, 720, 30),
            root,
        ));

        let mut first = streamer.open(CaptureParams::new(1280, 720, 30)).await.unwrap();

        let _second = streamer.open(CaptureParams::new(640, 480, 15)).await.unwrap();
        // The old feed drains and ends
        tokio::time::timeout(Duration::from_secs(5), async {
            while first.next_chunk().await.is_some() {}
        })
        .await
        .unwrap();
        assert_eq!(
            streamer.current_params().await,
            Some(CaptureParams::new(640, 480, 15))
        );

        streamer.stop().await;
    }

    #[tokio::test]
    async fn test_tail_delivered_after_process_exit() {
        let root = CancellationToken::new();
        // More output than the chunk channel holds, then exit
        let capture = ProcessSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                r"i=0; while [ $i -lt 64 ]; do head -c 4096 /dev/zero; i=$((i+1)); done; printf END"
                    .to_string(),
                "fake-rpicam".to_string(),
            ],
        );
        let streamer = H264Streamer::new(capture, CaptureParams::new(0, 0, 30), root);

        let mut feed = streamer.open(streamer.default_params()).await.unwrap();
        // Slow viewer: the tool exits while chunks are still queued
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(chunk) = feed.next_chunk().await {
                received.extend_from_slice(&chunk);
            }
        })
        .await
        .unwrap();
        assert_eq!(received.len(), 64 * 4096 + 3);
        assert!(received.ends_with(b"END"));

        streamer.stop().await;
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let root = CancellationToken::new();
        let streamer = H264Streamer::new(
            ProcessSpec::new("/nonexistent/rpicam-vid", vec![]),
            CaptureParams::new(0, 0, 30),
            root,
        );
        assert!(streamer.open(streamer.default_params()).await.is_err());
        assert!(streamer.current_params().await.is_none());
    }
}
