//! MJPEG capture relay
//!
//! rpicam-vid writes back-to-back JPEG images to stdout with no framing.
//! [`FrameExtractor`] cuts that byte stream into frames on the SOI/EOI
//! markers, and [`MjpegStreamer`] runs the capture process for the single
//! HTTP viewer.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::queue::{frame_queue, FrameReceiver, FrameSender, Offer};
use super::supervisor::{ManagedProcess, ProcessSpec};
use super::viewer::{VideoSource, ViewerGuard, ViewerSlot};
use crate::error::Result;

/// JPEG start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Frames larger than this are assumed corrupt and discarded
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

const READ_CHUNK_SIZE: usize = 4096;
const INITIAL_FRAME_CAPACITY: usize = 64 * 1024;

/// Multipart boundary used by `/stream`
pub const BOUNDARY: &str = "frame";

/// Splits a raw MJPEG byte stream into complete JPEG frames
pub struct FrameExtractor {
    buf: Vec<u8>,
    in_frame: bool,
    /// Where the next EOI search starts within `buf`
    scan_from: usize,
    max_frame_size: usize,
    discarded: u64,
}

impl FrameExtractor {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(INITIAL_FRAME_CAPACITY),
            in_frame: false,
            scan_from: 0,
            max_frame_size,
            discarded: 0,
        }
    }

    /// Number of oversized frames thrown away so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed the next chunk and collect every frame it completes.
    ///
    /// Markers split across chunk boundaries are handled: a trailing `0xFF`
    /// is kept while searching for SOI, and the EOI search backs up one
    /// byte into data already seen.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        self.buf.extend_from_slice(chunk);

        loop {
            if !self.in_frame {
                match find_marker(&self.buf, &SOI) {
                    Some(start) => {
                        self.buf.drain(..start);
                        self.in_frame = true;
                        self.scan_from = SOI.len();
                    }
                    None => {
                        let keep = usize::from(self.buf.last() == Some(&SOI[0]));
                        let cut = self.buf.len() - keep;
                        self.buf.drain(..cut);
                        return frames;
                    }
                }
            }

            match find_marker(&self.buf[self.scan_from..], &EOI) {
                Some(offset) => {
                    let end = self.scan_from + offset + EOI.len();
                    let rest = self.buf.split_off(end);
                    let frame = std::mem::replace(&mut self.buf, rest);
                    frames.push(Bytes::from(frame));
                    self.in_frame = false;
                }
                None if self.buf.len() > self.max_frame_size => {
                    warn!(
                        "Discarding oversized MJPEG frame ({} bytes without EOI)",
                        self.buf.len()
                    );
                    self.discarded += 1;
                    self.buf.clear();
                    self.in_frame = false;
                    return frames;
                }
                None => {
                    self.scan_from = self.buf.len().saturating_sub(1).max(SOI.len());
                    return frames;
                }
            }
        }
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Wrap one JPEG in a multipart part (boundary, headers, body, CRLF)
pub fn multipart_part(frame: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(frame);
    part.put_slice(b"\r\n");
    part.freeze()
}

struct MjpegSession {
    /// Cancelled only by an explicit stop; capture exit leaves it alone
    stop: CancellationToken,
    process: ManagedProcess,
    reader: JoinHandle<()>,
}

impl MjpegSession {
    async fn shutdown(self) {
        self.stop.cancel();
        self.process.stop().await;
        if let Err(e) = self.reader.await {
            warn!("MJPEG reader task failed: {}", e);
        }
    }
}

/// Runs rpicam-vid in MJPEG mode for a single viewer
pub struct MjpegStreamer {
    command: ProcessSpec,
    queue_capacity: usize,
    max_frame_size: usize,
    root: CancellationToken,
    session: Mutex<Option<MjpegSession>>,
    slot: ViewerSlot,
}

impl MjpegStreamer {
    /// `queue_capacity` should be about one second of frames.
    pub fn new(command: ProcessSpec, queue_capacity: usize, root: CancellationToken) -> Self {
        Self {
            command,
            queue_capacity,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            root,
            session: Mutex::new(None),
            slot: ViewerSlot::new(),
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Whether a capture process is currently alive
    pub async fn is_active(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.process.is_running())
    }

    /// Attach as the viewer and start capturing.
    ///
    /// Fails with `StreamConflict` if a viewer is already attached, or
    /// `SubprocessStartFailed` if the capture tool cannot be spawned.
    pub async fn subscribe(self: &Arc<Self>) -> Result<MjpegSubscription> {
        let guard = ViewerGuard::attach(self.clone())?;
        match self.start().await {
            Ok(frames) => Ok(MjpegSubscription { frames, guard }),
            Err(e) => {
                guard.detach().await;
                Err(e)
            }
        }
    }

    async fn start(&self) -> Result<FrameReceiver> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.shutdown().await;
        }

        let stop = self.root.child_token();
        let (process, stdout) = ManagedProcess::spawn_piped(&self.command, &stop)?;
        let (tx, rx) = frame_queue(self.queue_capacity);
        let reader = tokio::spawn(read_frames(
            stdout,
            tx,
            stop.clone(),
            self.max_frame_size,
        ));

        info!("MJPEG capture started");
        *session = Some(MjpegSession {
            stop,
            process,
            reader,
        });
        Ok(rx)
    }
}

#[async_trait]
impl VideoSource for MjpegStreamer {
    fn name(&self) -> &'static str {
        "mjpeg"
    }

    fn viewer_slot(&self) -> &ViewerSlot {
        &self.slot
    }

    async fn stop(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.shutdown().await;
            info!("MJPEG capture stopped");
        }
    }
}

/// Runs until capture output ends or `stop` is cancelled. Dropping `frames`
/// on return ends the viewer's feed once the queue has drained.
async fn read_frames(
    mut stdout: ChildStdout,
    frames: FrameSender,
    stop: CancellationToken,
    max_frame_size: usize,
) {
    let mut extractor = FrameExtractor::new(max_frame_size);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = tokio::select! {
            _ = stop.cancelled() => break,
            read = stdout.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!("MJPEG capture output closed");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to read MJPEG capture output: {}", e);
                    break;
                }
            },
        };

        for frame in extractor.push(&chunk[..n]) {
            match frames.offer(frame) {
                Offer::Queued => {}
                Offer::Dropped => trace!("Frame queue full, dropped frame ({} total)", frames.dropped()),
                Offer::Closed => {
                    debug!("MJPEG viewer gone, stopping reader");
                    stop.cancel();
                    return;
                }
            }
        }
    }

    stop.cancel();
}

/// Frame feed for the attached viewer
pub struct MjpegSubscription {
    frames: FrameReceiver,
    guard: ViewerGuard,
}

impl MjpegSubscription {
    /// Next frame in capture order, or `None` once the session has ended
    /// and every queued frame has been delivered
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    pub fn dropped_frames(&self) -> u64 {
        self.frames.dropped()
    }

    pub fn viewer_id(&self) -> uuid::Uuid {
        self.guard.id()
    }

    /// Stop the capture session and free the viewer slot
    pub async fn close(self) {
        self.guard.detach().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::time::Duration;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut frame = SOI.to_vec();
        frame.extend_from_slice(body);
        frame.extend_from_slice(&EOI);
        frame
    }

    fn stream_of_two() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let first = jpeg(b"\x00\x10JFIF\x00\xFF\x00payload-one");
        let second = jpeg(b"\x00\x10JFIF\x00payload-two\xFF");
        let mut stream = b"garbage\xFF\x00noise".to_vec();
        stream.extend_from_slice(&first);
        stream.extend_from_slice(&second);
        (stream, first, second)
    }

    #[test]
    fn test_single_chunk() {
        let (stream, first, second) = stream_of_two();
        let mut extractor = FrameExtractor::new(DEFAULT_MAX_FRAME_SIZE);
        let frames = extractor.push(&stream);
        assert_eq!(frames, vec![Bytes::from(first), Bytes::from(second)]);
    }

    #[test]
    fn test_every_split_position() {
        let (stream, first, second) = stream_of_two();
        for split in 0..=stream.len() {
            let mut extractor = FrameExtractor::new(DEFAULT_MAX_FRAME_SIZE);
            let mut frames = extractor.push(&stream[..split]);
            frames.extend(extractor.push(&stream[split..]));
            assert_eq!(
                frames,
                vec![Bytes::from(first.clone()), Bytes::from(second.clone())],
                "split at {}",
                split
            );
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let (stream, first, second) = stream_of_two();
        let mut extractor = FrameExtractor::new(DEFAULT_MAX_FRAME_SIZE);
        let frames: Vec<Bytes> = stream.iter().flat_map(|b| extractor.push(&[*b])).collect();
        assert_eq!(frames, vec![Bytes::from(first), Bytes::from(second)]);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut extractor = FrameExtractor::new(64);
        let mut oversized = SOI.to_vec();
        oversized.extend(std::iter::repeat(0x11).take(100));

        assert!(extractor.push(&oversized).is_empty());
        assert_eq!(extractor.discarded(), 1);

        // Tail of the broken frame, then a good one
        let good = jpeg(b"ok");
        let mut next = vec![0x22; 10];
        next.extend_from_slice(&EOI);
        next.extend_from_slice(&good);
        assert_eq!(extractor.push(&next), vec![Bytes::from(good)]);
    }

    #[test]
    fn test_eoi_before_soi_ignored() {
        let mut extractor = FrameExtractor::new(DEFAULT_MAX_FRAME_SIZE);
        let mut data = EOI.to_vec();
        data.extend_from_slice(&jpeg(b"x"));
        assert_eq!(extractor.push(&data), vec![Bytes::from(jpeg(b"x"))]);
    }

    #[test]
    fn test_multipart_part() {
        let part = multipart_part(b"\xFF\xD8\xFF\xD9");
        let mut expected =
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n".to_vec();
        expected.extend_from_slice(b"\xFF\xD8\xFF\xD9\r\n");
        assert_eq!(&part[..], &expected[..]);
    }

    fn looping_camera() -> ProcessSpec {
        ProcessSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                r"while :; do printf '\377\330AB\377\331'; sleep 0.05; done".to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_second_viewer_rejected() {
        let root = CancellationToken::new();
        let streamer = Arc::new(MjpegStreamer::new(looping_camera(), 30, root.clone()));
        let expected: &[u8] = b"\xFF\xD8AB\xFF\xD9";

        let mut first = streamer.subscribe().await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), first.next_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&frame[..], expected);

        assert!(matches!(
            streamer.subscribe().await,
            Err(AppError::StreamConflict)
        ));

        let frame = tokio::time::timeout(Duration::from_secs(5), first.next_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&frame[..], expected);
        assert!(streamer.is_active().await);

        first.close().await;
        assert!(!streamer.is_active().await);

        let again = streamer.subscribe().await.unwrap();
        again.close().await;
        root.cancel();
    }

    #[tokio::test]
    async fn test_process_exit_ends_subscription() {
        let root = CancellationToken::new();
        let command = ProcessSpec::new(
            "sh",
            vec!["-c".to_string(), r"printf '\377\330Z\377\331'".to_string()],
        );
        let streamer = Arc::new(MjpegStreamer::new(command, 30, root));

        let mut sub = streamer.subscribe().await.unwrap();
        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            while sub.next_frame().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok());
        sub.close().await;
    }

    #[tokio::test]
    async fn test_queued_frames_survive_process_exit() {
        let root = CancellationToken::new();
        let command = ProcessSpec::new(
            "sh",
            vec![
                "-c".to_string(),
                r"printf '\377\3301\377\331\377\3302\377\331\377\3303\377\331'".to_string(),
            ],
        );
        let streamer = Arc::new(MjpegStreamer::new(command, 30, root));

        for _ in 0..10 {
            let mut sub = streamer.subscribe().await.unwrap();
            // Let the tool exit before anything is consumed
            tokio::time::sleep(Duration::from_millis(200)).await;

            let mut frames = Vec::new();
            tokio::time::timeout(Duration::from_secs(5), async {
                while let Some(frame) = sub.next_frame().await {
                    frames.push(frame);
                }
            })
            .await
            .unwrap();
            assert_eq!(
                frames,
                vec![
                    Bytes::from_static(b"\xFF\xD81\xFF\xD9"),
                    Bytes::from_static(b"\xFF\xD82\xFF\xD9"),
                    Bytes::from_static(b"\xFF\xD83\xFF\xD9"),
                ]
            );
            sub.close().await;
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_frees_slot() {
        let root = CancellationToken::new();
        let streamer = Arc::new(MjpegStreamer::new(
            ProcessSpec::new("/nonexistent/rpicam-vid", vec![]),
            30,
            root,
        ));

        assert!(matches!(
            streamer.subscribe().await,
            Err(AppError::SubprocessStartFailed { .. })
        ));
        assert!(!streamer.viewer_slot().is_occupied());
    }
}
