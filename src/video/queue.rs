//! Bounded lossy frame queue
//!
//! The producer (capture reader) never waits: when the queue is full the
//! incoming frame is dropped and frames already queued stay in order.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Create a queue holding at most `capacity` frames (minimum 1).
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        FrameSender {
            tx,
            dropped: dropped.clone(),
        },
        FrameReceiver { rx, dropped },
    )
}

/// Producer half
pub struct FrameSender {
    tx: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

/// Outcome of offering a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Queue full, frame discarded
    Dropped,
    /// Receiver is gone
    Closed,
}

impl FrameSender {
    pub fn offer(&self, frame: Bytes) -> Offer {
        match self.tx.try_send(frame) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Offer::Dropped
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half
pub struct FrameReceiver {
    rx: mpsc::Receiver<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl FrameReceiver {
    /// Wait for the next frame; `None` once the producer is gone and the queue is drained
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Frames discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
