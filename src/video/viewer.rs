//! Single-viewer arbitration
//!
//! Each streamer serves at most one consumer. A [`ViewerGuard`] holds the
//! slot for the lifetime of a connection. Detaching stops the capture
//! session first and frees the slot afterwards, so a new viewer can never
//! attach to a session that is being torn down.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// A video pipeline that serves a single viewer
#[async_trait]
pub trait VideoSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn viewer_slot(&self) -> &ViewerSlot;

    /// Stop the capture session, if any
    async fn stop(&self);
}

/// Holds the id of the attached viewer, if any
#[derive(Debug, Default)]
pub struct ViewerSlot {
    occupant: Mutex<Option<Uuid>>,
}

impl ViewerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, failing with [`AppError::StreamConflict`] if taken.
    pub fn try_claim(&self) -> Result<Uuid> {
        let mut occupant = self.occupant.lock();
        if occupant.is_some() {
            return Err(AppError::StreamConflict);
        }
        let id = Uuid::new_v4();
        *occupant = Some(id);
        Ok(id)
    }

    /// Release the slot if `id` still holds it
    pub fn release(&self, id: Uuid) {
        let mut occupant = self.occupant.lock();
        if *occupant == Some(id) {
            *occupant = None;
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.lock().is_some()
    }
}

/// Attachment of one viewer to a [`VideoSource`]
pub struct ViewerGuard {
    id: Uuid,
    source: Arc<dyn VideoSource>,
    detached: bool,
}

impl ViewerGuard {
    /// Claim the source's viewer slot.
    pub fn attach(source: Arc<dyn VideoSource>) -> Result<Self> {
        let id = source.viewer_slot().try_claim()?;
        info!("{} viewer {} attached", source.name(), id);
        Ok(Self {
            id,
            source,
            detached: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop the session, then free the slot.
    pub async fn detach(mut self) {
        self.detached = true;
        finish(self.source.clone(), self.id).await;
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let source = self.source.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(finish(source, id));
            }
            Err(_) => {
                debug!("No runtime while dropping viewer {}, releasing slot only", id);
                source.viewer_slot().release(id);
            }
        }
    }
}

async fn finish(source: Arc<dyn VideoSource>, id: Uuid) {
    source.stop().await;
    source.viewer_slot().release(id);
    info!("{} viewer {} detached", source.name(), id);
}
