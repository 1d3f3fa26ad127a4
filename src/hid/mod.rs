//! HID (Human Interface Device) control module
//!
//! Emulates a keyboard and mouse through a Linux USB gadget HID function.
//!
//! Architecture:
//! ```text
//! Browser --> control WebSocket --> InputEvent --> InputTranslator --> report codec
//!                                                        |
//!                                                   ReportSink
//!                                                        |
//!                                                  /dev/hidgN (HidDevice)
//! ```

pub mod consumer;
pub mod device;
pub mod keymap;
pub mod report;
pub mod translator;
pub mod types;

pub use device::{HidDevice, ReportSink, DEFAULT_REPORT_DELAY};
pub use translator::InputTranslator;
pub use types::{InputEvent, MouseButton, SystemCommand};

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;

/// Owns the single translator and serializes access to it.
///
/// Reports leave in the order events arrive because every event is handled
/// while holding the translator lock.
pub struct HidController {
    translator: Mutex<InputTranslator>,
}

impl HidController {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            translator: Mutex::new(InputTranslator::new(sink)),
        }
    }

    /// Create a controller writing to a gadget device.
    ///
    /// A missing or non-character device only produces a warning; the control
    /// channel keeps working and writes fail individually until the gadget shows up.
    pub fn with_device(device: HidDevice) -> Self {
        match device.check_device() {
            Ok(()) => info!("HID device ready: {}", device.path().display()),
            Err(e) => warn!("{} (input will be dropped until it appears)", e),
        }
        Self::new(Arc::new(device))
    }

    /// Decode and apply one control message
    pub async fn handle_message(&self, text: &str) -> Result<()> {
        self.translator.lock().await.handle_message(text).await
    }

    /// Release every held key and button
    pub async fn reset(&self) -> Result<()> {
        self.translator.lock().await.release_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::translator::tests::RecordingSink;
    use super::*;
    use report::{KEYBOARD_RELEASE, MOUSE_NEUTRAL};

    #[tokio::test]
    async fn test_controller_preserves_order() {
        let sink = Arc::new(RecordingSink::default());
        let hid = HidController::new(sink.clone());

        hid.handle_message(r#"{"type":"mousedown","button":"left"}"#)
            .await
            .unwrap();
        hid.handle_message(r#"{"type":"mousemove","x":3,"y":4}"#)
            .await
            .unwrap();
        hid.reset().await.unwrap();

        assert_eq!(
            sink.take(),
            vec![
                vec![0x04, 0x01, 0, 0, 0],
                vec![0x04, 0x01, 3, 4, 0],
                KEYBOARD_RELEASE.to_vec(),
                MOUSE_NEUTRAL.to_vec(),
            ]
        );
    }
}
