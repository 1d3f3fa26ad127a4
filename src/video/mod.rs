//! Video capture and streaming module
//!
//! Three mutually exclusive pipelines are supported: an external ustreamer
//! process serving MJPEG itself, rpicam-vid MJPEG re-served over HTTP, and
//! rpicam-vid H264 relayed over a WebSocket.

pub mod camera;
pub mod capture;
pub mod h264;
pub mod mjpeg;
pub mod queue;
pub mod supervisor;
pub mod ustreamer;
pub mod viewer;

pub use camera::{detect_camera_modes, CameraMode, DEFAULT_MODES};
pub use capture::{h264_command, mjpeg_command, CaptureParams};
pub use h264::{H264Feed, H264Streamer};
pub use mjpeg::{MjpegStreamer, MjpegSubscription};
pub use supervisor::{ManagedProcess, ProcessSpec};
pub use ustreamer::UstreamerService;
pub use viewer::{VideoSource, ViewerGuard, ViewerSlot};
