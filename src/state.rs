use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, SettingsStore, VideoMode};
use crate::error::{AppError, Result};
use crate::hid::HidController;
use crate::video::{CameraMode, H264Streamer, MjpegStreamer, UstreamerService};

/// Application-wide state shared across handlers
///
/// Exactly one of the video pipelines is present, chosen by
/// `config.video.mode`. Endpoints of the other pipelines answer 503.
pub struct AppState {
    /// Startup configuration
    pub config: AppConfig,
    /// HID controller
    pub hid: HidController,
    /// ustreamer encoder settings
    pub settings: SettingsStore,
    /// Resolutions reported by the camera at startup
    pub camera_modes: Vec<CameraMode>,
    pub mjpeg: Option<Arc<MjpegStreamer>>,
    pub h264: Option<Arc<H264Streamer>>,
    pub ustreamer: Option<Arc<UstreamerService>>,
    /// Root token; cancelled on SIGINT/SIGTERM
    pub shutdown: CancellationToken,
}

/// The pipeline built for the configured mode
pub enum VideoPipeline {
    Ustreamer(Arc<UstreamerService>),
    Mjpeg(Arc<MjpegStreamer>),
    H264(Arc<H264Streamer>),
}

impl AppState {
    pub fn new(
        config: AppConfig,
        hid: HidController,
        settings: SettingsStore,
        camera_modes: Vec<CameraMode>,
        pipeline: VideoPipeline,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (mut mjpeg, mut h264, mut ustreamer) = (None, None, None);
        match pipeline {
            VideoPipeline::Ustreamer(service) => ustreamer = Some(service),
            VideoPipeline::Mjpeg(streamer) => mjpeg = Some(streamer),
            VideoPipeline::H264(streamer) => h264 = Some(streamer),
        }

        Arc::new(Self {
            config,
            hid,
            settings,
            camera_modes,
            mjpeg,
            h264,
            ustreamer,
            shutdown,
        })
    }

    fn inactive(&self, wanted: VideoMode) -> AppError {
        AppError::ServiceUnavailable(format!(
            "{} video is not enabled (running in {} mode)",
            wanted, self.config.video.mode
        ))
    }

    pub fn mjpeg(&self) -> Result<&Arc<MjpegStreamer>> {
        self.mjpeg.as_ref().ok_or_else(|| self.inactive(VideoMode::Mjpeg))
    }

    pub fn h264(&self) -> Result<&Arc<H264Streamer>> {
        self.h264.as_ref().ok_or_else(|| self.inactive(VideoMode::H264))
    }

    pub fn ustreamer(&self) -> Result<&Arc<UstreamerService>> {
        self.ustreamer
            .as_ref()
            .ok_or_else(|| self.inactive(VideoMode::Ustreamer))
    }
}
