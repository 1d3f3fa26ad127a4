use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Main application configuration
///
/// Built once at startup from command line flags; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// HID gadget settings
    pub hid: HidConfig,
    /// Video pipeline settings
    pub video: VideoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            hid: HidConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP listen address
    pub bind_address: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8876)),
        }
    }
}

/// HID configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HidConfig {
    /// Gadget character device
    pub device: PathBuf,
    /// Delay after every report write, in milliseconds
    pub report_delay_ms: u64,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/hidg0"),
            report_delay_ms: 10,
        }
    }
}

/// Which video pipeline the daemon runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    /// External ustreamer serves MJPEG on its own port
    #[default]
    Ustreamer,
    /// rpicam-vid MJPEG relayed as multipart HTTP on `/stream`
    Mjpeg,
    /// rpicam-vid H264 relayed over WebSocket on `/video-stream`
    H264,
}

impl std::fmt::Display for VideoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoMode::Ustreamer => write!(f, "ustreamer"),
            VideoMode::Mjpeg => write!(f, "mjpeg"),
            VideoMode::H264 => write!(f, "h264"),
        }
    }
}

/// Video pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub mode: VideoMode,
    /// V4L2 capture device handed to ustreamer
    pub device: PathBuf,
    /// Camera capture tool
    pub capture_bin: String,
    /// Capture width (0 = sensor default)
    pub width: u32,
    /// Capture height (0 = sensor default)
    pub height: u32,
    pub framerate: u32,
    /// JPEG quality for rpicam-vid MJPEG output
    pub mjpeg_quality: u32,
    pub ustreamer: UstreamerConfig,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            mode: VideoMode::default(),
            device: PathBuf::from("/dev/video0"),
            capture_bin: "rpicam-vid".to_string(),
            width: 1280,
            height: 720,
            framerate: 30,
            mjpeg_quality: 80,
            ustreamer: UstreamerConfig::default(),
        }
    }
}

/// ustreamer process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UstreamerConfig {
    pub bin: String,
    /// Address ustreamer listens on
    pub address: SocketAddr,
}

impl Default for UstreamerConfig {
    fn default() -> Self {
        Self {
            bin: "ustreamer".to_string(),
            address: SocketAddr::from(([0, 0, 0, 0], 8877)),
        }
    }
}

/// Runtime-adjustable ustreamer encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// JPEG quality (1-100)
    pub quality: u32,
    /// Frame rate cap (0 = uncapped, max 60); absent means uncapped
    #[serde(default)]
    pub desired_fps: u32,
    /// Capture buffer count (2-10)
    pub buffers: u32,
    /// Set TCP_NODELAY on client sockets; absent means off
    #[serde(default)]
    pub tcp_nodelay: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            desired_fps: 30,
            buffers: 5,
            tcp_nodelay: false,
        }
    }
}

impl VideoSettings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(AppError::BadRequest(
                "Quality must be between 1 and 100".to_string(),
            ));
        }
        if !(2..=10).contains(&self.buffers) {
            return Err(AppError::BadRequest(
                "Buffers must be between 2 and 10".to_string(),
            ));
        }
        if self.desired_fps > 60 {
            return Err(AppError::BadRequest(
                "Desired FPS must be between 0 and 60".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.web.bind_address.port(), 8876);
        assert_eq!(config.hid.device, PathBuf::from("/dev/hidg0"));
        assert_eq!(config.video.mode, VideoMode::Ustreamer);
        assert_eq!(config.video.ustreamer.address.port(), 8877);
        VideoSettings::default().validate().unwrap();
    }

    #[test]
    fn test_settings_validation_bounds() {
        let base = VideoSettings::default();

        for quality in [1, 100] {
            VideoSettings { quality, ..base }.validate().unwrap();
        }
        for quality in [0, 101] {
            assert!(VideoSettings { quality, ..base }.validate().is_err());
        }
        for buffers in [2, 10] {
            VideoSettings { buffers, ..base }.validate().unwrap();
        }
        for buffers in [1, 11] {
            assert!(VideoSettings { buffers, ..base }.validate().is_err());
        }
        for desired_fps in [0, 60] {
            VideoSettings { desired_fps, ..base }.validate().unwrap();
        }
        assert!(VideoSettings {
            desired_fps: 61,
            ..base
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_settings_json_field_names() {
        let json = serde_json::to_value(VideoSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"quality": 80, "desiredFps": 30, "buffers": 5, "tcpNodelay": false})
        );
    }

    #[test]
    fn test_settings_optional_fields() {
        let settings: VideoSettings =
            serde_json::from_str(r#"{"quality":80,"desiredFps":30,"buffers":5}"#).unwrap();
        assert!(!settings.tcp_nodelay);
        settings.validate().unwrap();

        let settings: VideoSettings =
            serde_json::from_str(r#"{"quality":70,"buffers":4}"#).unwrap();
        assert_eq!(settings.desired_fps, 0);
        assert!(!settings.tcp_nodelay);

        assert!(serde_json::from_str::<VideoSettings>(r#"{"buffers":4}"#).is_err());
    }
}
