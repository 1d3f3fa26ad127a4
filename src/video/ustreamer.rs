//! Managed ustreamer process
//!
//! In ustreamer mode the daemon does not touch video bytes at all: ustreamer
//! captures from the V4L2 device and serves MJPEG on its own port. The
//! daemon only starts and stops it with the current [`VideoSettings`].

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::supervisor::{ManagedProcess, ProcessSpec};
use crate::config::{SettingsStore, VideoSettings};
use crate::error::Result;

/// Frame size requested from the HDMI capture chip
const RESOLUTION: &str = "1280x720";
/// Pixel format produced by the capture chip
const FORMAT: &str = "UYVY";
/// Identical frames dropped before ustreamer resends one
const DROP_SAME_FRAMES: u32 = 30;

/// Build the ustreamer command line for the given settings.
pub fn ustreamer_command(
    program: &str,
    device: &str,
    address: SocketAddr,
    settings: &VideoSettings,
) -> ProcessSpec {
    let mut args: Vec<String> = vec![
        "--persistent".into(),
        "--device".into(),
        device.into(),
        "--dv-timings".into(),
        "--host".into(),
        address.ip().to_string(),
        "--port".into(),
        address.port().to_string(),
        "--resolution".into(),
        RESOLUTION.into(),
        "--format".into(),
        FORMAT.into(),
        "--quality".into(),
        settings.quality.to_string(),
        "--buffers".into(),
        settings.buffers.to_string(),
        "--drop-same-frames".into(),
        DROP_SAME_FRAMES.to_string(),
        "--slowdown".into(),
    ];
    if settings.desired_fps > 0 {
        args.push("--desired-fps".into());
        args.push(settings.desired_fps.to_string());
    }
    if settings.tcp_nodelay {
        args.push("--tcp-nodelay".into());
    }
    ProcessSpec::new(program, args)
}

/// Starts and stops ustreamer on demand
pub struct UstreamerService {
    program: String,
    device: PathBuf,
    address: SocketAddr,
    settings: SettingsStore,
    root: CancellationToken,
    process: Mutex<Option<ManagedProcess>>,
}

impl UstreamerService {
    pub fn new(
        program: impl Into<String>,
        device: impl Into<PathBuf>,
        address: SocketAddr,
        settings: SettingsStore,
        root: CancellationToken,
    ) -> Self {
        Self {
            program: program.into(),
            device: device.into(),
            address,
            settings,
            root,
            process: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.process
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| p.is_running())
    }

    /// Start ustreamer with the current settings. No-op while it is running.
    pub async fn start(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if process.as_ref().is_some_and(|p| p.is_running()) {
            debug!("ustreamer already running");
            return Ok(());
        }
        if let Some(dead) = process.take() {
            dead.stop().await;
        }

        let spec = ustreamer_command(
            &self.program,
            &self.device.display().to_string(),
            self.address,
            &self.settings.get(),
        );
        let started = ManagedProcess::spawn_logged(&spec, &self.root)?;
        info!("ustreamer started with PID {:?}", started.pid());
        *process = Some(started);
        Ok(())
    }

    /// Kill ustreamer and wait for it to exit. No-op when stopped.
    pub async fn stop(&self) {
        if let Some(running) = self.process.lock().await.take() {
            running.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_defaults() {
        let spec = ustreamer_command(
            "ustreamer",
            "/dev/video0",
            "0.0.0.0:8877".parse().unwrap(),
            &VideoSettings::default(),
        );
        assert_eq!(
            spec.command_line(),
            "ustreamer --persistent --device /dev/video0 --dv-timings --host 0.0.0.0 --port 8877 \
             --resolution 1280x720 --format UYVY --quality 80 --buffers 5 --drop-same-frames 30 \
             --slowdown --desired-fps 30"
        );
    }

    #[test]
    fn test_command_optional_flags() {
        let settings = VideoSettings {
            quality: 60,
            desired_fps: 0,
            buffers: 3,
            tcp_nodelay: true,
        };
        let spec = ustreamer_command("ustreamer", "/dev/video0", "127.0.0.1:9000".parse().unwrap(), &settings);
        assert!(!spec.args.contains(&"--desired-fps".to_string()));
        assert_eq!(spec.args.last().map(String::as_str), Some("--tcp-nodelay"));
        assert!(spec.command_line().contains("--host 127.0.0.1 --port 9000"));
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let root = CancellationToken::new();
        let service = UstreamerService::new(
            "sh",
            "/dev/video0",
            "127.0.0.1:8877".parse().unwrap(),
            SettingsStore::default(),
            root,
        );
        // sh exits on the unknown flags; start only has to spawn it
        service.start().await.unwrap();
        service.start().await.unwrap();
        service.stop().await;
        assert!(!service.is_running().await);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_start_failure() {
        let root = CancellationToken::new();
        let service = UstreamerService::new(
            "/nonexistent/ustreamer",
            "/dev/video0",
            "127.0.0.1:8877".parse().unwrap(),
            SettingsStore::default(),
            root,
        );
        assert!(service.start().await.is_err());
        assert!(!service.is_running().await);
    }
}
