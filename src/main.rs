use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kindavm::config::{AppConfig, SettingsStore, VideoMode};
use kindavm::hid::{HidController, HidDevice};
use kindavm::state::{AppState, VideoPipeline};
use kindavm::video::{
    detect_camera_modes, mjpeg_command, CaptureParams, H264Streamer, MjpegStreamer, ProcessSpec,
    UstreamerService, VideoSource, DEFAULT_MODES,
};
use kindavm::web;

/// How long in-flight requests get after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// kindavm command line arguments
#[derive(Parser, Debug)]
#[command(name = "kindavm")]
#[command(version, about = "Software KVM over a USB HID gadget", long_about = None)]
struct CliArgs {
    /// HTTP listen address
    #[arg(long, env = "KINDAVM_ADDR", default_value = "0.0.0.0:8876")]
    addr: SocketAddr,

    /// HID gadget device path
    #[arg(long, env = "KINDAVM_HID", default_value = "/dev/hidg0")]
    hid: PathBuf,

    /// Delay after each HID report, in milliseconds
    #[arg(long, env = "KINDAVM_REPORT_DELAY_MS", default_value_t = 10)]
    report_delay_ms: u64,

    /// Video pipeline to run
    #[arg(long, env = "KINDAVM_VIDEO_MODE", value_enum, default_value_t = CliVideoMode::Ustreamer)]
    video_mode: CliVideoMode,

    /// V4L2 video device path (ustreamer mode)
    #[arg(long, env = "KINDAVM_VIDEO_DEVICE", default_value = "/dev/video0")]
    video_device: PathBuf,

    /// ustreamer listen address (host:port)
    #[arg(long, env = "KINDAVM_USTREAMER_ADDR", default_value = "0.0.0.0:8877")]
    ustreamer_addr: String,

    /// ustreamer executable
    #[arg(long, env = "KINDAVM_USTREAMER_BIN", default_value = "ustreamer")]
    ustreamer_bin: String,

    /// Camera capture executable (mjpeg and h264 modes)
    #[arg(long, env = "KINDAVM_CAPTURE_BIN", default_value = "rpicam-vid")]
    capture_bin: String,

    /// Capture width, 0 for the sensor default
    #[arg(long, env = "KINDAVM_WIDTH", default_value_t = 1280)]
    width: u32,

    /// Capture height, 0 for the sensor default
    #[arg(long, env = "KINDAVM_HEIGHT", default_value_t = 720)]
    height: u32,

    /// Capture frame rate
    #[arg(long, env = "KINDAVM_FRAMERATE", default_value_t = 30)]
    framerate: u32,

    /// JPEG quality for MJPEG capture
    #[arg(long, env = "KINDAVM_MJPEG_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    mjpeg_quality: u32,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVideoMode {
    Ustreamer,
    Mjpeg,
    H264,
}

impl From<CliVideoMode> for VideoMode {
    fn from(mode: CliVideoMode) -> Self {
        match mode {
            CliVideoMode::Ustreamer => VideoMode::Ustreamer,
            CliVideoMode::Mjpeg => VideoMode::Mjpeg,
            CliVideoMode::H264 => VideoMode::H264,
        }
    }
}

impl CliArgs {
    fn into_config(self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::default();
        config.web.bind_address = self.addr;
        config.hid.device = self.hid;
        config.hid.report_delay_ms = self.report_delay_ms;
        config.video.mode = self.video_mode.into();
        config.video.device = self.video_device;
        config.video.capture_bin = self.capture_bin;
        config.video.width = self.width;
        config.video.height = self.height;
        config.video.framerate = self.framerate;
        config.video.mjpeg_quality = self.mjpeg_quality;
        config.video.ustreamer.bin = self.ustreamer_bin;
        config.video.ustreamer.address = self
            .ustreamer_addr
            .parse()
            .with_context(|| format!("Invalid ustreamer address: {}", self.ustreamer_addr))?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting kindavm v{}", env!("CARGO_PKG_VERSION"));

    let config = args.into_config()?;
    tracing::info!(
        "HID device: {}, video mode: {}",
        config.hid.device.display(),
        config.video.mode
    );

    let shutdown = CancellationToken::new();

    let hid = HidController::with_device(HidDevice::new(
        &config.hid.device,
        Duration::from_millis(config.hid.report_delay_ms),
    ));
    let settings = SettingsStore::default();
    let capture = CaptureParams::new(
        config.video.width,
        config.video.height,
        config.video.framerate,
    );
    let capture_tool = ProcessSpec::new(config.video.capture_bin.clone(), vec![]);

    let (pipeline, camera_modes) = match config.video.mode {
        VideoMode::Ustreamer => {
            let service = UstreamerService::new(
                config.video.ustreamer.bin.clone(),
                config.video.device.clone(),
                config.video.ustreamer.address,
                settings.clone(),
                shutdown.clone(),
            );
            tracing::info!(
                "ustreamer will serve on {} (POST /video/start)",
                config.video.ustreamer.address
            );
            (
                VideoPipeline::Ustreamer(Arc::new(service)),
                DEFAULT_MODES.to_vec(),
            )
        }
        VideoMode::Mjpeg => {
            let command = mjpeg_command(&capture_tool, &capture, config.video.mjpeg_quality);
            // About one second of frames
            let queue_capacity = (config.video.framerate as usize).max(1);
            let streamer = MjpegStreamer::new(command, queue_capacity, shutdown.clone());
            (
                VideoPipeline::Mjpeg(Arc::new(streamer)),
                detect_camera_modes(&config.video.capture_bin).await,
            )
        }
        VideoMode::H264 => {
            let streamer = H264Streamer::new(capture_tool, capture, shutdown.clone());
            (
                VideoPipeline::H264(Arc::new(streamer)),
                detect_camera_modes(&config.video.capture_bin).await,
            )
        }
    };

    let bind_address = config.web.bind_address;
    let state = AppState::new(
        config,
        hid,
        settings,
        camera_modes,
        pipeline,
        shutdown.clone(),
    );

    let app = web::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Starting HTTP server on {}", bind_address);

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let graceful = {
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    };
    let server = axum::serve(listener, app).with_graceful_shutdown(graceful);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!("Connections still open after {:?}, exiting anyway", SHUTDOWN_GRACE);
        }
    }

    // Server errors still need the children reaped
    shutdown.cancel();
    cleanup(&state).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Cancel the root token on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "kindavm=error,tower_http=error",
        LogLevel::Warn => "kindavm=warn,tower_http=warn",
        LogLevel::Info => "kindavm=info,tower_http=info",
        LogLevel::Verbose => "kindavm=debug,tower_http=info",
        LogLevel::Debug => "kindavm=debug,tower_http=debug",
        LogLevel::Trace => "kindavm=trace,tower_http=debug",
    };

    // RUST_LOG takes priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Stop capture processes and release held input
async fn cleanup(state: &Arc<AppState>) {
    if let Some(streamer) = &state.mjpeg {
        streamer.stop().await;
    }
    if let Some(streamer) = &state.h264 {
        streamer.stop().await;
    }
    if let Some(service) = &state.ustreamer {
        service.stop().await;
        tracing::info!("ustreamer stopped");
    }

    if let Err(e) = state.hid.reset().await {
        tracing::warn!("Failed to reset HID: {}", e);
    }
}
