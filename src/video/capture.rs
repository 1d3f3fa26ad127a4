//! rpicam-vid command line construction

use super::supervisor::ProcessSpec;

/// Capture geometry and rate requested from the camera tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureParams {
    /// Width in pixels, 0 for the sensor default
    pub width: u32,
    /// Height in pixels, 0 for the sensor default
    pub height: u32,
    pub framerate: u32,
}

impl CaptureParams {
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate,
        }
    }

    /// Resolution flags are only passed when both dimensions are set
    fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Override fields with client-requested values that are present and positive
    pub fn with_overrides(
        mut self,
        width: Option<u32>,
        height: Option<u32>,
        framerate: Option<u32>,
    ) -> Self {
        if let Some(w) = width.filter(|&w| w > 0) {
            self.width = w;
        }
        if let Some(h) = height.filter(|&h| h > 0) {
            self.height = h;
        }
        if let Some(f) = framerate.filter(|&f| f > 0) {
            self.framerate = f;
        }
        self
    }
}

fn base_args(params: &CaptureParams) -> Vec<String> {
    let mut args: Vec<String> = vec!["--timeout".into(), "0".into(), "--nopreview".into()];
    if params.has_resolution() {
        args.extend([
            "--width".to_string(),
            params.width.to_string(),
            "--height".to_string(),
            params.height.to_string(),
        ]);
    }
    args.extend(["--framerate".to_string(), params.framerate.to_string()]);
    args
}

/// Raw H264 elementary stream on stdout.
///
/// `base` is the capture tool plus any leading arguments of its own.
pub fn h264_command(base: &ProcessSpec, params: &CaptureParams) -> ProcessSpec {
    let mut spec = base.clone();
    spec.args.extend(base_args(params));
    spec.args.extend(["--codec", "h264", "--output", "-"].map(String::from));
    spec
}

/// Concatenated JPEG frames on stdout
pub fn mjpeg_command(base: &ProcessSpec, params: &CaptureParams, quality: u32) -> ProcessSpec {
    let mut spec = base.clone();
    spec.args.extend(base_args(params));
    spec.args.extend([
        "--codec".to_string(),
        "mjpeg".to_string(),
        "--quality".to_string(),
        quality.to_string(),
        "--output".to_string(),
        "-".to_string(),
    ]);
    spec
}
