//! Camera mode discovery

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A capture resolution the camera advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CameraMode {
    pub width: u32,
    pub height: u32,
}

impl CameraMode {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Used when the camera tool is missing or reports nothing usable
pub const DEFAULT_MODES: [CameraMode; 5] = [
    CameraMode::new(640, 480),
    CameraMode::new(800, 600),
    CameraMode::new(1024, 768),
    CameraMode::new(1280, 720),
    CameraMode::new(1920, 1080),
];

fn mode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)x(\d+)\s+\[[\d.]+\s+fps").expect("valid camera mode regex"))
}

/// Extract `WxH [N fps` entries from `--list-cameras` output, de-duplicated in order.
pub fn parse_camera_modes(output: &str) -> Vec<CameraMode> {
    let mut modes: Vec<CameraMode> = Vec::new();
    for caps in mode_regex().captures_iter(output) {
        let (Ok(width), Ok(height)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let mode = CameraMode::new(width, height);
        if !modes.contains(&mode) {
            modes.push(mode);
        }
    }
    modes
}

/// Ask the capture tool which modes the attached camera supports.
///
/// Falls back to [`DEFAULT_MODES`] when the tool cannot be run, exits with
/// an error, or prints nothing that parses.
pub async fn detect_camera_modes(program: &str) -> Vec<CameraMode> {
    let output = match Command::new(program).arg("--list-cameras").output().await {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to run {} --list-cameras: {}, using default modes", program, e);
            return DEFAULT_MODES.to_vec();
        }
    };

    if !output.status.success() {
        warn!(
            "{} --list-cameras exited with {}, using default modes",
            program, output.status
        );
        return DEFAULT_MODES.to_vec();
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    debug!("{} --list-cameras output:\n{}", program, text);

    let modes = parse_camera_modes(&text);
    if modes.is_empty() {
        warn!("No camera modes detected, using default modes");
        return DEFAULT_MODES.to_vec();
    }

    info!("Detected {} camera modes", modes.len());
    modes
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_CAMERAS: &str = "\
Available cameras
-----------------
0 : imx219 [3280x2464 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx219@10)
    Modes: 'SRGGB10_CSI2P' : 640x480 [206.65 fps - (1000, 752)/1280x960 crop]
                             1640x1232 [41.85 fps - (0, 0)/3280x2464 crop]
                             1920x1080 [47.57 fps - (680, 692)/1920x1080 crop]
                             3280x2464 [21.19 fps - (0, 0)/3280x2464 crop]
           'SRGGB8' : 640x480 [206.65 fps - (1000, 752)/1280x960 crop]
                      1640x1232 [83.70 fps - (0, 0)/3280x2464 crop]
";

    #[test]
    fn test_parse_dedupes_in_order() {
        let modes = parse_camera_modes(LIST_CAMERAS);
        assert_eq!(
            modes,
            vec![
                CameraMode::new(640, 480),
                CameraMode::new(1640, 1232),
                CameraMode::new(1920, 1080),
                CameraMode::new(3280, 2464),
            ]
        );
    }

    #[test]
    fn test_sensor_size_without_fps_is_ignored() {
        assert!(parse_camera_modes("0 : imx219 [3280x2464 10-bit RGGB]").is_empty());
    }

    #[test]
    fn test_mode_json_shape() {
        let json = serde_json::to_string(&CameraMode::new(1280, 720)).unwrap();
        assert_eq!(json, r#"{"Width":1280,"Height":720}"#);
    }

    #[tokio::test]
    async fn test_missing_tool_falls_back() {
        let modes = detect_camera_modes("/nonexistent/rpicam-vid").await;
        assert_eq!(modes, DEFAULT_MODES.to_vec());
    }

    #[tokio::test]
    async fn test_failing_tool_falls_back() {
        let modes = detect_camera_modes("false").await;
        assert_eq!(modes, DEFAULT_MODES.to_vec());
    }
}
