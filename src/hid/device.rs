//! HID gadget character device sink
//!
//! Each report is written with a fresh open/write/close cycle. Gadget
//! devices can be unbound and rebound to the UDC while the daemon runs, and
//! a persistent descriptor would go stale across a rebind.

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

use crate::error::{AppError, Result};

/// Default delay after each report, giving the host time to poll the endpoint
pub const DEFAULT_REPORT_DELAY: Duration = Duration::from_millis(10);

/// Destination for encoded HID reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one complete report
    async fn send_report(&self, report: &[u8]) -> Result<()>;
}

/// HID gadget device (e.g. `/dev/hidg0`)
#[derive(Debug, Clone)]
pub struct HidDevice {
    path: PathBuf,
    report_delay: Duration,
}

impl HidDevice {
    pub fn new(path: impl Into<PathBuf>, report_delay: Duration) -> Self {
        Self {
            path: path.into(),
            report_delay,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one report, then sleep `delay` before returning.
    ///
    /// Open failures map to [`AppError::DeviceUnavailable`], write failures and
    /// short writes to [`AppError::WriteFailed`]. Nothing is retried.
    pub async fn send(&self, report: &[u8], delay: Duration) -> Result<()> {
        let path = self.path.clone();
        let data = report.to_vec();

        tokio::task::spawn_blocking(move || write_report(&path, &data))
            .await
            .map_err(|e| AppError::Internal(format!("HID write task failed: {}", e)))??;

        trace!("Sent HID report: {:02X?}", report);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Probe the device node without opening it.
    ///
    /// Only used for a startup warning; sending works (or fails) independently.
    pub fn check_device(&self) -> Result<()> {
        let metadata = std::fs::metadata(&self.path).map_err(|e| AppError::DeviceUnavailable {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        if !metadata.file_type().is_char_device() {
            return Err(AppError::DeviceUnavailable {
                path: self.path.display().to_string(),
                reason: "not a character device".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for HidDevice {
    async fn send_report(&self, report: &[u8]) -> Result<()> {
        self.send(report, self.report_delay).await
    }
}

fn write_report(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| AppError::DeviceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    match file.write(data) {
        Ok(n) if n == data.len() => Ok(()),
        Ok(n) => Err(AppError::WriteFailed {
            path: path.display().to_string(),
            reason: format!("short write: {} of {} bytes", n, data.len()),
            error_code: "short_write".to_string(),
        }),
        Err(e) => Err(io_error_to_write_failed(path, e)),
    }
}

fn io_error_to_write_failed(path: &Path, e: std::io::Error) -> AppError {
    let error_code = match e.raw_os_error() {
        Some(libc::EPIPE) => "epipe",
        Some(libc::ESHUTDOWN) => "eshutdown",
        Some(libc::EAGAIN) => "eagain",
        Some(libc::ENXIO) => "enxio",
        Some(libc::ENODEV) => "enodev",
        Some(libc::EIO) => "eio",
        Some(libc::ENOENT) => "enoent",
        _ => "io_error",
    };

    AppError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
        error_code: error_code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::report::KEYBOARD_RELEASE;

    #[tokio::test]
    async fn test_send_writes_exact_bytes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = HidDevice::new(file.path(), Duration::ZERO);

        device.send(&[0x04, 0x01, 0x0A, 0x14, 0x00], Duration::ZERO).await.unwrap();

        let written = std::fs::read(file.path()).unwrap();
        assert_eq!(written, vec![0x04, 0x01, 0x0A, 0x14, 0x00]);
    }

    #[tokio::test]
    async fn test_send_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = HidDevice::new(dir.path().join("hidg9"), Duration::ZERO);

        let err = device.send_report(&KEYBOARD_RELEASE).await.unwrap_err();
        assert!(matches!(err, AppError::DeviceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_send_applies_delay() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = HidDevice::new(file.path(), Duration::from_millis(30));

        let start = std::time::Instant::now();
        device.send_report(&KEYBOARD_RELEASE).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_check_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = HidDevice::new(file.path(), DEFAULT_REPORT_DELAY)
            .check_device()
            .unwrap_err();
        assert!(matches!(err, AppError::DeviceUnavailable { .. }));

        assert!(HidDevice::new("/nonexistent/hidg0", DEFAULT_REPORT_DELAY)
            .check_device()
            .is_err());

        HidDevice::new("/dev/null", DEFAULT_REPORT_DELAY)
            .check_device()
            .unwrap();
    }

    #[test]
    fn test_errno_mapping() {
        let err = io_error_to_write_failed(
            Path::new("/dev/hidg0"),
            std::io::Error::from_raw_os_error(libc::ESHUTDOWN),
        );
        match err {
            AppError::WriteFailed { error_code, .. } => assert_eq!(error_code, "eshutdown"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
