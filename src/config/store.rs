use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

use super::VideoSettings;
use crate::error::Result;

/// In-memory store for [`VideoSettings`]
///
/// Uses `ArcSwap` for lock-free reads. Updates are validated before they
/// replace the current value and take effect on the next process start.
#[derive(Clone)]
pub struct SettingsStore {
    cache: Arc<ArcSwap<VideoSettings>>,
}

impl SettingsStore {
    pub fn new(initial: VideoSettings) -> Self {
        Self {
            cache: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Get current settings (lock-free)
    pub fn get(&self) -> VideoSettings {
        **self.cache.load()
    }

    /// Validate and replace the settings
    pub fn set(&self, settings: VideoSettings) -> Result<()> {
        settings.validate()?;
        self.cache.store(Arc::new(settings));
        info!(
            "Video settings updated: quality={}, desired_fps={}, buffers={}, tcp_nodelay={}",
            settings.quality, settings.desired_fps, settings.buffers, settings.tcp_nodelay
        );
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(VideoSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_set_rejects_invalid_without_change() {
        let store = SettingsStore::default();
        let invalid = VideoSettings {
            quality: 0,
            ..VideoSettings::default()
        };

        let err = store.set(invalid).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(store.get(), VideoSettings::default());
    }

    #[test]
    fn test_set_visible_to_clones() {
        let store = SettingsStore::default();
        let other = store.clone();
        let updated = VideoSettings {
            quality: 55,
            desired_fps: 0,
            buffers: 3,
            tcp_nodelay: true,
        };

        store.set(updated).unwrap();
        assert_eq!(other.get(), updated);
    }
}
