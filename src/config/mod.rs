//! Configuration
//!
//! `AppConfig` is the startup configuration assembled from the command
//! line. `SettingsStore` holds the video encoder settings that can be
//! changed at runtime through the web API.

mod schema;
mod store;

pub use schema::*;
pub use store::SettingsStore;
