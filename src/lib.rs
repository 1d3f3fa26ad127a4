//! kindavm - a software KVM
//!
//! Forwards browser keyboard and mouse input to a USB HID gadget and
//! relays camera video back to the browser.

pub mod config;
pub mod error;
pub mod hid;
pub mod state;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
