//! Consumer Control and System Control bitmaps
//!
//! The gadget's report descriptor lays consumer usages out as one bit each,
//! spread over three bytes, rather than as 16-bit usage codes.

/// Byte 1: media keys
pub mod media {
    pub const VOLUME_UP: u8 = 0x01;
    pub const VOLUME_DOWN: u8 = 0x02;
    pub const MUTE: u8 = 0x04;
    pub const PLAY_PAUSE: u8 = 0x08;
    pub const SCAN_NEXT: u8 = 0x10;
    pub const SCAN_PREVIOUS: u8 = 0x20;
    pub const STOP: u8 = 0x40;
    pub const AL_MAIL: u8 = 0x80;
}

/// Byte 2: display brightness and browser (AC) keys
pub mod display {
    pub const BRIGHTNESS_UP: u8 = 0x01;
    pub const BRIGHTNESS_DOWN: u8 = 0x02;
    pub const AC_SEARCH: u8 = 0x04;
    pub const AC_HOME: u8 = 0x08;
    pub const AC_BACK: u8 = 0x10;
    pub const AC_FORWARD: u8 = 0x20;
    pub const AC_STOP: u8 = 0x40;
    pub const AC_REFRESH: u8 = 0x80;
}

/// Byte 3: misc
pub mod misc {
    pub const EJECT: u8 = 0x01;
}

/// System Control report bits
pub mod system {
    pub const POWER: u8 = 0x01;
    pub const SLEEP: u8 = 0x02;
    pub const WAKE: u8 = 0x04;
}

/// A single consumer key expressed as its position in the three-byte bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerKey {
    pub media: u8,
    pub display: u8,
    pub misc: u8,
}

impl ConsumerKey {
    pub const fn media(bit: u8) -> Self {
        Self {
            media: bit,
            display: 0,
            misc: 0,
        }
    }

    pub const fn display(bit: u8) -> Self {
        Self {
            media: 0,
            display: bit,
            misc: 0,
        }
    }

    pub const fn misc(bit: u8) -> Self {
        Self {
            media: 0,
            display: 0,
            misc: bit,
        }
    }
}
