//! HID report encoding
//!
//! Every report written to the gadget starts with a Report ID byte that
//! selects one of four logical devices declared in the composite descriptor:
//!
//! | Report ID | Device          | Size | Layout                              |
//! |-----------|-----------------|------|-------------------------------------|
//! | 0x01      | Keyboard        | 9    | id, modifiers, reserved, 6 keycodes |
//! | 0x02      | Consumer        | 4    | id, media, display, misc            |
//! | 0x03      | System          | 2    | id, power/sleep/wake bits           |
//! | 0x04      | Mouse           | 5    | id, buttons, dx, dy, wheel          |
//!
//! Encoding never fails. Out-of-range movement saturates at +/-127.

use super::consumer::ConsumerKey;

pub const REPORT_ID_KEYBOARD: u8 = 0x01;
pub const REPORT_ID_CONSUMER: u8 = 0x02;
pub const REPORT_ID_SYSTEM: u8 = 0x03;
pub const REPORT_ID_MOUSE: u8 = 0x04;

pub const KEYBOARD_REPORT_LEN: usize = 9;
pub const CONSUMER_REPORT_LEN: usize = 4;
pub const SYSTEM_REPORT_LEN: usize = 2;
pub const MOUSE_REPORT_LEN: usize = 5;

/// Maximum number of simultaneous non-modifier keys in a boot keyboard report
pub const MAX_KEYS: usize = 6;

/// Canonical "all keys released" report
pub const KEYBOARD_RELEASE: [u8; KEYBOARD_REPORT_LEN] = [REPORT_ID_KEYBOARD, 0, 0, 0, 0, 0, 0, 0, 0];
/// Canonical "no buttons, no motion" report
pub const MOUSE_NEUTRAL: [u8; MOUSE_REPORT_LEN] = [REPORT_ID_MOUSE, 0, 0, 0, 0];
/// Canonical consumer release report
pub const CONSUMER_RELEASE: [u8; CONSUMER_REPORT_LEN] = [REPORT_ID_CONSUMER, 0, 0, 0];
/// Canonical system control release report
pub const SYSTEM_RELEASE: [u8; SYSTEM_REPORT_LEN] = [REPORT_ID_SYSTEM, 0];

/// Keyboard modifier bits
pub mod modifier {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_META: u8 = 0x08;
    pub const RIGHT_CTRL: u8 = 0x10;
    pub const RIGHT_SHIFT: u8 = 0x20;
    pub const RIGHT_ALT: u8 = 0x40;
    pub const RIGHT_META: u8 = 0x80;
}

/// Mouse button bits
pub mod button {
    pub const NONE: u8 = 0x00;
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
}

/// Saturate a relative movement into the signed 8-bit range the descriptor declares.
///
/// The range is symmetric: -128 is never produced.
pub fn clamp_movement(value: i32) -> i8 {
    value.clamp(-127, 127) as i8
}

/// Keyboard report (boot protocol layout behind a Report ID)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub keys: [u8; MAX_KEYS],
}

impl KeyboardReport {
    /// Build a report from a modifier mask and up to six usage IDs.
    /// Extra keycodes are ignored.
    pub fn new(modifiers: u8, keycodes: &[u8]) -> Self {
        let mut keys = [0u8; MAX_KEYS];
        for (slot, code) in keys.iter_mut().zip(keycodes) {
            *slot = *code;
        }
        Self { modifiers, keys }
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys.iter().all(|&k| k == 0)
    }

    pub fn to_bytes(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        let mut bytes = [0u8; KEYBOARD_REPORT_LEN];
        bytes[0] = REPORT_ID_KEYBOARD;
        bytes[1] = self.modifiers;
        bytes[3..].copy_from_slice(&self.keys);
        bytes
    }
}

/// Relative mouse report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseReport {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl MouseReport {
    pub fn new(buttons: u8, dx: i32, dy: i32, wheel: i32) -> Self {
        Self {
            buttons,
            dx: clamp_movement(dx),
            dy: clamp_movement(dy),
            wheel: clamp_movement(wheel),
        }
    }

    pub fn to_bytes(&self) -> [u8; MOUSE_REPORT_LEN] {
        [
            REPORT_ID_MOUSE,
            self.buttons,
            self.dx as u8,
            self.dy as u8,
            self.wheel as u8,
        ]
    }
}

/// Encode a keyboard report.
pub fn encode_keyboard(modifiers: u8, keycodes: &[u8]) -> [u8; KEYBOARD_REPORT_LEN] {
    KeyboardReport::new(modifiers, keycodes).to_bytes()
}

/// Encode a mouse report.
pub fn encode_mouse(buttons: u8, dx: i32, dy: i32, wheel: i32) -> [u8; MOUSE_REPORT_LEN] {
    MouseReport::new(buttons, dx, dy, wheel).to_bytes()
}

/// Encode a consumer control report from its three bitmap bytes.
pub fn encode_consumer(media: u8, display: u8, misc: u8) -> [u8; CONSUMER_REPORT_LEN] {
    [REPORT_ID_CONSUMER, media, display, misc]
}

/// Encode a consumer control report for a single key.
pub fn encode_consumer_key(key: ConsumerKey) -> [u8; CONSUMER_REPORT_LEN] {
    encode_consumer(key.media, key.display, key.misc)
}

/// Encode a system control report.
pub fn encode_system(bits: u8) -> [u8; SYSTEM_REPORT_LEN] {
    [REPORT_ID_SYSTEM, bits]
}
