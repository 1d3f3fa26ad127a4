//! Browser key code to USB HID usage mapping
//!
//! Maps `KeyboardEvent.code` strings (physical key positions) to USB HID
//! usage IDs on the Keyboard/Keypad page.
//! Reference: USB HID Usage Tables 1.12, Section 10 (Keyboard/Keypad Page)

/// USB HID key codes (Usage Page 0x07)
pub mod usb {
    // Letters A-Z (0x04 - 0x1D)
    pub const KEY_A: u8 = 0x04;
    pub const KEY_N: u8 = 0x11;
    pub const KEY_Q: u8 = 0x14;
    pub const KEY_T: u8 = 0x17;
    pub const KEY_W: u8 = 0x1A;
    pub const KEY_Z: u8 = 0x1D;

    // Numbers 1-9 (0x1E - 0x26), 0 is last
    pub const KEY_1: u8 = 0x1E;
    pub const KEY_0: u8 = 0x27;

    // Control keys
    pub const KEY_ENTER: u8 = 0x28;
    pub const KEY_ESCAPE: u8 = 0x29;
    pub const KEY_BACKSPACE: u8 = 0x2A;
    pub const KEY_TAB: u8 = 0x2B;
    pub const KEY_SPACE: u8 = 0x2C;
    pub const KEY_MINUS: u8 = 0x2D;
    pub const KEY_EQUAL: u8 = 0x2E;
    pub const KEY_LEFT_BRACKET: u8 = 0x2F;
    pub const KEY_RIGHT_BRACKET: u8 = 0x30;
    pub const KEY_BACKSLASH: u8 = 0x31;
    pub const KEY_SEMICOLON: u8 = 0x33;
    pub const KEY_APOSTROPHE: u8 = 0x34;
    pub const KEY_GRAVE: u8 = 0x35;
    pub const KEY_COMMA: u8 = 0x36;
    pub const KEY_PERIOD: u8 = 0x37;
    pub const KEY_SLASH: u8 = 0x38;
    pub const KEY_CAPS_LOCK: u8 = 0x39;

    // Function keys F1-F12 (0x3A - 0x45)
    pub const KEY_F1: u8 = 0x3A;
    pub const KEY_F4: u8 = 0x3D;
    pub const KEY_F11: u8 = 0x44;

    // Navigation block
    pub const KEY_PRINT_SCREEN: u8 = 0x46;
    pub const KEY_SCROLL_LOCK: u8 = 0x47;
    pub const KEY_PAUSE: u8 = 0x48;
    pub const KEY_INSERT: u8 = 0x49;
    pub const KEY_HOME: u8 = 0x4A;
    pub const KEY_PAGE_UP: u8 = 0x4B;
    pub const KEY_DELETE: u8 = 0x4C;
    pub const KEY_END: u8 = 0x4D;
    pub const KEY_PAGE_DOWN: u8 = 0x4E;
    pub const KEY_RIGHT_ARROW: u8 = 0x4F;
    pub const KEY_LEFT_ARROW: u8 = 0x50;
    pub const KEY_DOWN_ARROW: u8 = 0x51;
    pub const KEY_UP_ARROW: u8 = 0x52;

    // Keypad
    pub const KEY_NUM_LOCK: u8 = 0x53;
    pub const KEYPAD_DIVIDE: u8 = 0x54;
    pub const KEYPAD_MULTIPLY: u8 = 0x55;
    pub const KEYPAD_SUBTRACT: u8 = 0x56;
    pub const KEYPAD_ADD: u8 = 0x57;
    pub const KEYPAD_ENTER: u8 = 0x58;
    pub const KEYPAD_1: u8 = 0x59;
    pub const KEYPAD_0: u8 = 0x62;
    pub const KEYPAD_DECIMAL: u8 = 0x63;

    // Misc
    pub const KEY_NON_US_BACKSLASH: u8 = 0x64;
    pub const KEY_APPLICATION: u8 = 0x65;
}

/// Look up the HID usage ID for a browser `KeyboardEvent.code`.
///
/// Returns `None` for codes without a mapping (including the modifier keys
/// themselves, which travel in the modifier byte instead).
pub fn code_to_usage(code: &str) -> Option<u8> {
    // KeyA..KeyZ
    if let Some(letter) = code.strip_prefix("Key") {
        return single_offset(letter, b'A', b'Z', usb::KEY_A);
    }

    // Digit1..Digit9, Digit0
    if let Some(digit) = code.strip_prefix("Digit") {
        return match digit {
            "0" => Some(usb::KEY_0),
            d => single_offset(d, b'1', b'9', usb::KEY_1),
        };
    }

    // Numpad1..Numpad9, Numpad0 and friends
    if let Some(rest) = code.strip_prefix("Numpad") {
        return match rest {
            "0" => Some(usb::KEYPAD_0),
            "Divide" => Some(usb::KEYPAD_DIVIDE),
            "Multiply" => Some(usb::KEYPAD_MULTIPLY),
            "Subtract" => Some(usb::KEYPAD_SUBTRACT),
            "Add" => Some(usb::KEYPAD_ADD),
            "Enter" => Some(usb::KEYPAD_ENTER),
            "Decimal" => Some(usb::KEYPAD_DECIMAL),
            d => single_offset(d, b'1', b'9', usb::KEYPAD_1),
        };
    }

    // F1..F12
    if let Some(n) = code.strip_prefix('F') {
        if let Ok(n @ 1..=12) = n.parse::<u8>() {
            return Some(usb::KEY_F1 + n - 1);
        }
    }

    let usage = match code {
        "Enter" => usb::KEY_ENTER,
        "Escape" => usb::KEY_ESCAPE,
        "Backspace" => usb::KEY_BACKSPACE,
        "Tab" => usb::KEY_TAB,
        "Space" => usb::KEY_SPACE,
        "Minus" => usb::KEY_MINUS,
        "Equal" => usb::KEY_EQUAL,
        "BracketLeft" => usb::KEY_LEFT_BRACKET,
        "BracketRight" => usb::KEY_RIGHT_BRACKET,
        "Backslash" => usb::KEY_BACKSLASH,
        "Semicolon" => usb::KEY_SEMICOLON,
        "Quote" => usb::KEY_APOSTROPHE,
        "Backquote" => usb::KEY_GRAVE,
        "Comma" => usb::KEY_COMMA,
        "Period" => usb::KEY_PERIOD,
        "Slash" => usb::KEY_SLASH,
        "CapsLock" => usb::KEY_CAPS_LOCK,
        "PrintScreen" => usb::KEY_PRINT_SCREEN,
        "ScrollLock" => usb::KEY_SCROLL_LOCK,
        "Pause" => usb::KEY_PAUSE,
        "Insert" => usb::KEY_INSERT,
        "Home" => usb::KEY_HOME,
        "PageUp" => usb::KEY_PAGE_UP,
        "Delete" => usb::KEY_DELETE,
        "End" => usb::KEY_END,
        "PageDown" => usb::KEY_PAGE_DOWN,
        "ArrowRight" => usb::KEY_RIGHT_ARROW,
        "ArrowLeft" => usb::KEY_LEFT_ARROW,
        "ArrowDown" => usb::KEY_DOWN_ARROW,
        "ArrowUp" => usb::KEY_UP_ARROW,
        "NumLock" => usb::KEY_NUM_LOCK,
        "IntlBackslash" => usb::KEY_NON_US_BACKSLASH,
        "ContextMenu" => usb::KEY_APPLICATION,
        _ => return None,
    };
    Some(usage)
}

/// Map a one-character suffix within `first..=last` onto a contiguous usage range.
fn single_offset(suffix: &str, first: u8, last: u8, base: u8) -> Option<u8> {
    match suffix.as_bytes() {
        [c] if (first..=last).contains(c) => Some(base + (c - first)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(code_to_usage("KeyA"), Some(0x04));
        assert_eq!(code_to_usage("KeyZ"), Some(usb::KEY_Z));
        assert_eq!(code_to_usage("Digit1"), Some(0x1E));
        assert_eq!(code_to_usage("Digit9"), Some(0x26));
        assert_eq!(code_to_usage("Digit0"), Some(0x27));
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(code_to_usage("F1"), Some(0x3A));
        assert_eq!(code_to_usage("F4"), Some(usb::KEY_F4));
        assert_eq!(code_to_usage("F12"), Some(0x45));
        assert_eq!(code_to_usage("F13"), None);
        assert_eq!(code_to_usage("F0"), None);
    }

    #[test]
    fn test_numpad() {
        assert_eq!(code_to_usage("Numpad1"), Some(0x59));
        assert_eq!(code_to_usage("Numpad9"), Some(0x61));
        assert_eq!(code_to_usage("Numpad0"), Some(0x62));
        assert_eq!(code_to_usage("NumpadEnter"), Some(0x58));
        assert_eq!(code_to_usage("NumpadDecimal"), Some(0x63));
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(code_to_usage("Delete"), Some(0x4C));
        assert_eq!(code_to_usage("ArrowUp"), Some(0x52));
        assert_eq!(code_to_usage("ContextMenu"), Some(0x65));
        assert_eq!(code_to_usage("CapsLock"), Some(0x39));
    }

    #[test]
    fn test_unmapped_codes() {
        assert_eq!(code_to_usage("ControlLeft"), None);
        assert_eq!(code_to_usage("Keya"), None);
        assert_eq!(code_to_usage("KeyAB"), None);
        assert_eq!(code_to_usage(""), None);
    }
}
