//! Input event types received on the control WebSocket

use serde::Deserialize;

use super::consumer::{display, media, ConsumerKey};
use super::keymap::usb;
use super::report::modifier;

/// Input event decoded from a control message.
///
/// Wire format: `{type, code?, modifiers?, x?, y?, button?, delta?}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireEvent")]
pub enum InputEvent {
    KeyDown { code: String, modifiers: Vec<String> },
    KeyUp { code: String, modifiers: Vec<String> },
    MouseMove { dx: i32, dy: i32 },
    MouseDown { button: String },
    MouseUp { button: String },
    Wheel { delta: i32 },
    System(SystemCommand),
    /// Any `type` outside the known vocabulary
    Unknown,
}

impl InputEvent {
    /// Decode a JSON text message.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Shortcut and media commands sent as bare event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    BrightnessUp,
    BrightnessDown,
    VolumeUp,
    VolumeDown,
    CtrlW,
    CtrlT,
    CtrlN,
    CtrlQ,
    CtrlTab,
    CtrlShiftTab,
    CtrlShiftT,
    CtrlF4,
    AltF4,
    F11,
}

/// What a system command does on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Consumer control press followed by release
    Consumer(ConsumerKey),
    /// Keyboard chord press followed by release
    Chord { modifiers: u8, key: u8 },
}

impl SystemCommand {
    pub fn action(self) -> CommandAction {
        use CommandAction::{Chord, Consumer};
        const CTRL: u8 = modifier::LEFT_CTRL;
        const CTRL_SHIFT: u8 = modifier::LEFT_CTRL | modifier::LEFT_SHIFT;

        match self {
            SystemCommand::BrightnessUp => Consumer(ConsumerKey::display(display::BRIGHTNESS_UP)),
            SystemCommand::BrightnessDown => {
                Consumer(ConsumerKey::display(display::BRIGHTNESS_DOWN))
            }
            SystemCommand::VolumeUp => Consumer(ConsumerKey::media(media::VOLUME_UP)),
            SystemCommand::VolumeDown => Consumer(ConsumerKey::media(media::VOLUME_DOWN)),
            SystemCommand::CtrlW => Chord { modifiers: CTRL, key: usb::KEY_W },
            SystemCommand::CtrlT => Chord { modifiers: CTRL, key: usb::KEY_T },
            SystemCommand::CtrlN => Chord { modifiers: CTRL, key: usb::KEY_N },
            SystemCommand::CtrlQ => Chord { modifiers: CTRL, key: usb::KEY_Q },
            SystemCommand::CtrlTab => Chord { modifiers: CTRL, key: usb::KEY_TAB },
            SystemCommand::CtrlShiftTab => Chord { modifiers: CTRL_SHIFT, key: usb::KEY_TAB },
            SystemCommand::CtrlShiftT => Chord { modifiers: CTRL_SHIFT, key: usb::KEY_T },
            SystemCommand::CtrlF4 => Chord { modifiers: CTRL, key: usb::KEY_F4 },
            SystemCommand::AltF4 => Chord {
                modifiers: modifier::LEFT_ALT,
                key: usb::KEY_F4,
            },
            SystemCommand::F11 => Chord { modifiers: 0, key: usb::KEY_F11 },
        }
    }
}

/// Mouse button token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Parse a button token. Both names and DOM `MouseEvent.button` indices are accepted.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "left" | "0" => Some(MouseButton::Left),
            "middle" | "1" => Some(MouseButton::Middle),
            "right" | "2" => Some(MouseButton::Right),
            _ => None,
        }
    }

    pub fn to_hid_bit(self) -> u8 {
        match self {
            MouseButton::Left => super::report::button::LEFT,
            MouseButton::Right => super::report::button::RIGHT,
            MouseButton::Middle => super::report::button::MIDDLE,
        }
    }
}

/// Fold modifier tokens into a left-side modifier mask. Unknown tokens are ignored.
pub fn modifier_mask<S: AsRef<str>>(tokens: &[S]) -> u8 {
    tokens.iter().fold(0u8, |mask, token| {
        let bit = match token.as_ref().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifier::LEFT_CTRL,
            "shift" => modifier::LEFT_SHIFT,
            "alt" => modifier::LEFT_ALT,
            "meta" | "super" | "cmd" | "win" => modifier::LEFT_META,
            _ => 0,
        };
        mask | bit
    })
}

/// Flat serde view of a control message
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    #[serde(rename = "keydown")]
    KeyDown {
        code: String,
        #[serde(default)]
        modifiers: Vec<String>,
    },
    #[serde(rename = "keyup")]
    KeyUp {
        code: String,
        #[serde(default)]
        modifiers: Vec<String>,
    },
    #[serde(rename = "mousemove")]
    MouseMove {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
    },
    #[serde(rename = "mousedown")]
    MouseDown { button: String },
    #[serde(rename = "mouseup")]
    MouseUp { button: String },
    Wheel {
        #[serde(default)]
        delta: i32,
    },
    BrightnessUp,
    BrightnessDown,
    VolumeUp,
    VolumeDown,
    CtrlW,
    CtrlT,
    CtrlN,
    CtrlQ,
    CtrlTab,
    CtrlShiftTab,
    CtrlShiftT,
    CtrlF4,
    AltF4,
    F11,
    #[serde(other)]
    Unknown,
}

impl From<WireEvent> for InputEvent {
    fn from(wire: WireEvent) -> Self {
        use SystemCommand as Cmd;
        match wire {
            WireEvent::KeyDown { code, modifiers } => InputEvent::KeyDown { code, modifiers },
            WireEvent::KeyUp { code, modifiers } => InputEvent::KeyUp { code, modifiers },
            WireEvent::MouseMove { x, y } => InputEvent::MouseMove { dx: x, dy: y },
            WireEvent::MouseDown { button } => InputEvent::MouseDown { button },
            WireEvent::MouseUp { button } => InputEvent::MouseUp { button },
            WireEvent::Wheel { delta } => InputEvent::Wheel { delta },
            WireEvent::BrightnessUp => InputEvent::System(Cmd::BrightnessUp),
            WireEvent::BrightnessDown => InputEvent::System(Cmd::BrightnessDown),
            WireEvent::VolumeUp => InputEvent::System(Cmd::VolumeUp),
            WireEvent::VolumeDown => InputEvent::System(Cmd::VolumeDown),
            WireEvent::CtrlW => InputEvent::System(Cmd::CtrlW),
            WireEvent::CtrlT => InputEvent::System(Cmd::CtrlT),
            WireEvent::CtrlN => InputEvent::System(Cmd::CtrlN),
            WireEvent::CtrlQ => InputEvent::System(Cmd::CtrlQ),
            WireEvent::CtrlTab => InputEvent::System(Cmd::CtrlTab),
            WireEvent::CtrlShiftTab => InputEvent::System(Cmd::CtrlShiftTab),
            WireEvent::CtrlShiftT => InputEvent::System(Cmd::CtrlShiftT),
            WireEvent::CtrlF4 => InputEvent::System(Cmd::CtrlF4),
            WireEvent::AltF4 => InputEvent::System(Cmd::AltF4),
            WireEvent::F11 => InputEvent::System(Cmd::F11),
            WireEvent::Unknown => InputEvent::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_events() {
        let event = InputEvent::from_json(
            r#"{"type":"keydown","code":"KeyA","modifiers":["ctrl","shift"]}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            InputEvent::KeyDown {
                code: "KeyA".into(),
                modifiers: vec!["ctrl".into(), "shift".into()],
            }
        );

        let event = InputEvent::from_json(r#"{"type":"keyup","code":"KeyA"}"#).unwrap();
        assert_eq!(
            event,
            InputEvent::KeyUp {
                code: "KeyA".into(),
                modifiers: vec![],
            }
        );
    }

    #[test]
    fn test_decode_mouse_events() {
        let event = InputEvent::from_json(r#"{"type":"mousemove","x":-5,"y":12}"#).unwrap();
        assert_eq!(event, InputEvent::MouseMove { dx: -5, dy: 12 });

        let event = InputEvent::from_json(r#"{"type":"mousedown","button":"left"}"#).unwrap();
        assert_eq!(
            event,
            InputEvent::MouseDown {
                button: "left".into()
            }
        );

        let event = InputEvent::from_json(r#"{"type":"wheel","delta":-3}"#).unwrap();
        assert_eq!(event, InputEvent::Wheel { delta: -3 });
    }

    #[test]
    fn test_decode_system_commands() {
        let cases = [
            ("brightness_up", SystemCommand::BrightnessUp),
            ("volume_down", SystemCommand::VolumeDown),
            ("ctrl_shift_tab", SystemCommand::CtrlShiftTab),
            ("ctrl_f4", SystemCommand::CtrlF4),
            ("alt_f4", SystemCommand::AltF4),
            ("f11", SystemCommand::F11),
        ];
        for (name, expected) in cases {
            let json = format!(r#"{{"type":"{}"}}"#, name);
            assert_eq!(
                InputEvent::from_json(&json).unwrap(),
                InputEvent::System(expected)
            );
        }
    }

    #[test]
    fn test_decode_unknown_and_malformed() {
        let event = InputEvent::from_json(r#"{"type":"teleport","code":"KeyA"}"#).unwrap();
        assert_eq!(event, InputEvent::Unknown);

        assert!(InputEvent::from_json("not json").is_err());
        assert!(InputEvent::from_json(r#"{"code":"KeyA"}"#).is_err());
        assert!(InputEvent::from_json(r#"{"type":"keydown"}"#).is_err());
    }

    #[test]
    fn test_modifier_mask() {
        assert_eq!(modifier_mask::<&str>(&[]), 0);
        assert_eq!(modifier_mask(&["ctrl", "alt"]), 0x05);
        assert_eq!(modifier_mask(&["Control", "SHIFT"]), 0x03);
        assert_eq!(modifier_mask(&["super"]), modifier::LEFT_META);
        assert_eq!(modifier_mask(&["cmd", "win", "meta"]), modifier::LEFT_META);
        assert_eq!(modifier_mask(&["hyper", "shift"]), modifier::LEFT_SHIFT);
    }

    #[test]
    fn test_mouse_button_tokens() {
        assert_eq!(MouseButton::from_token("left"), Some(MouseButton::Left));
        assert_eq!(MouseButton::from_token("0"), Some(MouseButton::Left));
        assert_eq!(MouseButton::from_token("1"), Some(MouseButton::Middle));
        assert_eq!(MouseButton::from_token("right"), Some(MouseButton::Right));
        assert_eq!(MouseButton::from_token("back"), None);
        assert_eq!(MouseButton::Middle.to_hid_bit(), 0x04);
    }

    #[test]
    fn test_command_actions() {
        assert_eq!(
            SystemCommand::CtrlShiftT.action(),
            CommandAction::Chord {
                modifiers: 0x03,
                key: usb::KEY_T
            }
        );
        assert_eq!(
            SystemCommand::F11.action(),
            CommandAction::Chord {
                modifiers: 0,
                key: 0x44
            }
        );
        assert_eq!(
            SystemCommand::VolumeUp.action(),
            CommandAction::Consumer(ConsumerKey::media(0x01))
        );
    }
}
