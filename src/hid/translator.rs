//! Input event translator
//!
//! Turns browser input events into HID reports while tracking which keys
//! and mouse buttons are currently held. There is one translator per
//! daemon, since the daemon drives exactly one target machine.
//!
//! State is updated before a report is sent. A failed write leaves the
//! pressed sets matching the logical input, so a later keyup or mouseup
//! still clears them correctly.

use std::sync::Arc;
use tracing::{debug, trace};

use super::device::ReportSink;
use super::keymap::code_to_usage;
use super::report::{
    self, KeyboardReport, MouseReport, CONSUMER_RELEASE, KEYBOARD_RELEASE, MAX_KEYS,
    MOUSE_NEUTRAL,
};
use super::types::{modifier_mask, CommandAction, InputEvent, MouseButton, SystemCommand};
use crate::error::{AppError, Result};

/// Stateful event-to-report translator
pub struct InputTranslator {
    sink: Arc<dyn ReportSink>,
    /// Pressed key codes, oldest first
    pressed_keys: Vec<String>,
    /// Pressed button tokens, oldest first
    pressed_buttons: Vec<String>,
}

impl InputTranslator {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            sink,
            pressed_keys: Vec::new(),
            pressed_buttons: Vec::new(),
        }
    }

    /// Currently pressed key codes in press order
    pub fn pressed_keys(&self) -> &[String] {
        &self.pressed_keys
    }

    /// Currently pressed button tokens in press order
    pub fn pressed_buttons(&self) -> &[String] {
        &self.pressed_buttons
    }

    /// Decode a JSON control message and dispatch it.
    pub async fn handle_message(&mut self, text: &str) -> Result<()> {
        let event =
            InputEvent::from_json(text).map_err(|e| AppError::DecodeFailed(e.to_string()))?;
        self.dispatch(event).await
    }

    pub async fn dispatch(&mut self, event: InputEvent) -> Result<()> {
        trace!("Dispatching input event: {:?}", event);
        match event {
            InputEvent::KeyDown { code, modifiers } => self.key_down(&code, &modifiers).await,
            InputEvent::KeyUp { code, modifiers } => self.key_up(&code, &modifiers).await,
            InputEvent::MouseMove { dx, dy } => self.mouse_move(dx, dy).await,
            InputEvent::MouseDown { button } => self.mouse_down(&button).await,
            InputEvent::MouseUp { button } => self.mouse_up(&button).await,
            InputEvent::Wheel { delta } => self.wheel(delta).await,
            InputEvent::System(command) => self.system_command(command).await,
            InputEvent::Unknown => Err(AppError::UnknownEventType),
        }
    }

    pub async fn key_down(&mut self, code: &str, modifiers: &[String]) -> Result<()> {
        if !self.pressed_keys.iter().any(|k| k == code) {
            self.pressed_keys.push(code.to_string());
        }
        let report = self.keyboard_report(modifier_mask(modifiers));
        self.sink.send_report(&report.to_bytes()).await
    }

    pub async fn key_up(&mut self, code: &str, modifiers: &[String]) -> Result<()> {
        self.pressed_keys.retain(|k| k != code);
        let report = self.keyboard_report(modifier_mask(modifiers));
        if report.is_empty() {
            self.sink.send_report(&KEYBOARD_RELEASE).await
        } else {
            self.sink.send_report(&report.to_bytes()).await
        }
    }

    pub async fn mouse_move(&mut self, dx: i32, dy: i32) -> Result<()> {
        let report = MouseReport::new(self.button_mask(), dx, dy, 0);
        self.sink.send_report(&report.to_bytes()).await
    }

    pub async fn mouse_down(&mut self, button: &str) -> Result<()> {
        if MouseButton::from_token(button).is_none() {
            debug!("Ignoring unknown mouse button token: {}", button);
        }
        if !self.pressed_buttons.iter().any(|b| b == button) {
            self.pressed_buttons.push(button.to_string());
        }
        let report = MouseReport::new(self.button_mask(), 0, 0, 0);
        self.sink.send_report(&report.to_bytes()).await
    }

    pub async fn mouse_up(&mut self, button: &str) -> Result<()> {
        self.pressed_buttons.retain(|b| b != button);
        if self.pressed_buttons.is_empty() {
            return self.sink.send_report(&MOUSE_NEUTRAL).await;
        }
        let report = MouseReport::new(self.button_mask(), 0, 0, 0);
        self.sink.send_report(&report.to_bytes()).await
    }

    /// Wheel reports never carry held buttons.
    pub async fn wheel(&mut self, delta: i32) -> Result<()> {
        let report = MouseReport::new(report::button::NONE, 0, 0, delta);
        self.sink.send_report(&report.to_bytes()).await
    }

    /// Press and release a shortcut. Pressed-key state is not touched.
    pub async fn system_command(&mut self, command: SystemCommand) -> Result<()> {
        debug!("System command: {:?}", command);
        match command.action() {
            CommandAction::Consumer(key) => {
                self.sink
                    .send_report(&report::encode_consumer_key(key))
                    .await?;
                self.sink.send_report(&CONSUMER_RELEASE).await
            }
            CommandAction::Chord { modifiers, key } => {
                self.sink
                    .send_report(&report::encode_keyboard(modifiers, &[key]))
                    .await?;
                self.sink.send_report(&KEYBOARD_RELEASE).await
            }
        }
    }

    /// Forget all held keys and buttons and tell the host everything is released.
    pub async fn release_all(&mut self) -> Result<()> {
        self.pressed_keys.clear();
        self.pressed_buttons.clear();
        self.sink.send_report(&KEYBOARD_RELEASE).await?;
        self.sink.send_report(&MOUSE_NEUTRAL).await
    }

    /// First six pressed keys that have a usage ID, oldest first
    fn keyboard_report(&self, modifiers: u8) -> KeyboardReport {
        let keycodes: Vec<u8> = self
            .pressed_keys
            .iter()
            .filter_map(|code| code_to_usage(code))
            .take(MAX_KEYS)
            .collect();
        KeyboardReport::new(modifiers, &keycodes)
    }

    fn button_mask(&self) -> u8 {
        self.pressed_buttons
            .iter()
            .filter_map(|token| MouseButton::from_token(token))
            .fold(report::button::NONE, |mask, b| mask | b.to_hid_bit())
    }
}
