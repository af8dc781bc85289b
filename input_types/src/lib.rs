#![no_std]

//! # Input Types
//!
//! This crate defines the input events that cross the bridge between host
//! gestures and the embedded runtime's synchronous poll protocol.
//!
//! ## Philosophy
//!
//! - **Events, not bytes**: input is structured events, not raw scan codes
//! - **Order is meaning**: arrival order is significant and preserved FIFO
//! - **Two vocabularies, one translation**: hosts speak [`InputEvent`], the
//!   engine speaks the fixed `(code, arg1, arg2)` triple; translation happens
//!   exactly once, at poll time
//! - **Testable**: events are serializable and can be injected for testing
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A keymap (codes pass through untranslated)
//! - A gesture recognizer (hosts decide what a drag is)
//! - An event loop

use core::fmt;
use serde::{Deserialize, Serialize};

/// Input event
///
/// A single keyboard or pointer state change, plus the `Stop` sentinel that
/// asks the runtime to end its polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A key went down; the code passes through to the engine unchanged
    KeyDown(i32),
    /// A key came up
    KeyUp(i32),
    /// The pointer button went down
    PointerDown,
    /// The pointer button came up
    PointerUp,
    /// The pointer moved to (x, y) in window coordinates
    PointerMove(i32, i32),
    /// Terminate the runtime's polling loop
    Stop,
}

impl InputEvent {
    /// Returns true if this is the stop sentinel
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    /// Returns true if this is a pointer event
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Self::PointerDown | Self::PointerUp | Self::PointerMove(_, _)
        )
    }

    /// Returns true if this is a key event
    pub fn is_key(&self) -> bool {
        matches!(self, Self::KeyDown(_) | Self::KeyUp(_))
    }
}

/// Engine-protocol event code
///
/// Numeric values are part of the engine protocol and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum EventCode {
    /// Terminate the polling loop
    Stop = 0,
    /// Key pressed; arg1 is the key code
    KeyDown = 1,
    /// Key released; arg1 is the key code
    KeyUp = 2,
    /// Pointer button pressed; arg1 is the button number
    ButtonDown = 3,
    /// Pointer button released; arg1 is the button number
    ButtonUp = 4,
    /// Pointer moved; arg1/arg2 are x/y
    Motion = 5,
}

impl EventCode {
    /// Returns the numeric protocol code
    pub const fn code(&self) -> i32 {
        *self as i32
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One polled event in the engine's fixed result shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolledEvent {
    /// Protocol event code
    pub code: EventCode,
    /// First argument (key code, button number, or x)
    pub arg1: i32,
    /// Second argument (y for motion, otherwise 0)
    pub arg2: i32,
}

impl PolledEvent {
    /// Creates a polled event
    pub fn new(code: EventCode, arg1: i32, arg2: i32) -> Self {
        Self { code, arg1, arg2 }
    }

    /// Translates a bridged input event into the engine's result shape
    ///
    /// The translation is fixed protocol:
    /// key events carry their code in arg1, pointer button events carry
    /// button 1 in arg1, motion carries x/y, and `Stop` maps to the
    /// terminate sentinel.
    pub fn translate(event: InputEvent) -> Self {
        match event {
            InputEvent::KeyDown(code) => Self::new(EventCode::KeyDown, code, 0),
            InputEvent::KeyUp(code) => Self::new(EventCode::KeyUp, code, 0),
            InputEvent::PointerDown => Self::new(EventCode::ButtonDown, 1, 0),
            InputEvent::PointerUp => Self::new(EventCode::ButtonUp, 1, 0),
            InputEvent::PointerMove(x, y) => Self::new(EventCode::Motion, x, y),
            InputEvent::Stop => Self::new(EventCode::Stop, 0, 0),
        }
    }

    /// Returns true if this event ends the polling loop
    pub fn is_stop(&self) -> bool {
        self.code == EventCode::Stop
    }
}
