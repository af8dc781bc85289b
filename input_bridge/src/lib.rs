//! # Input Bridge
//!
//! This crate bridges asynchronous host gestures into the embedded runtime's
//! synchronous poll protocol.
//!
//! ## Philosophy
//!
//! - **One queue, one order**: producers enqueue from any thread, the runtime
//!   drains from its own, and the FIFO order is what the runtime sees
//! - **Empty is not an error**: a poll on an empty queue means "no event"
//! - **Sessions start clean**: `reset` discards pending input so a fresh run
//!   never replays stale gestures
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An event loop (the runtime polls at its own pace)
//! - A gesture recognizer beyond the fixed drag encoding
//! - A focus router (there is exactly one consumer)

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use input_types::{InputEvent, PolledEvent};

/// FIFO queue between host input producers and the runtime's poll loop
///
/// Enqueue and poll are serialized by one lock; the queue is unbounded
/// because the runtime drains every tick and producers must never block a
/// gesture handler.
#[derive(Debug, Default)]
pub struct InputBridge {
    queue: Mutex<VecDeque<InputEvent>>,
}

impl InputBridge {
    /// Creates an empty bridge
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<InputEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an event to the queue
    pub fn enqueue(&self, event: InputEvent) {
        self.lock().push_back(event);
    }

    /// Pops and translates exactly one event, oldest first
    ///
    /// Returns `None` when the queue is empty, meaning "no event right now";
    /// the runtime keeps ticking. A translated [`PolledEvent::is_stop`]
    /// result asks the runtime to end its loop.
    pub fn poll(&self) -> Option<PolledEvent> {
        self.lock().pop_front().map(PolledEvent::translate)
    }

    /// Discards all pending events
    ///
    /// Called when a new runtime session starts: stale input, including a
    /// leftover `Stop`, must not leak into the fresh run.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Number of events waiting to be polled
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Enqueues the stop sentinel
    pub fn request_stop(&self) {
        self.enqueue(InputEvent::Stop);
    }

    /// Enqueues a key press with the given code
    pub fn key_pressed(&self, code: i32) {
        self.enqueue(InputEvent::KeyDown(code));
    }

    /// Enqueues a key release with the given code
    pub fn key_released(&self, code: i32) {
        self.enqueue(InputEvent::KeyUp(code));
    }
}

/// Producer-side drag translation
///
/// The engine protocol expects "down" as two events, position first:
/// first contact enqueues `PointerMove` then `PointerDown`; movement while
/// pressed enqueues only `PointerMove`; release enqueues `PointerMove` then
/// `PointerUp`. One tracker per pointer/window pairing.
#[derive(Debug, Default)]
pub struct PointerTracker {
    dragging: bool,
}

impl PointerTracker {
    /// Creates a tracker with no drag in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Handles a drag-changed gesture at (x, y)
    pub fn drag_moved(&mut self, bridge: &InputBridge, x: i32, y: i32) {
        bridge.enqueue(InputEvent::PointerMove(x, y));
        if !self.dragging {
            bridge.enqueue(InputEvent::PointerDown);
            self.dragging = true;
        }
    }

    /// Handles a drag-ended gesture at (x, y)
    pub fn drag_ended(&mut self, bridge: &InputBridge, x: i32, y: i32) {
        bridge.enqueue(InputEvent::PointerMove(x, y));
        bridge.enqueue(InputEvent::PointerUp);
        self.dragging = false;
    }
}
