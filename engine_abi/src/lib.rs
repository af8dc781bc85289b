//! # Engine ABI
//!
//! This crate defines the driver function table the embedded runtime calls,
//! and the production implementation over the compositor and input bridge.
//!
//! ## Philosophy
//!
//! - **A trait is the table**: one method per table entry; the runtime
//!   binding holds a `&dyn DeviceDriver` instead of a struct of raw
//!   function pointers capturing global state
//! - **Owned wiring**: the driver owns `Arc` handles to the services it
//!   fronts; nothing is reached through statics
//! - **Errors stay local**: invalid handles and bad rectangles are logged
//!   and reported as a failed status; the runtime ignores them by design
//! - **Contract violations are fatal**: a window request with an unsupported
//!   encoding cannot be serviced safely and aborts
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - The runtime's process lifecycle (start/stop/arguments live elsewhere)
//! - A stable C ABI (bindings translate at the FFI edge)

use std::sync::Arc;

use compositor::{Compositor, CompositorError};
use display_types::{PixelEncoding, TextureId, WindowId};
use host_logger::{LogEntry, LogLevel, LogSink};
use input_bridge::InputBridge;
use input_types::PolledEvent;

/// Status reported back to the engine for table calls without a result value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// The call succeeded
    Ok,
    /// The call failed; the error was logged host-side
    Failed,
}

impl DriverStatus {
    /// Numeric status for the engine protocol (`0` ok, `-1` failed)
    pub const fn code(&self) -> i32 {
        match self {
            DriverStatus::Ok => 0,
            DriverStatus::Failed => -1,
        }
    }

    /// Returns true on success
    pub fn is_ok(&self) -> bool {
        matches!(self, DriverStatus::Ok)
    }
}

/// The driver function table
///
/// Each method is one entry in the table the embedded runtime expects from
/// its display driver. The `erase`, `render`, `background`, `status`,
/// `clipboard`, `move_window`, and `average` slots are optional; the default
/// implementations accept and ignore them.
pub trait DeviceDriver {
    /// Creates a window; panics on an unsupported encoding (contract
    /// violation: the driver cannot safely proceed)
    fn create(&self, encoding: PixelEncoding, width: u32, height: u32) -> WindowId;

    /// Destroys a window
    fn destroy(&self, window: WindowId) -> DriverStatus;

    /// Sets a window's title
    fn title(&self, window: WindowId, title: &str) -> DriverStatus;

    /// Creates a texture sized for the given window
    fn create_texture(&self, window: WindowId, width: u32, height: u32) -> Option<TextureId>;

    /// Destroys a texture; redundant frees succeed
    fn destroy_texture(&self, texture: TextureId) -> DriverStatus;

    /// Replaces a texture's full buffer
    fn update_texture(&self, texture: TextureId, data: &[u8]) -> DriverStatus;

    /// Updates a sub-rectangle of a texture
    fn update_texture_rect(
        &self,
        texture: TextureId,
        data: &[u8],
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> DriverStatus;

    /// Blits a texture's full surface to the window origin
    fn draw_texture(&self, window: WindowId, texture: TextureId) -> DriverStatus;

    /// Blits a texture rectangle into a window with clipping
    #[allow(clippy::too_many_arguments)]
    fn draw_texture_rect(
        &self,
        window: WindowId,
        texture: TextureId,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
        dst_x: i32,
        dst_y: i32,
    ) -> DriverStatus;

    /// Polls the next input event; `None` means no event, not an error
    fn event_poll(&self) -> Option<PolledEvent>;

    /// Optional slot: erase a window's surface
    fn erase(&self, _window: WindowId) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: present a window
    fn render(&self, _window: WindowId) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: set a window's background color
    fn background(&self, _window: WindowId, _r: u8, _g: u8, _b: u8) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: update a window's status area
    fn status(&self, _window: WindowId) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: put text on the host clipboard
    fn clipboard(&self, _text: &str) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: move a window
    fn move_window(&self, _window: WindowId, _x: i32, _y: i32) -> DriverStatus {
        DriverStatus::Ok
    }

    /// Optional slot: average a window region's color
    fn average(&self, _window: WindowId) -> DriverStatus {
        DriverStatus::Ok
    }
}

/// Production driver wiring the compositor and input bridge
pub struct HostDriver {
    compositor: Arc<Compositor>,
    bridge: Arc<InputBridge>,
    sink: Arc<dyn LogSink + Send + Sync>,
}

impl HostDriver {
    /// Creates a driver over shared service handles
    pub fn new(
        compositor: Arc<Compositor>,
        bridge: Arc<InputBridge>,
        sink: Arc<dyn LogSink + Send + Sync>,
    ) -> Self {
        Self {
            compositor,
            bridge,
            sink,
        }
    }

    /// The compositor this driver fronts
    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    /// The input bridge this driver fronts
    pub fn bridge(&self) -> &Arc<InputBridge> {
        &self.bridge
    }

    /// Logs a failed operation and reports failure to the engine
    fn report(&self, operation: &str, error: CompositorError) -> DriverStatus {
        self.sink.log(
            LogEntry::new(LogLevel::Warn, error.to_string())
                .with_source("driver")
                .with_field("operation", operation),
        );
        DriverStatus::Failed
    }

    fn status_of(&self, operation: &str, result: Result<(), CompositorError>) -> DriverStatus {
        match result {
            Ok(()) => DriverStatus::Ok,
            Err(error) => self.report(operation, error),
        }
    }
}

impl DeviceDriver for HostDriver {
    fn create(&self, encoding: PixelEncoding, width: u32, height: u32) -> WindowId {
        match self.compositor.create_window(encoding, width, height) {
            Ok(window) => window,
            Err(error) => panic!("window creation contract violation: {}", error),
        }
    }

    fn destroy(&self, window: WindowId) -> DriverStatus {
        self.status_of("destroy", self.compositor.destroy_window(window))
    }

    fn title(&self, window: WindowId, title: &str) -> DriverStatus {
        self.status_of("title", self.compositor.set_title(window, title))
    }

    fn create_texture(&self, window: WindowId, width: u32, height: u32) -> Option<TextureId> {
        match self.compositor.create_texture(window, width, height) {
            Ok(texture) => Some(texture),
            Err(error) => {
                self.report("create_texture", error);
                None
            }
        }
    }

    fn destroy_texture(&self, texture: TextureId) -> DriverStatus {
        self.status_of("destroy_texture", self.compositor.destroy_texture(texture))
    }

    fn update_texture(&self, texture: TextureId, data: &[u8]) -> DriverStatus {
        self.status_of("update_texture", self.compositor.update_texture(texture, data))
    }

    fn update_texture_rect(
        &self,
        texture: TextureId,
        data: &[u8],
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> DriverStatus {
        self.status_of(
            "update_texture_rect",
            self.compositor
                .update_texture_region(texture, data, x, y, width, height),
        )
    }

    fn draw_texture(&self, window: WindowId, texture: TextureId) -> DriverStatus {
        self.status_of("draw_texture", self.compositor.draw_texture(window, texture))
    }

    fn draw_texture_rect(
        &self,
        window: WindowId,
        texture: TextureId,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
        dst_x: i32,
        dst_y: i32,
    ) -> DriverStatus {
        self.status_of(
            "draw_texture_rect",
            self.compositor
                .blit(window, texture, src_x, src_y, width, height, dst_x, dst_y),
        )
    }

    fn event_poll(&self) -> Option<PolledEvent> {
        self.bridge.poll()
    }
}
